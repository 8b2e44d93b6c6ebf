//! Source positions for diagnostics.

use std::fmt;

/// A position in the source text.
///
/// Stored zero-based; rendered one-based for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mark {
    /// Byte-independent character offset from the start of the stream.
    pub index: usize,
    /// Zero-based line number.
    pub line: usize,
    /// Zero-based column number.
    pub col: usize,
}

impl Mark {
    pub fn new(index: usize, line: usize, col: usize) -> Self {
        Self { index, line, col }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line + 1, self.col + 1)
    }
}
