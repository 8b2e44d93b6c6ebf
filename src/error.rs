//! Error types for scanning, parsing, and emission.
//!
//! The taxonomy follows the pipeline: `ScanError` for lexical failures,
//! `ParseError` for grammatical/structural failures (it also transports
//! scan errors), `EmitError` for emitter misuse and I/O. Scan and parse
//! errors carry the offending source position; none are recovered
//! internally - the first error terminates that stream's processing.

use thiserror::Error;

use crate::mark::Mark;

/// Result type for scanning.
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Result type for parsing.
pub type Result<T> = std::result::Result<T, ParseError>;

/// A lexical error with the position it was detected at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Tab character found where indentation spaces were expected.
    #[error("tab character violates indentation at {0}")]
    TabInIndentation(Mark),

    /// Content indented where the current block structure forbids it.
    #[error("bad indentation at {0}")]
    BadIndentation(Mark),

    /// Quoted scalar ran into end of stream or a document marker.
    #[error("unterminated quoted scalar at {0}")]
    UnterminatedQuote(Mark),

    /// Unknown or malformed escape sequence in a double-quoted scalar.
    #[error("invalid escape sequence at {0}")]
    InvalidEscape(Mark),

    /// An implicit key was not followed by ':' on the same line.
    #[error("expected ':' after implicit key at {0}")]
    ExpectedColon(Mark),

    /// Character that cannot start any token.
    #[error("unexpected character {0:?} at {1}")]
    UnexpectedCharacter(char, Mark),

    /// '-' entry outside a block sequence context.
    #[error("block sequence entry not allowed in this context at {0}")]
    BlockEntryNotAllowed(Mark),

    /// '?' key indicator outside a mapping context.
    #[error("mapping key not allowed in this context at {0}")]
    KeyNotAllowed(Mark),

    /// ':' value indicator outside a mapping context.
    #[error("mapping value not allowed in this context at {0}")]
    ValueNotAllowed(Mark),

    /// Empty or malformed anchor/alias name.
    #[error("invalid anchor name at {0}")]
    InvalidAnchor(Mark),

    /// Malformed tag, tag handle, or verbatim tag.
    #[error("invalid tag at {0}")]
    InvalidTag(Mark),

    /// Malformed `%YAML` or `%TAG` directive.
    #[error("invalid directive at {0}")]
    InvalidDirective(Mark),

    /// Bad chomping or indentation indicator after `|` or `>`.
    #[error("invalid block scalar header at {0}")]
    InvalidBlockScalarHeader(Mark),
}

impl ScanError {
    /// The position the error was detected at.
    pub fn mark(&self) -> Mark {
        match self {
            ScanError::TabInIndentation(m)
            | ScanError::BadIndentation(m)
            | ScanError::UnterminatedQuote(m)
            | ScanError::InvalidEscape(m)
            | ScanError::ExpectedColon(m)
            | ScanError::UnexpectedCharacter(_, m)
            | ScanError::BlockEntryNotAllowed(m)
            | ScanError::KeyNotAllowed(m)
            | ScanError::ValueNotAllowed(m)
            | ScanError::InvalidAnchor(m)
            | ScanError::InvalidTag(m)
            | ScanError::InvalidDirective(m)
            | ScanError::InvalidBlockScalarHeader(m) => *m,
        }
    }
}

/// A structural error from the parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Lexical error surfaced through the parser.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A token the grammar does not allow in the current state.
    #[error("{context} at {mark}")]
    UnexpectedToken {
        /// What the parser was doing and what it expected instead.
        context: &'static str,
        mark: Mark,
    },

    /// An anchor name defined twice within one document.
    #[error("duplicate anchor &{name} at {mark}")]
    DuplicateAnchor { name: String, mark: Mark },

    /// An alias referencing an anchor not seen earlier in the document.
    #[error("undefined alias *{name} at {mark}")]
    UndefinedAlias { name: String, mark: Mark },

    /// A well-formed but unacceptable directive: duplicate `%YAML`,
    /// unsupported version, duplicate `%TAG` handle, or a node tag using
    /// an undeclared handle.
    #[error("bad directive: {context} at {mark}")]
    BadDirective {
        context: &'static str,
        mark: Mark,
    },
}

/// An emitter failure.
///
/// `Unbalanced` means the caller violated the event-stream contract
/// (mismatched start/end pairs, events after `StreamEnd`, ...). It is a
/// programming error and is never recovered.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("unbalanced event stream: {0}")]
    Unbalanced(&'static str),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
