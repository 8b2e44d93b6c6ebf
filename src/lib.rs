//! Streaming YAML event engine.
//!
//! The pipeline has three phases:
//!
//! 1. **Scan** ([`scanner`]): source text to a lexical token stream,
//!    handling indentation, simple keys, and all five scalar styles.
//! 2. **Parse** ([`parser`]): tokens to a flat sequence of SAX-style
//!    [`Event`]s. No document tree is built; aliases stay unresolved
//!    references for a downstream composer.
//! 3. **Emit** ([`emitter`]): events back to YAML text, preserving
//!    scalar styles where the output position allows them.
//!
//! Parsing a stream and emitting the resulting events produces an
//! equivalent stream: same structure, same scalar contents, same
//! resolved types.
//!
//! ```
//! use yamlet::{parse, emit_to_string};
//!
//! let events = parse("key: value\n").unwrap();
//! assert_eq!(emit_to_string(&events).unwrap(), "key: value\n");
//! ```

pub mod emitter;
pub mod error;
pub mod event;
pub mod mark;
pub mod parser;
pub mod resolve;
pub mod scanner;

pub use emitter::{Emitter, EmitterConfig};
pub use error::{EmitError, ParseError, Result, ScanError};
pub use event::{
    CollectionStyle, Event, EventKind, ScalarStyle, TagDirective, VersionDirective,
};
pub use mark::Mark;
pub use parser::Parser;
pub use scanner::{Scanner, Token, TokenKind};

/// Parse a complete stream into its event sequence.
pub fn parse(source: &str) -> Result<Vec<Event>> {
    Parser::new(source).collect()
}

/// Emit an event stream to a writer, returning the writer.
pub fn emit<W: std::io::Write>(events: &[Event], writer: W) -> std::result::Result<W, EmitError> {
    let mut emitter = Emitter::new(writer);
    for event in events {
        emitter.emit(event)?;
    }
    Ok(emitter.into_inner())
}

/// Emit an event stream to a string.
pub fn emit_to_string(events: &[Event]) -> std::result::Result<String, EmitError> {
    let buffer = emit(events, Vec::new())?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
