//! Parser events - the shared contract between the parser and the emitter.
//!
//! This is a SAX-style event model: the parser emits events as it walks
//! the token stream, with no tree accumulation. Structure is represented
//! by start/end event pairs, so for any well-formed stream the starts and
//! ends bracket-match at every nesting depth.
//!
//! A parsed `key: value` document produces:
//!
//! ```text
//! StreamStart
//! DocumentStart { implicit: true }
//! MappingStart { style: Block }
//! Scalar("key")
//! Scalar("value")
//! MappingEnd
//! DocumentEnd { implicit: true }
//! StreamEnd
//! ```

use std::fmt;

use crate::mark::Mark;
use crate::resolve::{self, Resolved};

/// Presentation style of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    /// Unquoted: `value`.
    Plain,
    /// `'value'` with `''` escapes.
    SingleQuoted,
    /// `"value"` with backslash escapes.
    DoubleQuoted,
    /// `|` block scalar, line breaks preserved.
    Literal,
    /// `>` block scalar, line breaks folded.
    Folded,
}

/// Presentation style of a sequence or mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStyle {
    /// Indentation-delimited.
    Block,
    /// Bracketed inline: `[a, b]`, `{k: v}`.
    Flow,
}

/// A `%YAML major.minor` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionDirective {
    pub major: u32,
    pub minor: u32,
}

/// A `%TAG handle prefix` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDirective {
    /// The handle, including its `!` delimiters: `!`, `!!`, or `!name!`.
    pub handle: String,
    /// The prefix substituted for the handle.
    pub prefix: String,
}

/// An event with its source position.
///
/// Events built by hand (for emission) carry a default mark.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub mark: Mark,
    pub kind: EventKind,
}

/// The event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    StreamStart,
    StreamEnd,
    DocumentStart {
        version: Option<VersionDirective>,
        tag_directives: Vec<TagDirective>,
        /// True when no `---` marker was present, so emission may omit it.
        implicit: bool,
    },
    DocumentEnd {
        /// True when no `...` marker was present.
        implicit: bool,
    },
    /// `*anchor` - a reference to a previously anchored node. Resolution
    /// into a graph is a downstream composer's job.
    Alias {
        anchor: String,
    },
    Scalar {
        anchor: Option<String>,
        tag: Option<String>,
        /// Raw text content, not schema-resolved to a native type.
        value: String,
        style: ScalarStyle,
        /// The tag may be omitted when the scalar is re-emitted plain.
        plain_implicit: bool,
        /// The tag may be omitted when the scalar is re-emitted quoted.
        /// Independent of `plain_implicit` because plain and quoted
        /// emission resolve implicit tags differently.
        quoted_implicit: bool,
    },
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    },
    MappingEnd,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            mark: Mark::default(),
            kind,
        }
    }

    pub fn at(kind: EventKind, mark: Mark) -> Self {
        Self { mark, kind }
    }

    /// Build an untagged scalar event, computing the implicit flags from
    /// core-schema resolution: a plain rendering always resolves the same
    /// way, a quoted rendering stays equivalent only when the text already
    /// resolves to a string.
    pub fn scalar(value: impl Into<String>, style: ScalarStyle) -> Self {
        let value = value.into();
        let quoted_implicit = resolve::resolve_plain(&value) == Resolved::Str;
        Self::new(EventKind::Scalar {
            anchor: None,
            tag: None,
            value,
            style,
            plain_implicit: true,
            quoted_implicit,
        })
    }

    /// The anchor defined by this event, if any.
    pub fn anchor(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Scalar { anchor, .. }
            | EventKind::SequenceStart { anchor, .. }
            | EventKind::MappingStart { anchor, .. } => anchor.as_deref(),
            _ => None,
        }
    }

    /// The explicit tag carried by this event, if any.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Scalar { tag, .. }
            | EventKind::SequenceStart { tag, .. }
            | EventKind::MappingStart { tag, .. } => tag.as_deref(),
            _ => None,
        }
    }

    /// True for events that open a node (scalar, alias, or collection
    /// start) as opposed to structural stream/document bookkeeping.
    pub fn is_node(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Alias { .. }
                | EventKind::Scalar { .. }
                | EventKind::SequenceStart { .. }
                | EventKind::MappingStart { .. }
        )
    }

    /// True for events that open a start/end pair.
    pub fn is_collection_start(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SequenceStart { .. } | EventKind::MappingStart { .. }
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::StreamStart => write!(f, "StreamStart"),
            EventKind::StreamEnd => write!(f, "StreamEnd"),
            EventKind::DocumentStart {
                version, implicit, ..
            } => {
                write!(f, "DocumentStart [implicit = {}", implicit)?;
                if let Some(v) = version {
                    write!(f, ", version = {}.{}", v.major, v.minor)?;
                }
                write!(f, "]")
            }
            EventKind::DocumentEnd { implicit } => {
                write!(f, "DocumentEnd [implicit = {}]", implicit)
            }
            EventKind::Alias { anchor } => write!(f, "Alias [anchor = {}]", anchor),
            EventKind::Scalar {
                anchor,
                tag,
                value,
                style,
                ..
            } => {
                write!(f, "Scalar [value = {:?}, style = {:?}", value, style)?;
                if let Some(a) = anchor {
                    write!(f, ", anchor = {}", a)?;
                }
                if let Some(t) = tag {
                    write!(f, ", tag = {}", t)?;
                }
                write!(f, "]")
            }
            EventKind::SequenceStart { style, .. } => {
                write!(f, "SequenceStart [style = {:?}]", style)
            }
            EventKind::SequenceEnd => write!(f, "SequenceEnd"),
            EventKind::MappingStart { style, .. } => {
                write!(f, "MappingStart [style = {:?}]", style)
            }
            EventKind::MappingEnd => write!(f, "MappingEnd"),
        }
    }
}
