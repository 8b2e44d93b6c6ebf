//! Phase 3: Emitter
//!
//! Serializes an event stream back to YAML text. The emitter is the
//! inverse of the parser: feeding it the events parsed from a document
//! produces an equivalent document, preserving scalar styles where the
//! output position allows them and falling back to a safe quoting
//! otherwise.
//!
//! Output is buffered per document and flushed to the writer at each
//! `DocumentEnd` and at `StreamEnd`. Structural misuse (unmatched
//! start/end pairs, nodes outside a document) fails with
//! [`EmitError::Unbalanced`] rather than producing malformed text.

use std::io::Write;

use crate::error::EmitError;
use crate::event::{CollectionStyle, Event, EventKind, ScalarStyle, TagDirective};

const YAML_CORE_PREFIX: &str = "tag:yaml.org,2002:";

/// Output options.
#[derive(Debug, Clone, Copy)]
pub struct EmitterConfig {
    /// Indentation step for block collections, clamped to 1..=9.
    pub indent: usize,
    /// Start a nested block collection on the same line as its `- ` or
    /// `? ` lead. Only takes effect with an indent step of 2, where the
    /// lead and the step occupy the same two columns.
    pub compact: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        EmitterConfig {
            indent: 2,
            compact: true,
        }
    }
}

/// An open collection on the emitter's stack.
#[derive(Debug, Clone, Copy)]
enum Frame {
    BlockSeq {
        indent: usize,
        count: usize,
    },
    BlockMap {
        indent: usize,
        awaiting_value: bool,
        explicit_key: bool,
        count: usize,
    },
    FlowSeq {
        first: bool,
    },
    FlowMap {
        first: bool,
        awaiting_value: bool,
    },
}

/// What kind of node is about to be written; block mappings use this to
/// pick the simple (`key:`) or explicit (`? key`) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeClass {
    Scalar,
    Alias,
    BlockCollection,
    FlowCollection,
}

/// Where the next node lands, decided by [`Emitter::lead_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeadKind {
    /// Document root.
    Root,
    /// After a `- ` indicator.
    BlockEntry,
    /// Key position of a block mapping, simple form.
    BlockSimpleKey,
    /// After a `? ` indicator.
    BlockExplicitKey,
    /// Value position after `:`.
    AfterColon,
    /// Inside a flow collection.
    Flow,
}

#[derive(Debug, Clone, Copy)]
struct Lead {
    kind: LeadKind,
    /// Indentation of the containing frame.
    indent: usize,
}

/// Event-driven YAML writer.
#[derive(Debug)]
pub struct Emitter<W: Write> {
    writer: W,
    config: EmitterConfig,
    /// Pending text for the current document.
    out: String,
    stack: Vec<Frame>,
    tag_directives: Vec<TagDirective>,
    opened: bool,
    closed: bool,
    in_document: bool,
    root_done: bool,
    first_document: bool,
    /// A space is required before the next inline text.
    needs_space: bool,
    /// The cursor sits right after an entry lead, so a nested block
    /// collection may put its first entry on the same line.
    compact: bool,
    /// The last flush handed the sink an unterminated line.
    flushed_midline: bool,
}

impl<W: Write> Emitter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, EmitterConfig::default())
    }

    pub fn with_config(writer: W, mut config: EmitterConfig) -> Self {
        config.indent = config.indent.clamp(1, 9);
        Emitter {
            writer,
            config,
            out: String::new(),
            stack: Vec::new(),
            tag_directives: Vec::new(),
            opened: false,
            closed: false,
            in_document: false,
            root_done: false,
            first_document: true,
            needs_space: false,
            compact: false,
            flushed_midline: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write one event.
    pub fn emit(&mut self, event: &Event) -> Result<(), EmitError> {
        match &event.kind {
            EventKind::StreamStart => self.stream_start(),
            EventKind::StreamEnd => self.stream_end(),
            EventKind::DocumentStart {
                version,
                tag_directives,
                implicit,
            } => self.document_start(*version, tag_directives, *implicit),
            EventKind::DocumentEnd { implicit } => self.document_end(*implicit),
            EventKind::Alias { anchor } => self.alias(anchor),
            EventKind::Scalar {
                anchor,
                tag,
                value,
                style,
                plain_implicit,
                quoted_implicit,
            } => self.scalar(
                anchor.as_deref(),
                tag.as_deref(),
                value,
                *style,
                *plain_implicit,
                *quoted_implicit,
            ),
            EventKind::SequenceStart { anchor, tag, style } => {
                self.collection_start(true, anchor.as_deref(), tag.as_deref(), *style)
            }
            EventKind::SequenceEnd => self.sequence_end(),
            EventKind::MappingStart { anchor, tag, style } => {
                self.collection_start(false, anchor.as_deref(), tag.as_deref(), *style)
            }
            EventKind::MappingEnd => self.mapping_end(),
        }
    }

    // ========================================================================
    // Stream and documents
    // ========================================================================

    fn stream_start(&mut self) -> Result<(), EmitError> {
        if self.opened {
            return Err(EmitError::Unbalanced("duplicate StreamStart"));
        }
        self.opened = true;
        Ok(())
    }

    fn stream_end(&mut self) -> Result<(), EmitError> {
        if !self.opened || self.closed {
            return Err(EmitError::Unbalanced("StreamEnd outside an open stream"));
        }
        if self.in_document {
            return Err(EmitError::Unbalanced("StreamEnd inside a document"));
        }
        self.closed = true;
        self.flush()?;
        Ok(())
    }

    fn document_start(
        &mut self,
        version: Option<crate::event::VersionDirective>,
        tag_directives: &[TagDirective],
        implicit: bool,
    ) -> Result<(), EmitError> {
        if !self.opened || self.closed {
            return Err(EmitError::Unbalanced("DocumentStart outside an open stream"));
        }
        if self.in_document {
            return Err(EmitError::Unbalanced("DocumentStart inside a document"));
        }
        self.tag_directives = tag_directives.to_vec();
        if let Some(v) = version {
            self.out.push_str(&format!("%YAML {}.{}\n", v.major, v.minor));
        }
        for d in tag_directives {
            self.out.push_str(&format!("%TAG {} {}\n", d.handle, d.prefix));
        }
        let explicit = !implicit
            || !self.first_document
            || version.is_some()
            || !tag_directives.is_empty();
        if explicit {
            self.out.push_str("---");
            self.needs_space = true;
        }
        self.in_document = true;
        self.root_done = false;
        self.compact = false;
        Ok(())
    }

    fn document_end(&mut self, implicit: bool) -> Result<(), EmitError> {
        if !self.in_document {
            return Err(EmitError::Unbalanced("DocumentEnd outside a document"));
        }
        if !self.root_done {
            return Err(EmitError::Unbalanced("DocumentEnd before a root node"));
        }
        if !self.stack.is_empty() {
            return Err(EmitError::Unbalanced("DocumentEnd inside an open collection"));
        }
        if !self.at_line_start() {
            self.out.push('\n');
        }
        if !implicit {
            self.out.push_str("...\n");
        }
        self.flush()?;
        self.in_document = false;
        self.first_document = false;
        self.needs_space = false;
        self.tag_directives.clear();
        Ok(())
    }

    /// Push buffered output through to the sink. Buffers flush on their
    /// own at each `DocumentEnd` and at `StreamEnd`; calling this forces
    /// a partial document out early.
    pub fn flush(&mut self) -> Result<(), EmitError> {
        if !self.out.is_empty() {
            self.flushed_midline = !self.out.ends_with('\n');
            self.writer.write_all(self.out.as_bytes())?;
            self.out.clear();
        }
        self.writer.flush()?;
        Ok(())
    }

    // ========================================================================
    // Output primitives
    // ========================================================================

    fn at_line_start(&self) -> bool {
        if self.out.is_empty() {
            !self.flushed_midline
        } else {
            self.out.ends_with('\n')
        }
    }

    fn newline_indent(&mut self, indent: usize) {
        if !self.at_line_start() {
            self.out.push('\n');
        }
        for _ in 0..indent {
            self.out.push(' ');
        }
        self.needs_space = false;
    }

    fn pad(&mut self) {
        if self.needs_space {
            self.out.push(' ');
            self.needs_space = false;
        }
    }

    /// Write a space-separated inline fragment (anchor, tag, scalar text).
    fn write_inline(&mut self, text: &str) {
        self.pad();
        self.out.push_str(text);
        self.needs_space = true;
    }

    /// Write an exact separator that positions the next fragment itself.
    fn write_sep(&mut self, text: &str) {
        self.out.push_str(text);
        self.needs_space = false;
    }

    fn in_flow(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::FlowSeq { .. }) | Some(Frame::FlowMap { .. })
        )
    }

    // ========================================================================
    // Node placement
    // ========================================================================

    /// Advance the top frame past one entry position and write its lead
    /// text (`- `, `? `, `:`, `, `). Returns where the node now sits.
    fn lead_in(&mut self, class: NodeClass) -> Result<Lead, EmitError> {
        if !self.in_document {
            return Err(EmitError::Unbalanced("node event outside a document"));
        }
        // Compact entries only line up when the step matches the two
        // columns taken by "- " and ": ".
        let compact_ok = self.config.compact && self.config.indent == 2;
        let top = self.stack.len().checked_sub(1);
        match self.stack.last().copied() {
            None => {
                if self.root_done {
                    return Err(EmitError::Unbalanced("multiple root nodes in a document"));
                }
                Ok(Lead {
                    kind: LeadKind::Root,
                    indent: 0,
                })
            }
            Some(Frame::BlockSeq { indent, count }) => {
                if self.compact {
                    self.compact = false;
                    self.pad();
                } else {
                    self.newline_indent(indent);
                }
                self.write_inline("-");
                self.compact = compact_ok;
                if let Some(i) = top {
                    self.stack[i] = Frame::BlockSeq {
                        indent,
                        count: count + 1,
                    };
                }
                Ok(Lead {
                    kind: LeadKind::BlockEntry,
                    indent,
                })
            }
            Some(Frame::BlockMap {
                indent,
                awaiting_value: false,
                count,
                ..
            }) => {
                if self.compact {
                    self.compact = false;
                    self.pad();
                } else {
                    self.newline_indent(indent);
                }
                let explicit = !matches!(class, NodeClass::Scalar | NodeClass::Alias);
                let kind = if explicit {
                    self.write_inline("?");
                    self.compact = compact_ok;
                    LeadKind::BlockExplicitKey
                } else {
                    LeadKind::BlockSimpleKey
                };
                if let Some(i) = top {
                    self.stack[i] = Frame::BlockMap {
                        indent,
                        awaiting_value: true,
                        explicit_key: explicit,
                        count: count + 1,
                    };
                }
                Ok(Lead { kind, indent })
            }
            Some(Frame::BlockMap {
                indent,
                awaiting_value: true,
                explicit_key,
                count,
            }) => {
                if explicit_key {
                    self.newline_indent(indent);
                    self.write_sep(":");
                    self.needs_space = true;
                    self.compact = compact_ok;
                } else {
                    self.write_sep(":");
                    self.needs_space = true;
                    self.compact = false;
                }
                if let Some(i) = top {
                    self.stack[i] = Frame::BlockMap {
                        indent,
                        awaiting_value: false,
                        explicit_key: false,
                        count,
                    };
                }
                Ok(Lead {
                    kind: LeadKind::AfterColon,
                    indent,
                })
            }
            Some(Frame::FlowSeq { first }) => {
                if !first {
                    self.write_sep(", ");
                }
                if let Some(i) = top {
                    self.stack[i] = Frame::FlowSeq { first: false };
                }
                Ok(Lead {
                    kind: LeadKind::Flow,
                    indent: 0,
                })
            }
            Some(Frame::FlowMap {
                first,
                awaiting_value,
            }) => {
                if awaiting_value {
                    self.write_sep(": ");
                } else if !first {
                    self.write_sep(", ");
                }
                if let Some(i) = top {
                    self.stack[i] = Frame::FlowMap {
                        first: false,
                        awaiting_value: !awaiting_value,
                    };
                }
                Ok(Lead {
                    kind: LeadKind::Flow,
                    indent: 0,
                })
            }
        }
    }

    fn node_finished(&mut self) {
        self.compact = false;
        if self.stack.is_empty() {
            self.root_done = true;
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn alias(&mut self, anchor: &str) -> Result<(), EmitError> {
        self.lead_in(NodeClass::Alias)?;
        self.write_inline(&format!("*{}", anchor));
        self.node_finished();
        Ok(())
    }

    fn scalar(
        &mut self,
        anchor: Option<&str>,
        tag: Option<&str>,
        value: &str,
        style: ScalarStyle,
        plain_implicit: bool,
        quoted_implicit: bool,
    ) -> Result<(), EmitError> {
        let lead = self.lead_in(NodeClass::Scalar)?;
        if let Some(a) = anchor {
            self.write_inline(&format!("&{}", a));
        }

        // An empty node renders as nothing at all in block context.
        let omit_body = value.is_empty()
            && style == ScalarStyle::Plain
            && lead.kind != LeadKind::Flow
            && (plain_implicit || tag.is_some());
        let chosen = if omit_body {
            ScalarStyle::Plain
        } else {
            choose_style(value, style, tag, plain_implicit, quoted_implicit, lead.kind)
        };

        if write_tag_needed(tag, chosen, plain_implicit, quoted_implicit) {
            if let Some(t) = tag {
                let rendered = self.format_tag(t);
                self.write_inline(&rendered);
            }
        }
        if omit_body {
            self.node_finished();
            return Ok(());
        }
        match chosen {
            ScalarStyle::Plain => self.write_inline(value),
            ScalarStyle::SingleQuoted => {
                let rendered = format!("'{}'", value.replace('\'', "''"));
                self.write_inline(&rendered);
            }
            ScalarStyle::DoubleQuoted => {
                let rendered = render_double_quoted(value);
                self.write_inline(&rendered);
            }
            ScalarStyle::Literal | ScalarStyle::Folded => {
                let content_indent = lead.indent + self.config.indent;
                self.write_literal(value, content_indent);
            }
        }
        self.node_finished();
        Ok(())
    }

    fn collection_start(
        &mut self,
        seq: bool,
        anchor: Option<&str>,
        tag: Option<&str>,
        style: CollectionStyle,
    ) -> Result<(), EmitError> {
        // Block collections cannot nest inside flow ones.
        let flow = style == CollectionStyle::Flow || self.in_flow();
        let class = if flow {
            NodeClass::FlowCollection
        } else {
            NodeClass::BlockCollection
        };
        let lead = self.lead_in(class)?;
        let has_props = anchor.is_some() || tag.is_some();
        if let Some(a) = anchor {
            self.write_inline(&format!("&{}", a));
        }
        if let Some(t) = tag {
            let rendered = self.format_tag(t);
            self.write_inline(&rendered);
        }
        if flow {
            self.pad();
            self.out.push(if seq { '[' } else { '{' });
            self.needs_space = false;
            self.compact = false;
            self.stack.push(if seq {
                Frame::FlowSeq { first: true }
            } else {
                Frame::FlowMap {
                    first: true,
                    awaiting_value: false,
                }
            });
        } else {
            let indent = if lead.kind == LeadKind::Root {
                0
            } else {
                lead.indent + self.config.indent
            };
            if has_props {
                // Properties end the line; entries start below them.
                self.compact = false;
            }
            self.stack.push(if seq {
                Frame::BlockSeq { indent, count: 0 }
            } else {
                Frame::BlockMap {
                    indent,
                    awaiting_value: false,
                    explicit_key: false,
                    count: 0,
                }
            });
        }
        Ok(())
    }

    fn sequence_end(&mut self) -> Result<(), EmitError> {
        match self.stack.pop() {
            Some(Frame::BlockSeq { count, .. }) => {
                if count == 0 {
                    self.write_inline("[]");
                }
            }
            Some(Frame::FlowSeq { .. }) => {
                self.out.push(']');
                self.needs_space = true;
            }
            Some(other) => {
                self.stack.push(other);
                return Err(EmitError::Unbalanced(
                    "SequenceEnd without a matching SequenceStart",
                ));
            }
            None => {
                return Err(EmitError::Unbalanced("SequenceEnd outside any collection"));
            }
        }
        self.node_finished();
        Ok(())
    }

    fn mapping_end(&mut self) -> Result<(), EmitError> {
        match self.stack.pop() {
            Some(Frame::BlockMap {
                awaiting_value,
                count,
                ..
            }) => {
                if awaiting_value {
                    return Err(EmitError::Unbalanced("MappingEnd after a key with no value"));
                }
                if count == 0 {
                    self.write_inline("{}");
                }
            }
            Some(Frame::FlowMap { awaiting_value, .. }) => {
                if awaiting_value {
                    return Err(EmitError::Unbalanced("MappingEnd after a key with no value"));
                }
                self.out.push('}');
                self.needs_space = true;
            }
            Some(other) => {
                self.stack.push(other);
                return Err(EmitError::Unbalanced(
                    "MappingEnd without a matching MappingStart",
                ));
            }
            None => {
                return Err(EmitError::Unbalanced("MappingEnd outside any collection"));
            }
        }
        self.node_finished();
        Ok(())
    }

    // ========================================================================
    // Scalar rendering
    // ========================================================================

    fn write_literal(&mut self, value: &str, content_indent: usize) {
        let trailing = value.len() - value.trim_end_matches('\n').len();
        // Clip re-adds exactly one break and cannot represent content
        // that is nothing but breaks; keep writes every break out.
        let keep = trailing >= 2 || (trailing == 1 && trailing == value.len());
        let mut header = String::from("|");
        // Leading spaces or blank lines defeat indentation auto-detection.
        if value.starts_with(' ') || value.starts_with('\n') {
            header.push((b'0' + self.config.indent as u8) as char);
        }
        if trailing == 0 {
            header.push('-');
        } else if keep {
            header.push('+');
        }
        self.write_inline(&header);
        let body = if trailing == 1 && !keep {
            &value[..value.len() - 1]
        } else {
            value
        };
        for line in body.split('\n') {
            self.out.push('\n');
            if !line.is_empty() {
                for _ in 0..content_indent {
                    self.out.push(' ');
                }
                self.out.push_str(line);
            }
        }
        self.needs_space = false;
    }

    /// Render a resolved tag back to its shortest form: a declared `%TAG`
    /// shorthand, the `!!` core handle, a local `!tag`, or verbatim.
    fn format_tag(&self, tag: &str) -> String {
        if tag == "!" {
            return String::from("!");
        }
        for d in &self.tag_directives {
            if let Some(suffix) = tag.strip_prefix(d.prefix.as_str()) {
                if !suffix.is_empty() && suffix.chars().all(is_tag_suffix_char) {
                    return format!("{}{}", d.handle, suffix);
                }
            }
        }
        if let Some(suffix) = tag.strip_prefix(YAML_CORE_PREFIX) {
            if !suffix.is_empty() && suffix.chars().all(is_tag_suffix_char) {
                return format!("!!{}", suffix);
            }
        }
        if tag.starts_with('!') {
            return tag.to_string();
        }
        format!("!<{}>", tag)
    }
}

fn is_tag_suffix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.~/;:".contains(c)
}

fn write_tag_needed(
    tag: Option<&str>,
    style: ScalarStyle,
    plain_implicit: bool,
    quoted_implicit: bool,
) -> bool {
    if tag.is_none() {
        return false;
    }
    if style == ScalarStyle::Plain {
        !plain_implicit
    } else {
        !quoted_implicit
    }
}

fn choose_style(
    value: &str,
    requested: ScalarStyle,
    tag: Option<&str>,
    plain_implicit: bool,
    _quoted_implicit: bool,
    lead: LeadKind,
) -> ScalarStyle {
    if value.is_empty() {
        return ScalarStyle::SingleQuoted;
    }
    let in_flow = lead == LeadKind::Flow;
    // Block scalars need a line of their own below the current one.
    let block_ok = matches!(
        lead,
        LeadKind::Root | LeadKind::BlockEntry | LeadKind::AfterColon
    );
    let plain_ok =
        is_plain_safe(value, in_flow) && (tag.is_some() || plain_implicit);
    let single_ok = value.chars().all(|c| !c.is_control());
    match requested {
        ScalarStyle::Plain if plain_ok => ScalarStyle::Plain,
        ScalarStyle::Plain | ScalarStyle::SingleQuoted => {
            if single_ok {
                ScalarStyle::SingleQuoted
            } else {
                ScalarStyle::DoubleQuoted
            }
        }
        ScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        ScalarStyle::Literal | ScalarStyle::Folded => {
            if block_ok && is_literal_safe(value) {
                ScalarStyle::Literal
            } else if single_ok {
                ScalarStyle::SingleQuoted
            } else {
                ScalarStyle::DoubleQuoted
            }
        }
    }
}

fn is_plain_safe(value: &str, in_flow: bool) -> bool {
    if value.starts_with([' ', '\t']) || value.ends_with([' ', '\t']) {
        return false;
    }
    if value.chars().any(|c| c.is_control() || c == '\t') {
        return false;
    }
    let first = match value.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if "#&*!|>'\"%@`,[]{}".contains(first) {
        return false;
    }
    if matches!(first, '-' | '?' | ':') {
        if value.len() == 1 {
            return false;
        }
        if in_flow && first != '-' {
            return false;
        }
        if value.chars().nth(1) == Some(' ') {
            return false;
        }
    }
    if value.contains(": ") || value.ends_with(':') {
        return false;
    }
    if value.contains(" #") {
        return false;
    }
    if value.starts_with("---") || value.starts_with("...") {
        return false;
    }
    if in_flow && value.contains([',', '[', ']', '{', '}']) {
        return false;
    }
    true
}

fn is_literal_safe(value: &str) -> bool {
    value.chars().all(|c| c == '\n' || !c.is_control())
}

fn render_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            '\x1b' => out.push_str("\\e"),
            '\u{85}' => out.push_str("\\N"),
            '\u{a0}' => out.push_str("\\_"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
