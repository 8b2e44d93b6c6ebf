//! Phase 2: Parser
//!
//! A pull-based state machine over the token stream. Each call to
//! [`Parser::next_event`] consumes just enough tokens to produce one
//! event; nothing is buffered beyond a single lookahead token. The
//! grammar states mirror the structure of a stream: documents, block and
//! flow collections, and the single-pair mappings that may appear inside
//! flow sequences.
//!
//! The parser also owns per-document bookkeeping: the `%YAML` version,
//! the `%TAG` shorthand table used for tag resolution, and the set of
//! anchor names defined so far (for duplicate and undefined checks).
//! All three reset at every document boundary.

use std::collections::HashSet;

use crate::error::{ParseError, Result};
use crate::event::{CollectionStyle, Event, EventKind, ScalarStyle, TagDirective, VersionDirective};
use crate::mark::Mark;
use crate::scanner::{Scanner, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StreamStart,
    ImplicitDocumentStart,
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
    End,
}

/// Pull-based event parser.
///
/// Implements `Iterator<Item = Result<Event>>`; iteration ends after
/// `StreamEnd` or the first error.
#[derive(Debug)]
pub struct Parser {
    scanner: Scanner,
    state: State,
    states: Vec<State>,
    /// Single token of lookahead.
    token: Option<Token>,
    /// `%TAG` handles declared for the current document.
    tag_directives: Vec<TagDirective>,
    /// Anchor names defined so far in the current document.
    anchors: HashSet<String>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser {
            scanner: Scanner::new(source),
            state: State::StreamStart,
            states: Vec::new(),
            token: None,
            tag_directives: Vec::new(),
            anchors: HashSet::new(),
        }
    }

    /// Produce the next event, or `None` after `StreamEnd`.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.state == State::End {
            return Ok(None);
        }
        match self.state_machine() {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                self.state = State::End;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Token plumbing
    // ========================================================================

    fn next_tok(&mut self) -> Result<Token> {
        if let Some(token) = self.token.take() {
            return Ok(token);
        }
        match self.scanner.next_token()? {
            Some(token) => Ok(token),
            // The scanner always closes with StreamEnd; running past it
            // means the state machine mismanaged its states.
            None => Err(ParseError::UnexpectedToken {
                context: "unexpected end of token stream",
                mark: Mark::default(),
            }),
        }
    }

    fn put_back(&mut self, token: Token) {
        self.token = Some(token);
    }

    fn peek_mark(&mut self) -> Result<Mark> {
        let token = self.next_tok()?;
        let mark = token.mark;
        self.put_back(token);
        Ok(mark)
    }

    fn pop_state(&mut self) {
        self.state = self.states.pop().unwrap_or(State::End);
    }

    fn state_machine(&mut self) -> Result<Event> {
        match self.state {
            State::StreamStart => self.stream_start(),
            State::ImplicitDocumentStart => self.document_start(true),
            State::DocumentStart => self.document_start(false),
            State::DocumentContent => self.document_content(),
            State::DocumentEnd => self.document_end(),
            State::BlockNode => self.parse_node(true, false),
            State::BlockSequenceFirstEntry | State::BlockSequenceEntry => {
                self.block_sequence_entry()
            }
            State::IndentlessSequenceEntry => self.indentless_sequence_entry(),
            State::BlockMappingFirstKey | State::BlockMappingKey => self.block_mapping_key(),
            State::BlockMappingValue => self.block_mapping_value(),
            State::FlowSequenceFirstEntry => self.flow_sequence_entry(true),
            State::FlowSequenceEntry => self.flow_sequence_entry(false),
            State::FlowSequenceEntryMappingKey => self.flow_sequence_entry_mapping_key(),
            State::FlowSequenceEntryMappingValue => self.flow_sequence_entry_mapping_value(),
            State::FlowSequenceEntryMappingEnd => self.flow_sequence_entry_mapping_end(),
            State::FlowMappingFirstKey => self.flow_mapping_key(true),
            State::FlowMappingKey => self.flow_mapping_key(false),
            State::FlowMappingValue => self.flow_mapping_value(false),
            State::FlowMappingEmptyValue => self.flow_mapping_value(true),
            State::End => Err(ParseError::UnexpectedToken {
                context: "no more events in the stream",
                mark: Mark::default(),
            }),
        }
    }

    // ========================================================================
    // Stream and documents
    // ========================================================================

    fn stream_start(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::StreamStart => {
                self.state = State::ImplicitDocumentStart;
                Ok(Event::at(EventKind::StreamStart, token.mark))
            }
            _ => Err(ParseError::UnexpectedToken {
                context: "did not find expected stream start",
                mark: token.mark,
            }),
        }
    }

    fn document_start(&mut self, implicit: bool) -> Result<Event> {
        let mut token = self.next_tok()?;
        if !implicit {
            // Bare '...' markers between documents.
            while token.kind == TokenKind::DocumentEnd {
                token = self.next_tok()?;
            }
        }
        match token.kind {
            TokenKind::StreamEnd => {
                self.state = State::End;
                Ok(Event::at(EventKind::StreamEnd, token.mark))
            }
            TokenKind::VersionDirective(..)
            | TokenKind::TagDirective(..)
            | TokenKind::DocumentStart => self.explicit_document_start(token),
            _ if implicit => {
                let mark = token.mark;
                self.put_back(token);
                self.states.push(State::DocumentEnd);
                self.state = State::BlockNode;
                Ok(Event::at(
                    EventKind::DocumentStart {
                        version: None,
                        tag_directives: Vec::new(),
                        implicit: true,
                    },
                    mark,
                ))
            }
            _ => Err(ParseError::UnexpectedToken {
                context: "did not find expected '---' marker",
                mark: token.mark,
            }),
        }
    }

    fn explicit_document_start(&mut self, mut token: Token) -> Result<Event> {
        let start_mark = token.mark;
        let mut version: Option<VersionDirective> = None;
        loop {
            match token.kind {
                TokenKind::VersionDirective(major, minor) => {
                    if version.is_some() {
                        return Err(ParseError::BadDirective {
                            context: "duplicate %YAML directive",
                            mark: token.mark,
                        });
                    }
                    if major != 1 {
                        return Err(ParseError::BadDirective {
                            context: "unsupported YAML version",
                            mark: token.mark,
                        });
                    }
                    version = Some(VersionDirective { major, minor });
                    token = self.next_tok()?;
                }
                TokenKind::TagDirective(handle, prefix) => {
                    if self.tag_directives.iter().any(|d| d.handle == handle) {
                        return Err(ParseError::BadDirective {
                            context: "duplicate %TAG handle",
                            mark: token.mark,
                        });
                    }
                    self.tag_directives.push(TagDirective { handle, prefix });
                    token = self.next_tok()?;
                }
                _ => break,
            }
        }
        match token.kind {
            TokenKind::DocumentStart => {
                self.states.push(State::DocumentEnd);
                self.state = State::DocumentContent;
                Ok(Event::at(
                    EventKind::DocumentStart {
                        version,
                        tag_directives: self.tag_directives.clone(),
                        implicit: false,
                    },
                    start_mark,
                ))
            }
            _ => Err(ParseError::UnexpectedToken {
                context: "did not find expected '---' marker after directives",
                mark: token.mark,
            }),
        }
    }

    fn document_content(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::VersionDirective(..)
            | TokenKind::TagDirective(..)
            | TokenKind::DocumentStart
            | TokenKind::DocumentEnd
            | TokenKind::StreamEnd => {
                // Document with an empty body.
                let mark = token.mark;
                self.put_back(token);
                self.pop_state();
                Ok(empty_scalar(mark))
            }
            _ => {
                self.put_back(token);
                self.parse_node(true, false)
            }
        }
    }

    fn document_end(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        let (implicit, mark) = match token.kind {
            TokenKind::DocumentEnd => (false, token.mark),
            _ => {
                let mark = token.mark;
                self.put_back(token);
                (true, mark)
            }
        };
        self.tag_directives.clear();
        self.anchors.clear();
        self.state = State::DocumentStart;
        Ok(Event::at(EventKind::DocumentEnd { implicit }, mark))
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Parse one node. `block` admits block collections; `indentless`
    /// additionally admits a sequence of `-` entries at the parent
    /// mapping's own indentation.
    fn parse_node(&mut self, block: bool, indentless: bool) -> Result<Event> {
        let mut token = self.next_tok()?;

        if let TokenKind::Alias(name) = token.kind {
            self.pop_state();
            if !self.anchors.contains(&name) {
                return Err(ParseError::UndefinedAlias {
                    name,
                    mark: token.mark,
                });
            }
            return Ok(Event::at(EventKind::Alias { anchor: name }, token.mark));
        }

        let start_mark = token.mark;
        let mut anchor: Option<String> = None;
        let mut tag: Option<String> = None;
        // Anchor and tag properties, in either order.
        match token.kind {
            TokenKind::Anchor(name) => {
                self.register_anchor(&name, token.mark)?;
                anchor = Some(name);
                token = self.next_tok()?;
                if let TokenKind::Tag(handle, suffix) = token.kind {
                    tag = Some(self.resolve_tag(handle, suffix, token.mark)?);
                    token = self.next_tok()?;
                }
            }
            TokenKind::Tag(handle, suffix) => {
                tag = Some(self.resolve_tag(handle, suffix, token.mark)?);
                token = self.next_tok()?;
                if let TokenKind::Anchor(name) = token.kind {
                    self.register_anchor(&name, token.mark)?;
                    anchor = Some(name);
                    token = self.next_tok()?;
                }
            }
            _ => {}
        }

        match token.kind {
            TokenKind::BlockEntry if indentless => {
                self.put_back(token);
                self.state = State::IndentlessSequenceEntry;
                Ok(Event::at(
                    EventKind::SequenceStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Block,
                    },
                    start_mark,
                ))
            }
            TokenKind::Scalar(style, value) => {
                self.pop_state();
                Ok(scalar_event(anchor, tag, value, style, token.mark))
            }
            TokenKind::FlowSequenceStart => {
                self.state = State::FlowSequenceFirstEntry;
                Ok(Event::at(
                    EventKind::SequenceStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Flow,
                    },
                    start_mark,
                ))
            }
            TokenKind::FlowMappingStart => {
                self.state = State::FlowMappingFirstKey;
                Ok(Event::at(
                    EventKind::MappingStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Flow,
                    },
                    start_mark,
                ))
            }
            TokenKind::BlockSequenceStart if block => {
                self.state = State::BlockSequenceFirstEntry;
                Ok(Event::at(
                    EventKind::SequenceStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Block,
                    },
                    start_mark,
                ))
            }
            TokenKind::BlockMappingStart if block => {
                self.state = State::BlockMappingFirstKey;
                Ok(Event::at(
                    EventKind::MappingStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Block,
                    },
                    start_mark,
                ))
            }
            _ if anchor.is_some() || tag.is_some() => {
                // A lone anchor or tag stands for an empty node.
                self.put_back(token);
                self.pop_state();
                Ok(scalar_event(
                    anchor,
                    tag,
                    String::new(),
                    ScalarStyle::Plain,
                    start_mark,
                ))
            }
            _ => Err(ParseError::UnexpectedToken {
                context: "did not find expected node content",
                mark: token.mark,
            }),
        }
    }

    fn register_anchor(&mut self, name: &str, mark: Mark) -> Result<()> {
        if !self.anchors.insert(name.to_owned()) {
            return Err(ParseError::DuplicateAnchor {
                name: name.to_owned(),
                mark,
            });
        }
        Ok(())
    }

    /// Resolve a `(handle, suffix)` shorthand to a full tag. Declared
    /// `%TAG` directives override the built-in `!` and `!!` handles; an
    /// empty handle marks an already-verbatim tag.
    fn resolve_tag(&self, handle: String, suffix: String, mark: Mark) -> Result<String> {
        if handle.is_empty() {
            return Ok(suffix);
        }
        if handle == "!" && suffix.is_empty() {
            return Ok(handle);
        }
        if let Some(directive) = self.tag_directives.iter().find(|d| d.handle == handle) {
            return Ok(format!("{}{}", directive.prefix, suffix));
        }
        match handle.as_str() {
            "!" => Ok(format!("!{}", suffix)),
            "!!" => Ok(format!("tag:yaml.org,2002:{}", suffix)),
            _ => Err(ParseError::BadDirective {
                context: "tag handle is not declared by a %TAG directive",
                mark,
            }),
        }
    }

    // ========================================================================
    // Block collections
    // ========================================================================

    fn block_sequence_entry(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::BlockEnd => {
                self.pop_state();
                Ok(Event::at(EventKind::SequenceEnd, token.mark))
            }
            TokenKind::BlockEntry => {
                let next = self.next_tok()?;
                match next.kind {
                    TokenKind::BlockEntry | TokenKind::BlockEnd => {
                        self.put_back(next);
                        self.state = State::BlockSequenceEntry;
                        Ok(empty_scalar(token.mark))
                    }
                    _ => {
                        self.put_back(next);
                        self.states.push(State::BlockSequenceEntry);
                        self.parse_node(true, false)
                    }
                }
            }
            _ => Err(ParseError::UnexpectedToken {
                context: "while parsing a block sequence, did not find expected '-' indicator",
                mark: token.mark,
            }),
        }
    }

    fn indentless_sequence_entry(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::BlockEntry => {
                let next = self.next_tok()?;
                match next.kind {
                    TokenKind::BlockEntry
                    | TokenKind::Key
                    | TokenKind::Value
                    | TokenKind::BlockEnd => {
                        self.put_back(next);
                        self.state = State::IndentlessSequenceEntry;
                        Ok(empty_scalar(token.mark))
                    }
                    _ => {
                        self.put_back(next);
                        self.states.push(State::IndentlessSequenceEntry);
                        self.parse_node(true, false)
                    }
                }
            }
            _ => {
                // No BlockEnd is scanned for an indentless sequence; it
                // ends at the next key of the owning mapping.
                let mark = token.mark;
                self.put_back(token);
                self.pop_state();
                Ok(Event::at(EventKind::SequenceEnd, mark))
            }
        }
    }

    fn block_mapping_key(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::Key => {
                let next = self.next_tok()?;
                match next.kind {
                    TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd => {
                        self.put_back(next);
                        self.state = State::BlockMappingValue;
                        Ok(empty_scalar(token.mark))
                    }
                    _ => {
                        self.put_back(next);
                        self.states.push(State::BlockMappingValue);
                        self.parse_node(true, true)
                    }
                }
            }
            TokenKind::Value => {
                // Value with no key.
                let mark = token.mark;
                self.put_back(token);
                self.state = State::BlockMappingValue;
                Ok(empty_scalar(mark))
            }
            TokenKind::BlockEnd => {
                self.pop_state();
                Ok(Event::at(EventKind::MappingEnd, token.mark))
            }
            _ => Err(ParseError::UnexpectedToken {
                context: "while parsing a block mapping, did not find expected key",
                mark: token.mark,
            }),
        }
    }

    fn block_mapping_value(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::Value => {
                let next = self.next_tok()?;
                match next.kind {
                    TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd => {
                        self.put_back(next);
                        self.state = State::BlockMappingKey;
                        Ok(empty_scalar(token.mark))
                    }
                    _ => {
                        self.put_back(next);
                        self.states.push(State::BlockMappingKey);
                        self.parse_node(true, true)
                    }
                }
            }
            _ => {
                // Key with no value.
                let mark = token.mark;
                self.put_back(token);
                self.state = State::BlockMappingKey;
                Ok(empty_scalar(mark))
            }
        }
    }

    // ========================================================================
    // Flow collections
    // ========================================================================

    fn flow_sequence_entry(&mut self, first: bool) -> Result<Event> {
        let mut token = self.next_tok()?;
        if !first {
            match token.kind {
                TokenKind::FlowEntry => token = self.next_tok()?,
                TokenKind::FlowSequenceEnd => {}
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        context: "while parsing a flow sequence, expected ',' or ']'",
                        mark: token.mark,
                    })
                }
            }
        }
        match token.kind {
            TokenKind::FlowSequenceEnd => {
                self.pop_state();
                Ok(Event::at(EventKind::SequenceEnd, token.mark))
            }
            TokenKind::Key => {
                // `[a: b]` - a single-pair mapping entry.
                self.state = State::FlowSequenceEntryMappingKey;
                Ok(Event::at(
                    EventKind::MappingStart {
                        anchor: None,
                        tag: None,
                        style: CollectionStyle::Flow,
                    },
                    token.mark,
                ))
            }
            _ => {
                self.put_back(token);
                self.states.push(State::FlowSequenceEntry);
                self.parse_node(false, false)
            }
        }
    }

    fn flow_sequence_entry_mapping_key(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowSequenceEnd => {
                let mark = token.mark;
                self.put_back(token);
                self.state = State::FlowSequenceEntryMappingValue;
                Ok(empty_scalar(mark))
            }
            _ => {
                self.put_back(token);
                self.states.push(State::FlowSequenceEntryMappingValue);
                self.parse_node(false, false)
            }
        }
    }

    fn flow_sequence_entry_mapping_value(&mut self) -> Result<Event> {
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::Value => {
                let next = self.next_tok()?;
                match next.kind {
                    TokenKind::FlowEntry | TokenKind::FlowSequenceEnd => {
                        self.put_back(next);
                        self.state = State::FlowSequenceEntryMappingEnd;
                        Ok(empty_scalar(token.mark))
                    }
                    _ => {
                        self.put_back(next);
                        self.states.push(State::FlowSequenceEntryMappingEnd);
                        self.parse_node(false, false)
                    }
                }
            }
            _ => {
                let mark = token.mark;
                self.put_back(token);
                self.state = State::FlowSequenceEntryMappingEnd;
                Ok(empty_scalar(mark))
            }
        }
    }

    fn flow_sequence_entry_mapping_end(&mut self) -> Result<Event> {
        let mark = self.peek_mark()?;
        self.state = State::FlowSequenceEntry;
        Ok(Event::at(EventKind::MappingEnd, mark))
    }

    fn flow_mapping_key(&mut self, first: bool) -> Result<Event> {
        let mut token = self.next_tok()?;
        if !first {
            match token.kind {
                TokenKind::FlowEntry => token = self.next_tok()?,
                TokenKind::FlowMappingEnd => {}
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        context: "while parsing a flow mapping, expected ',' or '}'",
                        mark: token.mark,
                    })
                }
            }
        }
        match token.kind {
            TokenKind::FlowMappingEnd => {
                self.pop_state();
                Ok(Event::at(EventKind::MappingEnd, token.mark))
            }
            TokenKind::Key => {
                let next = self.next_tok()?;
                match next.kind {
                    TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowMappingEnd => {
                        self.put_back(next);
                        self.state = State::FlowMappingValue;
                        Ok(empty_scalar(token.mark))
                    }
                    _ => {
                        self.put_back(next);
                        self.states.push(State::FlowMappingValue);
                        self.parse_node(false, false)
                    }
                }
            }
            TokenKind::Value => {
                let mark = token.mark;
                self.put_back(token);
                self.state = State::FlowMappingValue;
                Ok(empty_scalar(mark))
            }
            _ => {
                // A key without a '?' indicator.
                self.put_back(token);
                self.states.push(State::FlowMappingEmptyValue);
                self.parse_node(false, false)
            }
        }
    }

    fn flow_mapping_value(&mut self, empty: bool) -> Result<Event> {
        if empty {
            let mark = self.peek_mark()?;
            self.state = State::FlowMappingKey;
            return Ok(empty_scalar(mark));
        }
        let token = self.next_tok()?;
        match token.kind {
            TokenKind::Value => {
                let next = self.next_tok()?;
                match next.kind {
                    TokenKind::FlowEntry | TokenKind::FlowMappingEnd => {
                        self.put_back(next);
                        self.state = State::FlowMappingKey;
                        Ok(empty_scalar(token.mark))
                    }
                    _ => {
                        self.put_back(next);
                        self.states.push(State::FlowMappingKey);
                        self.parse_node(false, false)
                    }
                }
            }
            _ => {
                let mark = token.mark;
                self.put_back(token);
                self.state = State::FlowMappingKey;
                Ok(empty_scalar(mark))
            }
        }
    }
}

/// Implicit-tag flags per the round-trip contract: a plain untagged
/// scalar (or one tagged with the non-specific `!`) may be re-emitted
/// plain without a tag; any other untagged scalar may be re-emitted
/// quoted without one.
fn scalar_event(
    anchor: Option<String>,
    tag: Option<String>,
    value: String,
    style: ScalarStyle,
    mark: Mark,
) -> Event {
    let plain_implicit =
        (style == ScalarStyle::Plain && tag.is_none()) || tag.as_deref() == Some("!");
    let quoted_implicit = !plain_implicit && tag.is_none();
    Event::at(
        EventKind::Scalar {
            anchor,
            tag,
            value,
            style,
            plain_implicit,
            quoted_implicit,
        },
        mark,
    )
}

fn empty_scalar(mark: Mark) -> Event {
    scalar_event(None, None, String::new(), ScalarStyle::Plain, mark)
}

impl Iterator for Parser {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(source: &str) -> Vec<EventKind> {
        Parser::new(source)
            .map(|e| e.unwrap().kind)
            .collect()
    }

    fn scalar_value(kind: &EventKind) -> &str {
        match kind {
            EventKind::Scalar { value, .. } => value,
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_mapping_events() {
        let evs = events("key: value\n");
        assert_eq!(evs.len(), 8);
        assert_eq!(evs[0], EventKind::StreamStart);
        assert!(matches!(evs[1], EventKind::DocumentStart { implicit: true, .. }));
        assert!(matches!(
            evs[2],
            EventKind::MappingStart {
                style: CollectionStyle::Block,
                ..
            }
        ));
        assert_eq!(scalar_value(&evs[3]), "key");
        assert_eq!(scalar_value(&evs[4]), "value");
        assert_eq!(evs[5], EventKind::MappingEnd);
        assert!(matches!(evs[6], EventKind::DocumentEnd { implicit: true }));
        assert_eq!(evs[7], EventKind::StreamEnd);
    }

    #[test]
    fn test_block_sequence_events() {
        let evs = events("- a\n- b\n");
        assert!(matches!(
            evs[2],
            EventKind::SequenceStart {
                style: CollectionStyle::Block,
                ..
            }
        ));
        assert_eq!(scalar_value(&evs[3]), "a");
        assert_eq!(scalar_value(&evs[4]), "b");
        assert_eq!(evs[5], EventKind::SequenceEnd);
    }

    #[test]
    fn test_nested_block_collections() {
        let evs = events("outer:\n  - 1\n  - inner: x\n");
        assert!(matches!(evs[2], EventKind::MappingStart { .. }));
        assert_eq!(scalar_value(&evs[3]), "outer");
        assert!(matches!(evs[4], EventKind::SequenceStart { .. }));
        assert_eq!(scalar_value(&evs[5]), "1");
        assert!(matches!(evs[6], EventKind::MappingStart { .. }));
        assert_eq!(scalar_value(&evs[7]), "inner");
        assert_eq!(scalar_value(&evs[8]), "x");
        assert_eq!(evs[9], EventKind::MappingEnd);
        assert_eq!(evs[10], EventKind::SequenceEnd);
        assert_eq!(evs[11], EventKind::MappingEnd);
    }

    #[test]
    fn test_flow_collections() {
        let evs = events("{a: [1, 2], b: {}}");
        assert!(matches!(
            evs[2],
            EventKind::MappingStart {
                style: CollectionStyle::Flow,
                ..
            }
        ));
        assert_eq!(scalar_value(&evs[3]), "a");
        assert!(matches!(
            evs[4],
            EventKind::SequenceStart {
                style: CollectionStyle::Flow,
                ..
            }
        ));
        assert_eq!(scalar_value(&evs[5]), "1");
        assert_eq!(scalar_value(&evs[6]), "2");
        assert_eq!(evs[7], EventKind::SequenceEnd);
        assert_eq!(scalar_value(&evs[8]), "b");
        assert!(matches!(evs[9], EventKind::MappingStart { .. }));
        assert_eq!(evs[10], EventKind::MappingEnd);
        assert_eq!(evs[11], EventKind::MappingEnd);
    }

    #[test]
    fn test_anchor_and_alias() {
        let evs = events("- &x a\n- *x\n");
        match &evs[3] {
            EventKind::Scalar { anchor, value, .. } => {
                assert_eq!(anchor.as_deref(), Some("x"));
                assert_eq!(value, "a");
            }
            other => panic!("expected scalar, got {:?}", other),
        }
        assert_eq!(
            evs[4],
            EventKind::Alias {
                anchor: "x".into()
            }
        );
    }

    #[test]
    fn test_undefined_alias() {
        let err = Parser::new("- *nope\n")
            .find_map(|r| r.err())
            .unwrap();
        assert!(matches!(err, ParseError::UndefinedAlias { .. }));
    }

    #[test]
    fn test_duplicate_anchor() {
        let err = Parser::new("- &x a\n- &x b\n")
            .find_map(|r| r.err())
            .unwrap();
        assert!(matches!(err, ParseError::DuplicateAnchor { .. }));
    }

    #[test]
    fn test_anchor_scope_resets_per_document() {
        let err = Parser::new("&x a\n---\n*x\n").find_map(|r| r.err()).unwrap();
        assert!(matches!(err, ParseError::UndefinedAlias { .. }));
    }

    #[test]
    fn test_multiple_documents() {
        let evs = events("---\none\n---\ntwo\n");
        let starts = evs
            .iter()
            .filter(|e| matches!(e, EventKind::DocumentStart { .. }))
            .count();
        assert_eq!(starts, 2);
        assert_eq!(scalar_value(&evs[2]), "one");
    }

    #[test]
    fn test_explicit_document_end() {
        let evs = events("---\nx\n...\n");
        assert!(evs
            .iter()
            .any(|e| matches!(e, EventKind::DocumentEnd { implicit: false })));
    }

    #[test]
    fn test_tag_shorthand_resolution() {
        let evs = events("%TAG !e! tag:example.com,2000:\n---\n!e!widget x\n");
        match &evs[2] {
            EventKind::Scalar { tag, .. } => {
                assert_eq!(tag.as_deref(), Some("tag:example.com,2000:widget"));
            }
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_secondary_handle_resolution() {
        let evs = events("!!str 1\n");
        match &evs[2] {
            EventKind::Scalar {
                tag,
                plain_implicit,
                quoted_implicit,
                ..
            } => {
                assert_eq!(tag.as_deref(), Some("tag:yaml.org,2002:str"));
                assert!(!plain_implicit);
                assert!(!quoted_implicit);
            }
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_handle() {
        let err = Parser::new("!e!widget x\n").find_map(|r| r.err()).unwrap();
        assert!(matches!(err, ParseError::BadDirective { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let err = Parser::new("%YAML 2.0\n---\nx\n")
            .find_map(|r| r.err())
            .unwrap();
        assert!(matches!(err, ParseError::BadDirective { .. }));
    }

    #[test]
    fn test_implicit_flags() {
        match &events("true\n")[2] {
            EventKind::Scalar {
                plain_implicit,
                quoted_implicit,
                ..
            } => {
                assert!(plain_implicit);
                assert!(!quoted_implicit);
            }
            other => panic!("expected scalar, got {:?}", other),
        }
        match &events("\"true\"\n")[2] {
            EventKind::Scalar {
                plain_implicit,
                quoted_implicit,
                ..
            } => {
                assert!(!plain_implicit);
                assert!(quoted_implicit);
            }
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_value_synthesized() {
        let evs = events("key:\nother: x\n");
        assert_eq!(scalar_value(&evs[3]), "key");
        assert_eq!(scalar_value(&evs[4]), "");
        assert_eq!(scalar_value(&evs[5]), "other");
    }

    #[test]
    fn test_indentless_sequence() {
        let evs = events("key:\n- a\n- b\n");
        assert!(matches!(evs[4], EventKind::SequenceStart { .. }));
        assert_eq!(scalar_value(&evs[5]), "a");
        assert_eq!(scalar_value(&evs[6]), "b");
        assert_eq!(evs[7], EventKind::SequenceEnd);
    }

    #[test]
    fn test_flow_single_pair_mapping() {
        let evs = events("[a: b]\n");
        assert!(matches!(evs[2], EventKind::SequenceStart { .. }));
        assert!(matches!(evs[3], EventKind::MappingStart { .. }));
        assert_eq!(scalar_value(&evs[4]), "a");
        assert_eq!(scalar_value(&evs[5]), "b");
        assert_eq!(evs[6], EventKind::MappingEnd);
        assert_eq!(evs[7], EventKind::SequenceEnd);
    }

    #[test]
    fn test_misindented_mapping_rejected() {
        assert!(Parser::new("a: b\n c: d\n").any(|r| r.is_err()));
    }

    #[test]
    fn test_tab_indentation_surfaces_as_scan_error() {
        let err = Parser::new("a:\n\tb: c\n").find_map(|r| r.err()).unwrap();
        assert!(matches!(err, ParseError::Scan(_)));
    }

    #[test]
    fn test_iteration_fuses_after_error() {
        let mut parser = Parser::new("- *nope\n");
        let mut saw_error = false;
        for item in &mut parser {
            if item.is_err() {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
        assert!(parser.next().is_none());
    }
}
