//! Phase 1: Scanner
//!
//! The scanner converts source text into a lexical token stream. It
//! performs:
//! - Indentation tracking (block structure markers via an indent stack)
//! - Simple-key bookkeeping (implicit `key:` detection with retroactive
//!   Key token insertion)
//! - Scalar scanning for all five styles, with line-break normalization
//! - Anchor, alias, tag, and directive scanning
//!
//! The token stream is a single forward pass: tokens are produced lazily
//! and cannot be replayed once consumed.

use std::collections::VecDeque;

use crate::error::{ScanError, ScanResult};
use crate::event::ScalarStyle;
use crate::mark::Mark;

/// A lexical token with the position it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub mark: Mark,
    pub kind: TokenKind,
}

/// Token kinds produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    StreamStart,
    StreamEnd,
    /// `%YAML major.minor`
    VersionDirective(u32, u32),
    /// `%TAG handle prefix`
    TagDirective(String, String),
    /// `---`
    DocumentStart,
    /// `...`
    DocumentEnd,
    /// Start of a block sequence, synthesized from indentation.
    BlockSequenceStart,
    /// Start of a block mapping, synthesized from indentation.
    BlockMappingStart,
    /// End of a block collection, synthesized from dedent.
    BlockEnd,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    /// `- ` entry indicator.
    BlockEntry,
    /// `,` separator.
    FlowEntry,
    /// `?` indicator, or synthesized before an implicit key.
    Key,
    /// `:` indicator.
    Value,
    /// `*name`
    Alias(String),
    /// `&name`
    Anchor(String),
    /// `(handle, suffix)`; an empty handle means a verbatim tag.
    Tag(String, String),
    Scalar(ScalarStyle, String),
}

/// A potential implicit key recorded before a flow node.
#[derive(Debug, Clone, Copy)]
struct SimpleKey {
    possible: bool,
    /// Required keys (at the block indentation level) must find their ':'.
    required: bool,
    /// Stream-wide number of the token the key would become.
    token_number: usize,
    mark: Mark,
}

impl SimpleKey {
    fn none() -> Self {
        SimpleKey {
            possible: false,
            required: false,
            token_number: 0,
            mark: Mark::default(),
        }
    }
}

const EOF: char = '\0';

fn is_z(c: char) -> bool {
    c == EOF
}

fn is_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn is_breakz(c: char) -> bool {
    is_break(c) || is_z(c)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_blankz(c: char) -> bool {
    is_blank(c) || is_breakz(c)
}

fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

fn is_anchor_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Convert source text into a lazy token stream.
#[derive(Debug)]
pub struct Scanner {
    chars: Vec<char>,
    mark: Mark,
    stream_start_produced: bool,
    stream_end_produced: bool,
    /// Current block indentation level; -1 before any block context.
    indent: isize,
    indents: Vec<isize>,
    /// Whether an implicit key may start at the current position.
    simple_key_allowed: bool,
    /// One slot per flow level, plus one for the block context.
    simple_keys: Vec<SimpleKey>,
    flow_level: usize,
    tokens: VecDeque<Token>,
    /// Number of tokens already handed to the caller.
    tokens_parsed: usize,
    token_available: bool,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            mark: Mark::default(),
            stream_start_produced: false,
            stream_end_produced: false,
            indent: -1,
            indents: Vec::new(),
            simple_key_allowed: false,
            simple_keys: Vec::new(),
            flow_level: 0,
            tokens: VecDeque::new(),
            tokens_parsed: 0,
            token_available: false,
        }
    }

    /// Produce the next token, or `None` after `StreamEnd`.
    pub fn next_token(&mut self) -> ScanResult<Option<Token>> {
        if self.stream_end_produced {
            return Ok(None);
        }
        if !self.token_available {
            self.fetch_more_tokens()?;
        }
        let token = match self.tokens.pop_front() {
            Some(token) => token,
            None => return Ok(None),
        };
        self.token_available = false;
        self.tokens_parsed += 1;
        if token.kind == TokenKind::StreamEnd {
            self.stream_end_produced = true;
        }
        Ok(Some(token))
    }

    // ========================================================================
    // Cursor primitives
    // ========================================================================

    fn ch(&self) -> char {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> char {
        self.chars
            .get(self.mark.index + offset)
            .copied()
            .unwrap_or(EOF)
    }

    fn next_is(&self, prefix: &str) -> bool {
        prefix
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == c)
    }

    /// Advance over a non-break character.
    fn skip(&mut self) {
        self.mark.index += 1;
        self.mark.col += 1;
    }

    /// Advance over a line break (`\n`, `\r`, or `\r\n`).
    fn skip_line(&mut self) {
        if self.ch() == '\r' && self.peek(1) == '\n' {
            self.mark.index += 2;
        } else {
            self.mark.index += 1;
        }
        self.mark.line += 1;
        self.mark.col = 0;
    }

    /// Consume a line break, normalized to `\n`.
    fn read_break(&mut self, out: &mut String) {
        self.skip_line();
        out.push('\n');
    }

    // ========================================================================
    // Token queue management
    // ========================================================================

    fn fetch_more_tokens(&mut self) -> ScanResult<()> {
        loop {
            let mut need_more = self.tokens.is_empty();
            if !need_more {
                self.stale_simple_keys()?;
                // A pending simple key may still turn the next fetched
                // token into its value; keep fetching until settled.
                need_more = self
                    .simple_keys
                    .iter()
                    .any(|sk| sk.possible && sk.token_number == self.tokens_parsed);
            }
            if !need_more {
                break;
            }
            self.fetch_next_token()?;
        }
        self.token_available = true;
        Ok(())
    }

    fn fetch_next_token(&mut self) -> ScanResult<()> {
        if !self.stream_start_produced {
            return self.fetch_stream_start();
        }
        self.skip_to_next_token()?;
        self.stale_simple_keys()?;
        self.unroll_indent(self.mark.col as isize);

        let c = self.ch();
        if is_z(c) {
            return self.fetch_stream_end();
        }
        let nc = self.peek(1);
        match c {
            '%' if self.mark.col == 0 => return self.fetch_directive(),
            '-' if self.mark.col == 0 && self.next_is("---") && is_blankz(self.peek(3)) => {
                return self.fetch_document_indicator(TokenKind::DocumentStart)
            }
            '.' if self.mark.col == 0 && self.next_is("...") && is_blankz(self.peek(3)) => {
                return self.fetch_document_indicator(TokenKind::DocumentEnd)
            }
            '[' => return self.fetch_flow_collection_start(TokenKind::FlowSequenceStart),
            '{' => return self.fetch_flow_collection_start(TokenKind::FlowMappingStart),
            ']' => return self.fetch_flow_collection_end(TokenKind::FlowSequenceEnd),
            '}' => return self.fetch_flow_collection_end(TokenKind::FlowMappingEnd),
            ',' => return self.fetch_flow_entry(),
            '-' if is_blankz(nc) => return self.fetch_block_entry(),
            '?' if self.flow_level > 0 || is_blankz(nc) => return self.fetch_key(),
            ':' if self.flow_level > 0 || is_blankz(nc) => return self.fetch_value(),
            '*' => return self.fetch_anchor(true),
            '&' => return self.fetch_anchor(false),
            '!' => return self.fetch_tag(),
            '|' if self.flow_level == 0 => return self.fetch_block_scalar(true),
            '>' if self.flow_level == 0 => return self.fetch_block_scalar(false),
            '\'' => return self.fetch_flow_scalar(true),
            '"' => return self.fetch_flow_scalar(false),
            _ => {}
        }
        if self.can_start_plain(c, nc) {
            return self.fetch_plain_scalar();
        }
        Err(ScanError::UnexpectedCharacter(c, self.mark))
    }

    fn can_start_plain(&self, c: char, nc: char) -> bool {
        match c {
            c if is_blankz(c) => false,
            '-' => !is_blankz(nc),
            '?' | ':' => self.flow_level == 0 && !is_blankz(nc),
            ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"'
            | '%' | '@' | '`' => false,
            _ => true,
        }
    }

    /// Skip blanks, comments, and line breaks between tokens.
    fn skip_to_next_token(&mut self) -> ScanResult<()> {
        loop {
            if self.mark.index == 0 && self.ch() == '\u{feff}' {
                self.skip();
                continue;
            }
            let c = self.ch();
            if c == ' ' {
                self.skip();
            } else if c == '\t' {
                // Tabs separate tokens only where no indentation (and
                // hence no simple key) is expected.
                if self.flow_level > 0 || !self.simple_key_allowed {
                    self.skip();
                } else {
                    return Err(ScanError::TabInIndentation(self.mark));
                }
            } else if c == '#' {
                while !is_breakz(self.ch()) {
                    self.skip();
                }
            } else if is_break(c) {
                self.skip_line();
                if self.flow_level == 0 {
                    self.simple_key_allowed = true;
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Simple keys and indentation
    // ========================================================================

    /// Expire simple keys whose line (or 1024-character window) has passed.
    fn stale_simple_keys(&mut self) -> ScanResult<()> {
        for sk in &mut self.simple_keys {
            if sk.possible
                && (sk.mark.line < self.mark.line || sk.mark.index + 1024 < self.mark.index)
            {
                if sk.required {
                    return Err(ScanError::ExpectedColon(sk.mark));
                }
                sk.possible = false;
            }
        }
        Ok(())
    }

    fn save_simple_key(&mut self) -> ScanResult<()> {
        if !self.simple_key_allowed {
            return Ok(());
        }
        let sk = SimpleKey {
            possible: true,
            required: self.flow_level == 0 && self.indent == self.mark.col as isize,
            token_number: self.tokens_parsed + self.tokens.len(),
            mark: self.mark,
        };
        self.remove_simple_key()?;
        if let Some(last) = self.simple_keys.last_mut() {
            *last = sk;
        }
        Ok(())
    }

    fn remove_simple_key(&mut self) -> ScanResult<()> {
        if let Some(last) = self.simple_keys.last_mut() {
            if last.possible && last.required {
                return Err(ScanError::ExpectedColon(last.mark));
            }
            last.possible = false;
        }
        Ok(())
    }

    /// Open a block collection if `col` increases the indentation level.
    /// `number` places the synthesized token before a retroactive Key.
    fn roll_indent(&mut self, col: usize, number: Option<usize>, kind: TokenKind, mark: Mark) {
        if self.flow_level > 0 {
            return;
        }
        if self.indent < col as isize {
            self.indents.push(self.indent);
            self.indent = col as isize;
            let token = Token { mark, kind };
            match number {
                Some(n) => self.tokens.insert(n - self.tokens_parsed, token),
                None => self.tokens.push_back(token),
            }
        }
    }

    /// Close block collections down to `col`, emitting BlockEnd for each.
    fn unroll_indent(&mut self, col: isize) {
        if self.flow_level > 0 {
            return;
        }
        while self.indent > col {
            self.tokens.push_back(Token {
                mark: self.mark,
                kind: TokenKind::BlockEnd,
            });
            self.indent = self.indents.pop().unwrap_or(-1);
        }
    }

    fn push(&mut self, mark: Mark, kind: TokenKind) {
        self.tokens.push_back(Token { mark, kind });
    }

    // ========================================================================
    // Fetchers
    // ========================================================================

    fn fetch_stream_start(&mut self) -> ScanResult<()> {
        self.indent = -1;
        self.simple_keys.push(SimpleKey::none());
        self.simple_key_allowed = true;
        self.stream_start_produced = true;
        self.push(self.mark, TokenKind::StreamStart);
        Ok(())
    }

    fn fetch_stream_end(&mut self) -> ScanResult<()> {
        // Normalize the position to a fresh line for BlockEnd marks.
        if self.mark.col != 0 {
            self.mark.col = 0;
            self.mark.line += 1;
        }
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        self.push(self.mark, TokenKind::StreamEnd);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> ScanResult<()> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let start = self.mark;
        self.skip();
        self.skip();
        self.skip();
        self.push(start, kind);
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, kind: TokenKind) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_keys.push(SimpleKey::none());
        self.flow_level += 1;
        self.simple_key_allowed = true;
        let start = self.mark;
        self.skip();
        self.push(start, kind);
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, kind: TokenKind) -> ScanResult<()> {
        self.remove_simple_key()?;
        if self.flow_level > 0 {
            self.flow_level -= 1;
            self.simple_keys.pop();
        }
        self.simple_key_allowed = false;
        let start = self.mark;
        self.skip();
        self.push(start, kind);
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> ScanResult<()> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start = self.mark;
        self.skip();
        self.push(start, TokenKind::FlowEntry);
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> ScanResult<()> {
        if self.flow_level > 0 || !self.simple_key_allowed {
            return Err(ScanError::BlockEntryNotAllowed(self.mark));
        }
        self.roll_indent(
            self.mark.col,
            None,
            TokenKind::BlockSequenceStart,
            self.mark,
        );
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start = self.mark;
        self.skip();
        self.push(start, TokenKind::BlockEntry);
        Ok(())
    }

    fn fetch_key(&mut self) -> ScanResult<()> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return Err(ScanError::KeyNotAllowed(self.mark));
            }
            self.roll_indent(
                self.mark.col,
                None,
                TokenKind::BlockMappingStart,
                self.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = self.flow_level == 0;
        let start = self.mark;
        self.skip();
        self.push(start, TokenKind::Key);
        Ok(())
    }

    fn fetch_value(&mut self) -> ScanResult<()> {
        let sk = self
            .simple_keys
            .last()
            .copied()
            .unwrap_or_else(SimpleKey::none);
        if sk.possible {
            // The saved node was an implicit key: insert its Key token
            // (and a BlockMappingStart if this opens a new level) where
            // the key began.
            self.tokens.insert(
                sk.token_number - self.tokens_parsed,
                Token {
                    mark: sk.mark,
                    kind: TokenKind::Key,
                },
            );
            self.roll_indent(
                sk.mark.col,
                Some(sk.token_number),
                TokenKind::BlockMappingStart,
                sk.mark,
            );
            if let Some(last) = self.simple_keys.last_mut() {
                last.possible = false;
            }
            self.simple_key_allowed = false;
        } else {
            if self.flow_level == 0 {
                if !self.simple_key_allowed {
                    return Err(ScanError::ValueNotAllowed(self.mark));
                }
                self.roll_indent(
                    self.mark.col,
                    None,
                    TokenKind::BlockMappingStart,
                    self.mark,
                );
            }
            self.simple_key_allowed = self.flow_level == 0;
        }
        let start = self.mark;
        self.skip();
        self.push(start, TokenKind::Value);
        Ok(())
    }

    fn fetch_anchor(&mut self, alias: bool) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let start = self.mark;
        self.skip(); // '&' or '*'
        let mut name = String::new();
        while is_anchor_char(self.ch()) {
            name.push(self.ch());
            self.skip();
        }
        let terminator_ok = is_blankz(self.ch())
            || matches!(self.ch(), '?' | ':' | ',' | ']' | '}' | '%' | '@' | '`');
        if name.is_empty() || !terminator_ok {
            return Err(ScanError::InvalidAnchor(start));
        }
        let kind = if alias {
            TokenKind::Alias(name)
        } else {
            TokenKind::Anchor(name)
        };
        self.push(start, kind);
        Ok(())
    }

    fn fetch_tag(&mut self) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, literal: bool) -> ScanResult<()> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(literal)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, single: bool) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(single)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_plain_scalar()?;
        self.tokens.push_back(token);
        Ok(())
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn fetch_directive(&mut self) -> ScanResult<()> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;

        let start = self.mark;
        self.skip(); // '%'
        let mut name = String::new();
        while self.ch().is_ascii_alphanumeric() || self.ch() == '-' || self.ch() == '_' {
            name.push(self.ch());
            self.skip();
        }
        if name.is_empty() {
            return Err(ScanError::InvalidDirective(start));
        }
        let token = match name.as_str() {
            "YAML" => Some(self.scan_version_directive_value(start)?),
            "TAG" => Some(self.scan_tag_directive_value(start)?),
            _ => {
                // Unknown directives are skipped.
                while !is_breakz(self.ch()) {
                    self.skip();
                }
                None
            }
        };
        // Only blanks and a comment may follow on the directive line.
        while is_blank(self.ch()) {
            self.skip();
        }
        if self.ch() == '#' {
            while !is_breakz(self.ch()) {
                self.skip();
            }
        }
        if !is_breakz(self.ch()) {
            return Err(ScanError::InvalidDirective(self.mark));
        }
        if is_break(self.ch()) {
            self.skip_line();
        }
        if let Some(token) = token {
            self.tokens.push_back(token);
        }
        Ok(())
    }

    fn scan_version_directive_value(&mut self, start: Mark) -> ScanResult<Token> {
        while is_blank(self.ch()) {
            self.skip();
        }
        let major = self.scan_version_number()?;
        if self.ch() != '.' {
            return Err(ScanError::InvalidDirective(self.mark));
        }
        self.skip();
        let minor = self.scan_version_number()?;
        Ok(Token {
            mark: start,
            kind: TokenKind::VersionDirective(major, minor),
        })
    }

    fn scan_version_number(&mut self) -> ScanResult<u32> {
        let mut value: u32 = 0;
        let mut digits = 0;
        while self.ch().is_ascii_digit() {
            if digits >= 9 {
                return Err(ScanError::InvalidDirective(self.mark));
            }
            value = value * 10 + (self.ch() as u32 - '0' as u32);
            digits += 1;
            self.skip();
        }
        if digits == 0 {
            return Err(ScanError::InvalidDirective(self.mark));
        }
        Ok(value)
    }

    fn scan_tag_directive_value(&mut self, start: Mark) -> ScanResult<Token> {
        while is_blank(self.ch()) {
            self.skip();
        }
        let handle = self.scan_tag_handle(true)?;
        while is_blank(self.ch()) {
            self.skip();
        }
        let prefix = self.scan_tag_uri(true)?;
        if prefix.is_empty() || !is_blankz(self.ch()) {
            return Err(ScanError::InvalidDirective(self.mark));
        }
        Ok(Token {
            mark: start,
            kind: TokenKind::TagDirective(handle, prefix),
        })
    }

    // ========================================================================
    // Tags
    // ========================================================================

    fn scan_tag(&mut self) -> ScanResult<Token> {
        let start = self.mark;
        let handle;
        let suffix;
        if self.peek(1) == '<' {
            // Verbatim tag: !<uri>
            self.skip();
            self.skip();
            let uri = self.scan_tag_uri(true)?;
            if uri.is_empty() || self.ch() != '>' {
                return Err(ScanError::InvalidTag(start));
            }
            self.skip();
            handle = String::new();
            suffix = uri;
        } else if is_blankz(self.peek(1))
            || (self.flow_level > 0 && is_flow_indicator(self.peek(1)))
        {
            // The non-specific '!' tag.
            self.skip();
            handle = String::from("!");
            suffix = String::new();
        } else {
            let h = self.scan_tag_handle(false)?;
            let rest = self.scan_tag_uri(false)?;
            if h.len() > 1 && h.ends_with('!') {
                // "!!suffix" or "!named!suffix"
                if rest.is_empty() {
                    return Err(ScanError::InvalidTag(start));
                }
                handle = h;
                suffix = rest;
            } else {
                // "!suffix" - the handle scan consumed suffix characters.
                handle = String::from("!");
                suffix = format!("{}{}", &h[1..], rest);
                if suffix.is_empty() {
                    return Err(ScanError::InvalidTag(start));
                }
            }
        }
        if !(is_blankz(self.ch()) || (self.flow_level > 0 && is_flow_indicator(self.ch()))) {
            return Err(ScanError::InvalidTag(self.mark));
        }
        Ok(Token {
            mark: start,
            kind: TokenKind::Tag(handle, suffix),
        })
    }

    fn scan_tag_handle(&mut self, directive: bool) -> ScanResult<String> {
        let start = self.mark;
        if self.ch() != '!' {
            return Err(ScanError::InvalidTag(start));
        }
        let mut handle = String::from("!");
        self.skip();
        while self.ch().is_ascii_alphanumeric() || self.ch() == '-' || self.ch() == '_' {
            handle.push(self.ch());
            self.skip();
        }
        if self.ch() == '!' {
            handle.push('!');
            self.skip();
        } else if directive && handle != "!" {
            // A %TAG handle other than '!' must close with '!'.
            return Err(ScanError::InvalidTag(start));
        }
        Ok(handle)
    }

    /// Scan a tag suffix, prefix, or verbatim URI, decoding %-escapes.
    /// `extended` admits flow indicators (directive prefixes and verbatim
    /// tags); node suffixes exclude them inside flow collections.
    fn scan_tag_uri(&mut self, extended: bool) -> ScanResult<String> {
        let mut bytes: Vec<u8> = Vec::new();
        loop {
            let c = self.ch();
            if c == '%' {
                let m = self.mark;
                self.skip();
                let hi = self.scan_hex_digit(m)?;
                let lo = self.scan_hex_digit(m)?;
                bytes.push((hi << 4 | lo) as u8);
            } else if self.is_uri_char(c, extended) {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                self.skip();
            } else {
                break;
            }
        }
        String::from_utf8(bytes).map_err(|_| ScanError::InvalidTag(self.mark))
    }

    fn scan_hex_digit(&mut self, m: Mark) -> ScanResult<u32> {
        let d = self
            .ch()
            .to_digit(16)
            .ok_or(ScanError::InvalidTag(m))?;
        self.skip();
        Ok(d)
    }

    fn is_uri_char(&self, c: char, extended: bool) -> bool {
        if c.is_ascii_alphanumeric() || "-;/?:@&=+$_.!~*'()".contains(c) {
            return true;
        }
        if matches!(c, ',' | '[' | ']') {
            return extended || self.flow_level == 0;
        }
        false
    }

    // ========================================================================
    // Block scalars
    // ========================================================================

    fn scan_block_scalar(&mut self, literal: bool) -> ScanResult<Token> {
        let start = self.mark;
        self.skip(); // '|' or '>'

        // Header: chomping and indentation indicators, in either order.
        let mut chomping: i8 = 0;
        let mut increment: usize = 0;
        if self.ch() == '+' || self.ch() == '-' {
            chomping = if self.ch() == '+' { 1 } else { -1 };
            self.skip();
            if self.ch().is_ascii_digit() {
                increment = self.scan_indentation_indicator()?;
            }
        } else if self.ch().is_ascii_digit() {
            increment = self.scan_indentation_indicator()?;
            if self.ch() == '+' || self.ch() == '-' {
                chomping = if self.ch() == '+' { 1 } else { -1 };
                self.skip();
            }
        }
        while is_blank(self.ch()) {
            self.skip();
        }
        if self.ch() == '#' {
            while !is_breakz(self.ch()) {
                self.skip();
            }
        }
        if !is_breakz(self.ch()) {
            return Err(ScanError::InvalidBlockScalarHeader(self.mark));
        }
        if is_break(self.ch()) {
            self.skip_line();
        }

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut indent: usize = if increment > 0 {
            if self.indent >= 0 {
                self.indent as usize + increment
            } else {
                increment
            }
        } else {
            0
        };

        self.block_scalar_breaks(&mut indent, &mut trailing_breaks)?;

        let mut leading_blank = false;
        while self.mark.col == indent && !is_z(self.ch()) {
            let trailing_blank = is_blank(self.ch());
            // Folded style joins content lines with a space unless either
            // side is more-indented.
            if !literal && !leading_break.is_empty() && !leading_blank && !trailing_blank {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                }
                leading_break.clear();
            } else {
                string.push_str(&leading_break);
                leading_break.clear();
            }
            string.push_str(&trailing_breaks);
            trailing_breaks.clear();
            leading_blank = is_blank(self.ch());
            while !is_breakz(self.ch()) {
                string.push(self.ch());
                self.skip();
            }
            if is_z(self.ch()) {
                break;
            }
            self.read_break(&mut leading_break);
            self.block_scalar_breaks(&mut indent, &mut trailing_breaks)?;
        }

        // Chomping: clip keeps one final break, strip none, keep all.
        if chomping != -1 {
            string.push_str(&leading_break);
        }
        if chomping == 1 {
            string.push_str(&trailing_breaks);
        }
        let style = if literal {
            ScalarStyle::Literal
        } else {
            ScalarStyle::Folded
        };
        Ok(Token {
            mark: start,
            kind: TokenKind::Scalar(style, string),
        })
    }

    fn scan_indentation_indicator(&mut self) -> ScanResult<usize> {
        if self.ch() == '0' {
            return Err(ScanError::InvalidBlockScalarHeader(self.mark));
        }
        let n = self.ch() as usize - '0' as usize;
        self.skip();
        Ok(n)
    }

    /// Consume blank lines inside a block scalar, detecting the content
    /// indentation on the first non-empty line when not set explicitly.
    fn block_scalar_breaks(&mut self, indent: &mut usize, breaks: &mut String) -> ScanResult<()> {
        let mut max_indent = 0;
        loop {
            while (*indent == 0 || self.mark.col < *indent) && self.ch() == ' ' {
                self.skip();
            }
            if self.mark.col > max_indent {
                max_indent = self.mark.col;
            }
            if (*indent == 0 || self.mark.col < *indent) && self.ch() == '\t' {
                return Err(ScanError::TabInIndentation(self.mark));
            }
            if !is_break(self.ch()) {
                break;
            }
            self.read_break(breaks);
        }
        if *indent == 0 {
            let min = (self.indent + 1).max(1) as usize;
            *indent = max_indent.max(min);
        }
        Ok(())
    }

    // ========================================================================
    // Quoted scalars
    // ========================================================================

    fn scan_flow_scalar(&mut self, single: bool) -> ScanResult<Token> {
        let start = self.mark;
        self.skip(); // opening quote

        let quote = if single { '\'' } else { '"' };
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        loop {
            if self.mark.col == 0
                && (self.next_is("---") || self.next_is("..."))
                && is_blankz(self.peek(3))
            {
                return Err(ScanError::UnterminatedQuote(start));
            }
            if is_z(self.ch()) {
                return Err(ScanError::UnterminatedQuote(start));
            }
            let mut leading_blanks = false;
            while !is_blankz(self.ch()) {
                let c = self.ch();
                if single && c == '\'' && self.peek(1) == '\'' {
                    string.push('\'');
                    self.skip();
                    self.skip();
                } else if c == quote {
                    self.skip();
                    let style = if single {
                        ScalarStyle::SingleQuoted
                    } else {
                        ScalarStyle::DoubleQuoted
                    };
                    return Ok(Token {
                        mark: start,
                        kind: TokenKind::Scalar(style, string),
                    });
                } else if !single && c == '\\' && is_break(self.peek(1)) {
                    // Escaped line break: no fold, the break vanishes.
                    self.skip();
                    self.skip_line();
                    leading_blanks = true;
                    break;
                } else if !single && c == '\\' {
                    self.scan_double_quoted_escape(&mut string)?;
                } else {
                    string.push(c);
                    self.skip();
                }
            }
            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    // Blanks after a break are indentation, dropped.
                    if !leading_blanks {
                        whitespaces.push(self.ch());
                    }
                    self.skip();
                } else if !leading_blanks {
                    whitespaces.clear();
                    self.read_break(&mut leading_break);
                    leading_blanks = true;
                } else {
                    self.read_break(&mut trailing_breaks);
                }
            }
            if leading_blanks {
                // Fold: one break becomes a space, n breaks become n-1
                // newlines, an escaped break vanishes entirely.
                if leading_break.is_empty() {
                    string.push_str(&trailing_breaks);
                } else if trailing_breaks.is_empty() {
                    string.push(' ');
                } else {
                    string.push_str(&trailing_breaks);
                }
                leading_break.clear();
                trailing_breaks.clear();
            } else {
                string.push_str(&whitespaces);
                whitespaces.clear();
            }
        }
    }

    fn scan_double_quoted_escape(&mut self, out: &mut String) -> ScanResult<()> {
        let m = self.mark;
        self.skip(); // backslash
        let c = self.ch();
        let decoded = match c {
            '0' => '\0',
            'a' => '\x07',
            'b' => '\x08',
            't' | '\t' => '\t',
            'n' => '\n',
            'v' => '\x0b',
            'f' => '\x0c',
            'r' => '\r',
            'e' => '\x1b',
            ' ' => ' ',
            '"' => '"',
            '/' => '/',
            '\\' => '\\',
            'N' => '\u{85}',
            '_' => '\u{a0}',
            'L' => '\u{2028}',
            'P' => '\u{2029}',
            'x' => {
                self.skip();
                return self.scan_unicode_escape(out, 2, m);
            }
            'u' => {
                self.skip();
                return self.scan_unicode_escape(out, 4, m);
            }
            'U' => {
                self.skip();
                return self.scan_unicode_escape(out, 8, m);
            }
            _ => return Err(ScanError::InvalidEscape(m)),
        };
        out.push(decoded);
        self.skip();
        Ok(())
    }

    fn scan_unicode_escape(&mut self, out: &mut String, length: u32, m: Mark) -> ScanResult<()> {
        let mut value: u32 = 0;
        for _ in 0..length {
            let d = self.ch().to_digit(16).ok_or(ScanError::InvalidEscape(m))?;
            value = value << 4 | d;
            self.skip();
        }
        let c = char::from_u32(value).ok_or(ScanError::InvalidEscape(m))?;
        out.push(c);
        Ok(())
    }

    // ========================================================================
    // Plain scalars
    // ========================================================================

    fn scan_plain_scalar(&mut self) -> ScanResult<Token> {
        let start = self.mark;
        let indent = self.indent + 1;

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;
        loop {
            if self.mark.col == 0
                && (self.next_is("---") || self.next_is("..."))
                && is_blankz(self.peek(3))
            {
                break;
            }
            if self.ch() == '#' {
                break;
            }
            while !is_blankz(self.ch()) {
                let c = self.ch();
                if c == ':'
                    && (is_blankz(self.peek(1))
                        || (self.flow_level > 0 && is_flow_indicator(self.peek(1))))
                {
                    break;
                }
                if self.flow_level > 0 && is_flow_indicator(c) {
                    break;
                }
                // Join pending whitespace or folded breaks before the
                // next word.
                if leading_blanks {
                    if trailing_breaks.is_empty() {
                        string.push(' ');
                    } else {
                        string.push_str(&trailing_breaks);
                        trailing_breaks.clear();
                    }
                    leading_break.clear();
                    leading_blanks = false;
                } else if !whitespaces.is_empty() {
                    string.push_str(&whitespaces);
                    whitespaces.clear();
                }
                string.push(c);
                self.skip();
            }
            if !(is_blank(self.ch()) || is_break(self.ch())) {
                break;
            }
            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if leading_blanks && (self.mark.col as isize) < indent && self.ch() == '\t' {
                        return Err(ScanError::BadIndentation(self.mark));
                    }
                    if !leading_blanks {
                        whitespaces.push(self.ch());
                    }
                    self.skip();
                } else if !leading_blanks {
                    whitespaces.clear();
                    self.read_break(&mut leading_break);
                    leading_blanks = true;
                } else {
                    self.read_break(&mut trailing_breaks);
                }
            }
            // A continuation line must keep the scalar's indentation.
            if self.flow_level == 0 && (self.mark.col as isize) < indent {
                break;
            }
        }
        if leading_blanks {
            self.simple_key_allowed = true;
        }
        Ok(Token {
            mark: start,
            kind: TokenKind::Scalar(ScalarStyle::Plain, string),
        })
    }
}

impl Iterator for Scanner {
    type Item = ScanResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .map(|t| t.unwrap().kind)
            .collect()
    }

    #[test]
    fn test_scan_implicit_mapping() {
        assert_eq!(
            kinds("key: value\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockMappingStart,
                TokenKind::Key,
                TokenKind::Scalar(ScalarStyle::Plain, "key".into()),
                TokenKind::Value,
                TokenKind::Scalar(ScalarStyle::Plain, "value".into()),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_scan_block_sequence() {
        assert_eq!(
            kinds("- a\n- b\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockSequenceStart,
                TokenKind::BlockEntry,
                TokenKind::Scalar(ScalarStyle::Plain, "a".into()),
                TokenKind::BlockEntry,
                TokenKind::Scalar(ScalarStyle::Plain, "b".into()),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_scan_flow_sequence() {
        assert_eq!(
            kinds("[a, b]"),
            vec![
                TokenKind::StreamStart,
                TokenKind::FlowSequenceStart,
                TokenKind::Scalar(ScalarStyle::Plain, "a".into()),
                TokenKind::FlowEntry,
                TokenKind::Scalar(ScalarStyle::Plain, "b".into()),
                TokenKind::FlowSequenceEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_scan_quoted_scalars() {
        assert_eq!(
            kinds("'it''s'"),
            vec![
                TokenKind::StreamStart,
                TokenKind::Scalar(ScalarStyle::SingleQuoted, "it's".into()),
                TokenKind::StreamEnd,
            ]
        );
        assert_eq!(
            kinds("\"a\\nb\""),
            vec![
                TokenKind::StreamStart,
                TokenKind::Scalar(ScalarStyle::DoubleQuoted, "a\nb".into()),
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_scan_literal_chomping() {
        let clip = kinds("k: |\n  a\n  b\n");
        assert!(clip.contains(&TokenKind::Scalar(ScalarStyle::Literal, "a\nb\n".into())));
        let strip = kinds("k: |-\n  a\n  b\n");
        assert!(strip.contains(&TokenKind::Scalar(ScalarStyle::Literal, "a\nb".into())));
        let keep = kinds("k: |+\n  a\n\n");
        assert!(keep.contains(&TokenKind::Scalar(ScalarStyle::Literal, "a\n\n".into())));
    }

    #[test]
    fn test_scan_folded() {
        let toks = kinds("k: >\n  a\n  b\n");
        assert!(toks.contains(&TokenKind::Scalar(ScalarStyle::Folded, "a b\n".into())));
    }

    #[test]
    fn test_scan_multiline_plain_folds() {
        let toks = kinds("a\n b\n");
        assert!(toks.contains(&TokenKind::Scalar(ScalarStyle::Plain, "a b".into())));
    }

    #[test]
    fn test_tab_indentation_error() {
        let result: Result<Vec<_>, _> = Scanner::new("a:\n\tb: c\n").collect();
        assert!(matches!(result, Err(ScanError::TabInIndentation(_))));
    }

    #[test]
    fn test_unterminated_quote_error() {
        let result: Result<Vec<_>, _> = Scanner::new("'open").collect();
        assert!(matches!(result, Err(ScanError::UnterminatedQuote(_))));
    }

    #[test]
    fn test_invalid_escape_error() {
        let result: Result<Vec<_>, _> = Scanner::new("\"\\q\"").collect();
        assert!(matches!(result, Err(ScanError::InvalidEscape(_))));
    }

    #[test]
    fn test_scan_anchor_and_alias() {
        assert_eq!(
            kinds("- &a x\n- *a\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockSequenceStart,
                TokenKind::BlockEntry,
                TokenKind::Anchor("a".into()),
                TokenKind::Scalar(ScalarStyle::Plain, "x".into()),
                TokenKind::BlockEntry,
                TokenKind::Alias("a".into()),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_scan_directives() {
        assert_eq!(
            kinds("%YAML 1.2\n%TAG !e! tag:example.com,2000:\n---\nx\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::VersionDirective(1, 2),
                TokenKind::TagDirective("!e!".into(), "tag:example.com,2000:".into()),
                TokenKind::DocumentStart,
                TokenKind::Scalar(ScalarStyle::Plain, "x".into()),
                TokenKind::StreamEnd,
            ]
        );
    }
}
