//! Tag/text tokenizer
//!
//! Splits markup into alternating text and tag tokens. This is not an HTML
//! parser: a tag is any `<`, a run of characters other than `<` and `>`, then
//! `>`. Concatenating the token contents always reproduces the input.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]+>").expect("valid tag regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub content: &'a str,
}

impl<'a> Token<'a> {
    fn text(content: &'a str) -> Self {
        Self {
            kind: TokenKind::Text,
            content,
        }
    }

    fn tag(content: &'a str) -> Self {
        Self {
            kind: TokenKind::Tag,
            content,
        }
    }
}

/// Tokenize `text` into text and tag tokens.
///
/// Text tokens are emitted between every pair of tags, even when empty, so the
/// sequence always alternates Text, Tag, Text, ... and starts and ends with
/// a text token.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0usize;

    for tag in TAG_REGEX.find_iter(text) {
        tokens.push(Token::text(&text[cursor..tag.start()]));
        tokens.push(Token::tag(tag.as_str()));
        cursor = tag.end();
    }
    tokens.push(Token::text(&text[cursor..]));

    tokens
}

/// Elements whose content is never linkified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbatimTag {
    Code,
    Pre,
    Script,
    Style,
}

impl VerbatimTag {
    const ALL: [VerbatimTag; 4] = [Self::Code, Self::Pre, Self::Script, Self::Style];

    fn name(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Pre => "pre",
            Self::Script => "script",
            Self::Style => "style",
        }
    }

    /// Matches `<name` followed by whitespace or `>`, ignoring case.
    fn opened_by(piece: &str) -> Option<Self> {
        let bytes = piece.as_bytes();
        if bytes.first() != Some(&b'<') {
            return None;
        }

        Self::ALL.into_iter().find(|tag| {
            let name = tag.name().as_bytes();
            let end = 1 + name.len();
            bytes.len() > end
                && bytes[1..end].eq_ignore_ascii_case(name)
                && (bytes[end] == b'>' || is_space(bytes[end]))
        })
    }

    /// Matches exactly `</name>`, ignoring case.
    fn closed_by(piece: &str) -> Option<Self> {
        let inner = piece.strip_prefix("</")?.strip_suffix('>')?;
        Self::ALL
            .into_iter()
            .find(|tag| inner.eq_ignore_ascii_case(tag.name()))
    }
}

/// Tracks how deep the current position is nested inside verbatim elements.
///
/// Close tags only decrement the depth while it is positive, so stray closes
/// never push it below zero.
#[derive(Debug, Clone, Default)]
pub struct VerbatimTracker {
    depth: usize,
}

impl VerbatimTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the depth for the next piece of the token stream.
    pub fn observe(&mut self, piece: &str) {
        if VerbatimTag::opened_by(piece).is_some() {
            self.depth += 1;
        } else if self.depth > 0 && VerbatimTag::closed_by(piece).is_some() {
            self.depth -= 1;
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_verbatim(&self) -> bool {
        self.depth > 0
    }
}

/// ASCII whitespace as understood by the link patterns: space, `\t`, `\n`,
/// `\v`, `\f`, `\r`.
pub(crate) fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}
