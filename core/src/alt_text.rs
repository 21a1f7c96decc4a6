//! HTML to plain text, for the alternate body of HTML-only mail.
//!
//! - tags are stripped; block elements and `<br>` emit line breaks
//! - content of `<head>`, `<script>` and `<style>` is discarded
//! - links whose text differs from their target render as `text [href]`
//! - entities are decoded and inline whitespace collapses to one space

use crate::tokenizer::{tokenize, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

static HREF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\shref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid href regex")
});

const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tr",
    "ul",
];

/// The longest entity name we bother looking up, `&hellip;` style.
const MAX_ENTITY_LEN: usize = 10;

/// Convert `html` to readable plain text. Never fails.
pub fn html_to_text(html: &str) -> String {
    let mut out = TextWriter::default();
    let mut skipping: Option<&'static str> = None;
    let mut open_anchor: Option<(String, usize)> = None;

    for token in tokenize(html) {
        if token.kind == TokenKind::Text {
            if skipping.is_none() {
                out.push_text(&decode_entities(token.content));
            }
            continue;
        }

        let Some(tag) = Tag::parse(token.content) else {
            continue;
        };

        if let Some(name) = skipping {
            if tag.closing && tag.name == name {
                skipping = None;
            }
            continue;
        }

        if !tag.closing {
            if let Some(name) = SKIPPED_ELEMENTS.iter().find(|name| **name == tag.name) {
                skipping = Some(*name);
                continue;
            }
        }

        match (tag.name.as_str(), tag.closing) {
            ("br", _) => out.newline(),
            ("a", false) => {
                open_anchor = href_of(token.content).map(|href| (href, out.len()));
            }
            ("a", true) => {
                if let Some((href, start)) = open_anchor.take() {
                    out.close_anchor(&href, start);
                }
            }
            (name, _) if BLOCK_ELEMENTS.iter().any(|block| *block == name) => out.block_break(),
            _ => {}
        }
    }

    out.finish()
}

struct Tag {
    name: String,
    closing: bool,
}

impl Tag {
    /// Name and direction of a `<...>` token; `None` for comments, doctypes
    /// and other constructs without an element name.
    fn parse(token: &str) -> Option<Self> {
        let inner = token.strip_prefix('<')?.trim_start();
        let (closing, inner) = match inner.strip_prefix('/') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, inner),
        };
        let name: String = inner
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        (!name.is_empty()).then_some(Self { name, closing })
    }
}

fn href_of(tag: &str) -> Option<String> {
    let caps = HREF_REGEX.captures(tag)?;
    let raw = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))?
        .as_str();
    Some(decode_entities(raw.trim()))
}

#[derive(Default)]
struct TextWriter {
    text: String,
}

impl TextWriter {
    fn len(&self) -> usize {
        self.text.len()
    }

    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                if !self.text.is_empty() && !self.text.ends_with([' ', '\n']) {
                    self.text.push(' ');
                }
            } else {
                self.text.push(c);
            }
        }
    }

    fn trim_trailing_spaces(&mut self) {
        let kept = self.text.trim_end_matches(' ').len();
        self.text.truncate(kept);
    }

    fn newline(&mut self) {
        self.trim_trailing_spaces();
        self.text.push('\n');
    }

    /// End the current paragraph with a blank line.
    fn block_break(&mut self) {
        self.trim_trailing_spaces();
        if self.text.is_empty() {
            return;
        }
        let trailing = self.text.len() - self.text.trim_end_matches('\n').len();
        for _ in trailing..2 {
            self.text.push('\n');
        }
    }

    fn close_anchor(&mut self, href: &str, start: usize) {
        if href.is_empty() {
            return;
        }
        let label = self.text.get(start..).unwrap_or("").trim();
        let bare = href.strip_prefix("mailto:").unwrap_or(href);
        if label == href || label == bare {
            return;
        }

        self.trim_trailing_spaces();
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push(' ');
        }
        self.text.push('[');
        self.text.push_str(href);
        self.text.push(']');
    }

    fn finish(self) -> String {
        let lines: Vec<&str> = self.text.lines().map(str::trim_end).collect();
        lines.join("\n").trim().to_string()
    }
}

/// Decode named and numeric character references. Unknown or malformed
/// references are kept literally.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest[1..]
            .find(';')
            .filter(|semi| *semi <= MAX_ENTITY_LEN)
            .and_then(|semi| decode_entity(&rest[1..=semi]).map(|c| (c, semi + 2)));

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let (digits, radix) = match number.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16),
            None => (number, 10),
        };
        // from_str_radix would also take a leading sign
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        let code = u32::from_str_radix(digits, radix).ok()?;
        return char::from_u32(code).filter(|c| *c != '\0');
    }

    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "euro" => '\u{20ac}',
        _ => return None,
    };
    Some(c)
}
