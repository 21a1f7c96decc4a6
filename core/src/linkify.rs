//! Linkifier
//!
//! Turns bare URLs, `www.`/`ftp.` host names and email addresses found in
//! text into anchors. Existing markup is left alone, and nothing inside
//! `<code>`, `<pre>`, `<script>` or `<style>` is touched.
//!
//! Processing per eligible text token:
//! 1. URL pass (`scheme://...`), a hand-written scanner
//! 2. bare `www.` / `ftp.` host pass
//! 3. email address pass
//!
//! A final cleanup collapses anchors that ended up nested inside anchors.

use crate::config::LinkifyOptions;
use crate::sanitizer::sanitize_url_with;
use crate::tokenizer::{is_space, tokenize, VerbatimTracker};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Text tokens longer than this are split before scanning.
const LONG_TOKEN_LIMIT: usize = 10_000;
/// Target chunk size when splitting; leaves room for scheme and parentheses.
const CHUNK_GOAL: usize = 2_100;
/// Chunks longer than this had no whitespace to split on and are left as-is.
const CHUNK_LIMIT: usize = 2_101;
const MAX_SCHEME_LEN: usize = 20;
/// Upper bound on the non-whitespace run following `scheme://`.
const MAX_URL_RUN: usize = 2_000;

static WEB_FTP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([ \t\n\x0B\x0C\r>])((?:www|ftp)\.[0-9a-z_\x{80}-\x{10FFFF}#$%&~/.;:=,?@\[\]+\-]+)")
        .expect("valid www/ftp regex")
});

// ASCII-only classes: Unicode case folding would let U+212A pass as `k`.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i-u)([ \t\n\x0B\x0C\r>])([.0-9a-z_+\-]+)@((?:[0-9a-z\-]+\.)+[0-9a-z]{2,})")
        .expect("valid email regex")
});

// <a ...><a ...>text</a></a>
static NESTED_ANCHOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<a(?:[ \r\n\t]+[^>]+?>|>))<a [^>]+?>([^>]+?)</a></a>")
        .expect("valid nested anchor regex")
});

/// Linkify `text`, returning HTML.
pub fn linkify(text: &str, options: &LinkifyOptions) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut tracker = VerbatimTracker::new();

    for token in tokenize(text) {
        let piece = token.content;
        tracker.observe(piece);

        if tracker.is_verbatim()
            || piece.is_empty()
            || (piece.starts_with('<') && !starts_with_bracketed_scheme(piece))
        {
            out.push_str(piece);
            continue;
        }

        if piece.len() > LONG_TOKEN_LIMIT {
            log::debug!("splitting {} byte text token before linkifying", piece.len());
            for chunk in split_by_whitespace(piece, CHUNK_GOAL) {
                if chunk.len() > CHUNK_LIMIT {
                    out.push_str(chunk);
                } else {
                    out.push_str(&linkify(chunk, options));
                }
            }
        } else {
            out.push_str(&linkify_piece(piece, options));
        }
    }

    NESTED_ANCHOR_REGEX
        .replace_all(&out, "${1}${2}</a>")
        .into_owned()
}

/// Split `text` into chunks of roughly `goal` bytes, cutting only after
/// whitespace.
///
/// Each chunk keeps its trailing delimiter, so joining the chunks gives back
/// the input. A chunk longer than `goal` has no inner whitespace to cut at.
pub fn split_by_whitespace(text: &str, goal: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > goal {
        let bytes = rest.as_bytes();
        let cut = bytes[..=goal]
            .iter()
            .rposition(|b| is_space(*b))
            .or_else(|| {
                bytes[goal + 1..]
                    .iter()
                    .position(|b| is_space(*b))
                    .map(|offset| goal + 1 + offset)
            });
        let Some(cut) = cut else {
            break;
        };

        let (chunk, tail) = rest.split_at(cut + 1);
        chunks.push(chunk);
        rest = tail;
    }

    if !rest.is_empty() {
        chunks.push(rest);
    }

    chunks
}

fn linkify_piece(piece: &str, options: &LinkifyOptions) -> String {
    // Padding lets every pattern rely on a boundary character on both sides.
    let padded = format!(" {piece} ");
    let linked = link_urls(&padded, options);
    let linked = link_web_ftp(&linked, options);
    let linked = link_emails(&linked);

    let trimmed = linked.strip_prefix(' ').unwrap_or(&linked);
    trimmed.strip_suffix(' ').unwrap_or(trimmed).to_string()
}

/// `<` optionally followed by whitespace, then `scheme://`.
fn starts_with_bracketed_scheme(piece: &str) -> bool {
    let bytes = piece.as_bytes();
    let start = 1 + bytes[1..].iter().take_while(|b| is_space(**b)).count();
    let scheme_len = scheme_len_at(bytes, start);
    scheme_len > 0 && bytes[start + scheme_len..].starts_with(b"://")
}

fn is_word(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Characters allowed anywhere in a URL body.
fn is_url_char(byte: u8) -> bool {
    is_word(byte) || byte >= 0x80 || b"#%~/@[]*(+=&$-".contains(&byte)
}

/// Characters allowed in a URL body only when more URL follows.
fn is_url_punct(byte: u8) -> bool {
    b"'.,;:!?)".contains(&byte)
}

fn is_url_lead(byte: u8) -> bool {
    is_space(byte) || b"(<.,;:!?".contains(&byte)
}

/// Length of the scheme starting at `start`, capped at twenty word characters
/// without backtracking.
fn scheme_len_at(bytes: &[u8], start: usize) -> usize {
    bytes[start.min(bytes.len())..]
        .iter()
        .take(MAX_SCHEME_LEN)
        .take_while(|b| is_word(**b))
        .count()
}

/// Byte offsets of one URL match inside the padded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UrlMatch {
    /// The leading boundary character.
    start: usize,
    url_start: usize,
    url_end: usize,
    /// `url_end`, or one past a trailing `)`.
    end: usize,
}

fn match_url_at(bytes: &[u8], start: usize) -> Option<UrlMatch> {
    if !is_url_lead(bytes[start]) {
        return None;
    }

    let url_start = start + 1;
    let scheme_len = scheme_len_at(bytes, url_start);
    if scheme_len == 0 || !bytes[url_start + scheme_len..].starts_with(b"://") {
        return None;
    }

    let body_start = url_start + scheme_len + 3;
    let run = bytes[body_start..]
        .iter()
        .take_while(|b| !is_space(**b))
        .count();
    if run == 0 || run > MAX_URL_RUN || body_start + run >= bytes.len() {
        return None;
    }

    let consume_url_chars = |mut at: usize| {
        while at < bytes.len() && is_url_char(bytes[at]) {
            at += 1;
        }
        at
    };

    let mut url_end = consume_url_chars(body_start);
    while url_end + 1 < bytes.len()
        && is_url_punct(bytes[url_end])
        && is_url_char(bytes[url_end + 1])
    {
        url_end = consume_url_chars(url_end + 1);
    }

    let end = if bytes.get(url_end) == Some(&b')') {
        url_end + 1
    } else {
        url_end
    };

    Some(UrlMatch {
        start,
        url_start,
        url_end,
        end,
    })
}

fn link_urls(text: &str, options: &LinkifyOptions) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0usize;
    let mut pos = 0usize;

    while pos < bytes.len() {
        match match_url_at(bytes, pos) {
            Some(found) => {
                out.push_str(&text[copied..found.start]);
                out.push_str(&render_url(text, found, options));
                copied = found.end;
                pos = found.end;
            }
            None => pos += 1,
        }
    }
    out.push_str(&text[copied..]);

    out
}

fn render_url(text: &str, found: UrlMatch, options: &LinkifyOptions) -> String {
    let lead = &text[found.start..found.url_start];
    let trailing = &text[found.url_end..found.end];
    let mut url = text[found.url_start..found.url_end].to_string();
    let mut suffix = String::new();

    // A trailing `)` belongs to the URL only if the URL opened one.
    if trailing == ")" && url.find('(').is_some_and(|at| at > 0) {
        url.push(')');
    } else {
        suffix.push_str(trailing);
    }

    while url.matches('(').count() < url.matches(')').count() {
        let Some(cut) = url.rfind(')') else {
            break;
        };
        suffix.insert_str(0, &url[cut..]);
        url.truncate(cut);
    }

    let url = sanitize_url_with(&url, &options.allowed_schemes);
    if url.is_empty() {
        return text[found.start..found.end].to_string();
    }

    format!("{lead}{}{suffix}", anchor(&url, &url))
}

fn link_web_ftp(text: &str, options: &LinkifyOptions) -> String {
    WEB_FTP_REGEX
        .replace_all(text, |caps: &Captures| {
            let mut dest = format!("http://{}", &caps[2]);
            let mut trailing = String::new();
            if dest.ends_with(['.', ',', ';', ':', ')']) {
                if let Some(last) = dest.pop() {
                    trailing.push(last);
                }
            }

            let dest = sanitize_url_with(&dest, &options.allowed_schemes);
            if dest.is_empty() {
                return caps[0].to_string();
            }

            format!("{}{}{trailing}", &caps[1], anchor(&dest, &dest))
        })
        .into_owned()
}

fn link_emails(text: &str) -> String {
    EMAIL_REGEX
        .replace_all(text, |caps: &Captures| {
            let email = format!("{}@{}", &caps[2], &caps[3]);
            format!("{}{}", &caps[1], anchor(&format!("mailto:{email}"), &email))
        })
        .into_owned()
}

fn anchor(href: &str, text: &str) -> String {
    format!("<a href=\"{href}\">{text}</a>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(text: &str) -> String {
        linkify(text, &LinkifyOptions::default())
    }

    #[test]
    fn trailing_sentence_punctuation_is_not_linked() {
        assert_eq!(
            link("Check http://example.com/page."),
            "Check <a href=\"http://example.com/page\">http://example.com/page</a>."
        );
        assert_eq!(
            link("Really? https://example.com/a?b=1&c=2!"),
            "Really? <a href=\"https://example.com/a?b=1&c=2\">https://example.com/a?b=1&c=2</a>!"
        );
    }

    #[test]
    fn balanced_parentheses_stay_in_the_url() {
        assert_eq!(
            link("See http://en.wikipedia.org/wiki/PHP_(programming_language) here"),
            "See <a href=\"http://en.wikipedia.org/wiki/PHP_(programming_language)\">\
             http://en.wikipedia.org/wiki/PHP_(programming_language)</a> here"
        );
    }

    #[test]
    fn enclosing_parentheses_stay_outside_the_url() {
        assert_eq!(
            link("(http://example.com)"),
            "(<a href=\"http://example.com\">http://example.com</a>)"
        );
        assert_eq!(
            link("(see http://example.com/a_(b))"),
            "(see <a href=\"http://example.com/a_(b)\">http://example.com/a_(b)</a>)"
        );
    }

    #[test]
    fn unbalanced_closing_parentheses_move_to_the_suffix() {
        assert_eq!(
            link("x http://example.com/a)b) y"),
            "x <a href=\"http://example.com/a\">http://example.com/a</a>)b) y"
        );
    }

    #[test]
    fn verbatim_regions_are_untouched() {
        let input = "<pre>Visit http://example.com</pre>";
        assert_eq!(link(input), input);

        assert_eq!(
            link("<code>http://a.com</code> http://b.com"),
            "<code>http://a.com</code> <a href=\"http://b.com\">http://b.com</a>"
        );
        let nested = "<pre><code>x</code> www.example.com</pre>";
        assert_eq!(link(nested), nested);
    }

    #[test]
    fn existing_anchors_are_not_double_wrapped() {
        let input = "<a href=\"http://example.com\">http://example.com</a>";
        assert_eq!(link(input), input);
    }

    #[test]
    fn bare_www_and_ftp_hosts_get_http() {
        assert_eq!(
            link("Go to www.example.com."),
            "Go to <a href=\"http://www.example.com\">http://www.example.com</a>."
        );
        assert_eq!(
            link("Files: ftp.example.org/pub"),
            "Files: <a href=\"http://ftp.example.org/pub\">http://ftp.example.org/pub</a>"
        );
    }

    #[test]
    fn emails_become_mailto_links() {
        assert_eq!(
            link("Contact a.b@example.co.uk now"),
            "Contact <a href=\"mailto:a.b@example.co.uk\">a.b@example.co.uk</a> now"
        );
        assert_eq!(
            link("a@b.cc, x@y.dd"),
            "<a href=\"mailto:a@b.cc\">a@b.cc</a>, <a href=\"mailto:x@y.dd\">x@y.dd</a>"
        );
    }

    #[test]
    fn email_lookalike_letters_are_not_linked() {
        assert_eq!(link("x \u{212A}@example.com y"), "x \u{212A}@example.com y");
        assert_eq!(link("x a@exam\u{17F}ple.com y"), "x a@exam\u{17F}ple.com y");
    }

    #[test]
    fn email_inside_a_url_is_left_in_the_url() {
        assert_eq!(
            link("see http://user@example.com/x"),
            "see <a href=\"http://user@example.com/x\">http://user@example.com/x</a>"
        );
    }

    #[test]
    fn disallowed_schemes_are_left_as_text() {
        let input = "click javascript://alert(1) now";
        assert_eq!(link(input), input);
        assert!(!link("javascript:alert(1)").contains("<a"));
    }

    #[test]
    fn custom_scheme_list_limits_links() {
        let options = LinkifyOptions {
            allowed_schemes: vec!["https".to_string()],
        };
        assert_eq!(linkify("http://example.com", &options), "http://example.com");
        assert_eq!(
            linkify("https://example.com", &options),
            "<a href=\"https://example.com\">https://example.com</a>"
        );
    }

    #[test]
    fn bracketed_urls_are_linked_inside_the_brackets() {
        assert_eq!(
            link("<http://example.com>"),
            "<<a href=\"http://example.com\">http://example.com</a>>"
        );
    }

    #[test]
    fn overlong_schemes_and_urls_are_ignored() {
        let scheme = format!("{}://example.com", "a".repeat(21));
        assert_eq!(link(&scheme), scheme);

        let url = format!("http://example.com/{}", "a".repeat(MAX_URL_RUN));
        assert_eq!(link(&url), url);
    }

    #[test]
    fn long_tokens_are_chunked_and_still_linked() {
        let words = "lorem ipsum ".repeat(1_000);
        let input = format!("{words}http://example.com {words}");
        let output = link(&input);
        assert!(output.contains("<a href=\"http://example.com\">http://example.com</a>"));
        assert_eq!(output.len(), input.len() + "<a href=\"http://example.com\"></a>".len());
    }

    #[test]
    fn oversized_chunks_are_emitted_unlinked() {
        let blob = "b".repeat(2_150);
        let filler = "c ".repeat(5_000);
        let input = format!("{blob},http://example.com x {filler}http://example.org {filler}");
        let output = link(&input);

        assert!(output.starts_with(&format!("{blob},http://example.com x c c")));
        assert!(!output.contains("href=\"http://example.com\""));
        assert!(output.contains("<a href=\"http://example.org\">http://example.org</a>"));
    }

    #[test]
    fn split_by_whitespace_matches_reference_chunks() {
        let input = "1234 67890 1234 67890a cd 1234   890 123456789 1234567890a    45678   1 3 5 7 90 ";
        assert_eq!(
            split_by_whitespace(input, 10),
            vec![
                "1234 67890 ",
                "1234 ",
                "67890a cd ",
                "1234   890 ",
                "123456789 ",
                "1234567890a ",
                "   45678   ",
                "1 3 5 7 90 ",
            ]
        );
    }

    #[test]
    fn split_by_whitespace_is_lossless() {
        let inputs = ["", "short", "no-whitespace-at-all-here", "a\tb\nc\rd e\x0Bf\x0Cg"];
        for input in inputs {
            assert_eq!(split_by_whitespace(input, 3).concat(), input);
        }
    }

    #[test]
    fn non_ascii_text_survives() {
        assert_eq!(
            link("Café → http://exämple.com/ü ok"),
            "Café → <a href=\"http://exämple.com/ü\">http://exämple.com/ü</a> ok"
        );
    }
}
