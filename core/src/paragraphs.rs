//! Wraps blank-line separated blocks of text in `<p>` tags.

const BLOCK_PREFIXES: &[&str] = &["<p>", "<p ", "<div>", "<div "];

/// Turn loose text into paragraphs.
///
/// Text that already opens with a `<p>` or `<div>` is returned trimmed but
/// otherwise unchanged. Otherwise every block between `\n\n` separators is
/// wrapped on its own, skipping blocks that already open with one of those
/// tags, and the blocks are joined with a single newline.
pub fn wrap_paragraphs(text: &str) -> String {
    let text = text.trim_matches([' ', '\t', '\n', '\r', '\0', '\x0B']);

    if starts_with_block_tag(text) {
        return text.to_string();
    }

    text.split("\n\n")
        .map(|block| {
            if starts_with_block_tag(block) {
                block.to_string()
            } else {
                format!("<p>{block}</p>")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn starts_with_block_tag(text: &str) -> bool {
    let head = text.as_bytes();
    BLOCK_PREFIXES.iter().any(|prefix| {
        head.get(..prefix.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(prefix.as_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_separate_paragraphs() {
        assert_eq!(wrap_paragraphs("A\n\nB"), "<p>A</p>\n<p>B</p>");
    }

    #[test]
    fn single_newlines_stay_inside_a_paragraph() {
        assert_eq!(wrap_paragraphs("line one\nline two"), "<p>line one\nline two</p>");
    }

    #[test]
    fn existing_block_markup_is_left_alone() {
        assert_eq!(wrap_paragraphs("<p>Hello</p>"), "<p>Hello</p>");
        assert_eq!(wrap_paragraphs("  <DIV class=\"x\">Hi</DIV>\n"), "<DIV class=\"x\">Hi</DIV>");
    }

    #[test]
    fn wrapping_is_idempotent() {
        let once = wrap_paragraphs("A\n\nB\n\nC");
        assert_eq!(wrap_paragraphs(&once), once);
    }

    #[test]
    fn blocks_with_their_own_markup_are_not_rewrapped() {
        assert_eq!(
            wrap_paragraphs("Intro\n\n<div>Box</div>\n\nOutro"),
            "<p>Intro</p>\n<div>Box</div>\n<p>Outro</p>"
        );
    }

    #[test]
    fn paragraph_lookalikes_are_wrapped() {
        assert_eq!(wrap_paragraphs("<pre>x</pre>"), "<p><pre>x</pre></p>");
    }

    #[test]
    fn empty_text_becomes_an_empty_paragraph() {
        assert_eq!(wrap_paragraphs("  \n "), "<p></p>");
    }
}
