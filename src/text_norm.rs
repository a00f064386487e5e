//! Text normalization helpers shared across indexing, matching and
//! substitution.
//!
//! The normalization here must stay in lockstep with whatever the NER
//! service applies to its input stream: paragraph matching hashes both
//! sides after the same trimming, and the token aligner assumes both texts
//! tokenize on the same whitespace conventions.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAB_NBSP_RE: Regex = Regex::new(r"[\t\u{a0}]+").expect("invalid regex");
    static ref INLINE_WS_RE: Regex = Regex::new(r"[^\S\r\n]+").expect("invalid regex");
    static ref NEWLINE_RUN_RE: Regex = Regex::new(r"\n+").expect("invalid regex");
    static ref SPACE_RUN_RE: Regex = Regex::new(r" +").expect("invalid regex");
    static ref TOKEN_RE: Regex = Regex::new(r"\S+").expect("invalid regex");
}

/// Normalize a text fragment the way the model's input stream is
/// normalized: tab/NBSP runs become one space, runs of non-newline
/// whitespace collapse to one space, and repeated newlines squeeze to one.
pub fn normalize_text(text: &str) -> String {
    let text = TAB_NBSP_RE.replace_all(text, " ");
    let text = INLINE_WS_RE.replace_all(&text, " ");
    NEWLINE_RUN_RE.replace_all(&text, "\n").into_owned()
}

/// Collapse runs of whitespace-except-newlines to a single space.
pub fn collapse_inline_whitespace(text: &str) -> String {
    INLINE_WS_RE.replace_all(text, " ").into_owned()
}

/// Collapse runs of plain spaces to a single space.
pub fn collapse_spaces(text: &str) -> String {
    SPACE_RUN_RE.replace_all(text, " ").into_owned()
}

/// Escape `&`, `<` and `>` for embedding in XML text content.
pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Undo entity escaping of angle brackets so placeholder tokens read as
/// `<PER>` in plain-text output.
pub fn xml_unescape_angles(text: &str) -> String {
    text.replace("&lt;", "<").replace("&gt;", ">")
}

/// Split into whitespace tokens, line by line. A token never spans a
/// newline.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.lines()
        .flat_map(|line| line.split_whitespace())
        .collect()
}

/// Byte spans of whitespace tokens within `text`, in order.
pub fn token_spans(text: &str) -> Vec<(usize, usize)> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Slice `text` by character indices, end-exclusive, clamped to the text
/// length.
pub fn slice_chars(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_tabs_and_nbsp() {
        assert_eq!(normalize_text("a\t\tb\u{a0}c"), "a b c");
    }

    #[test]
    fn normalize_preserves_single_newlines() {
        assert_eq!(normalize_text("a  b\n\n\nc   d"), "a b\nc d");
    }

    #[test]
    fn normalize_keeps_leading_and_trailing_space() {
        // Fragment-level normalization must not trim: order-preserving
        // concatenation of fragments relies on their boundary spaces.
        assert_eq!(normalize_text(" Juan  "), " Juan ");
    }

    #[test]
    fn escape_round_trip_for_placeholders() {
        let escaped = xml_escape(" <PER>");
        assert_eq!(escaped, " &lt;PER&gt;");
        assert_eq!(xml_unescape_angles(&escaped), " <PER>");
    }

    #[test]
    fn tokenize_never_spans_newlines() {
        assert_eq!(tokenize("uno dos\ntres  cuatro"), vec!["uno", "dos", "tres", "cuatro"]);
    }

    #[test]
    fn token_spans_are_byte_offsets() {
        // "Pérez" is 6 bytes; spans must be byte-addressed for XML splicing.
        let spans = token_spans("Juan Pérez ya");
        assert_eq!(spans, vec![(0, 4), (5, 11), (12, 14)]);
    }

    #[test]
    fn slice_chars_is_char_addressed() {
        assert_eq!(slice_chars("Marrón.", 0, 6), "Marrón");
        assert_eq!(slice_chars("abc", 1, 99), "bc");
    }
}
