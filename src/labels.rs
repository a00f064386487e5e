//! Label merging and placeholder substitution.
//!
//! A multi-token name is often predicted as several adjacent spans of the
//! same category; replacing each independently would emit one placeholder
//! per sub-span. Merging first collapses adjacent same-category spans
//! into one, so a span is redacted as a single `<CATEGORY>` token.
//!
//! Offset conventions, reproduced exactly as the upstream producer uses
//! them: the merger re-slices merged span text over `start..=end`
//! (inclusive end), while the substitution splice removes `start..end`
//! (exclusive end). Integrators wiring a different NER producer must
//! verify which convention that producer emits.

use crate::entities::{DocLabel, EntityAttributes};
use crate::text_norm::{collapse_spaces, slice_chars, xml_escape};

struct LabelGroup {
    start: usize,
    end: usize,
    category: String,
}

impl LabelGroup {
    fn close(self, text: &str) -> DocLabel {
        // Merged text comes from the original document slice, not from
        // concatenating sub-label texts: separator characters between the
        // merged spans stay visible in the provenance text.
        let merged_text = slice_chars(text, self.start, self.end + 1);
        DocLabel {
            text: merged_text.clone(),
            start_char: self.start,
            end_char: self.end,
            attrs: EntityAttributes {
                label: self.category,
                alt_text: Some(merged_text),
                alt_start_char: Some(self.start),
                alt_end_char: Some(self.end),
                ..Default::default()
            },
        }
    }
}

/// Merge consecutive same-category labels separated by at most one
/// character.
///
/// Labels are sorted by `start_char` first; the gap test measures from the
/// previous span's effective end (`aymurai_alt_end_char` when present) to
/// the next span's effective start. Merging is a fixed point: applying it
/// to its own output returns the same list.
pub fn merge_consecutive_labels(text: &str, labels: &[DocLabel]) -> Vec<DocLabel> {
    let mut sorted: Vec<&DocLabel> = labels.iter().collect();
    sorted.sort_by_key(|l| l.start_char);

    let mut merged: Vec<DocLabel> = Vec::with_capacity(sorted.len());
    let mut current: Option<LabelGroup> = None;

    for label in sorted {
        let start = label.effective_start();
        let end = label.effective_end();
        let category = label.attrs.label.clone();

        let extends_group = matches!(
            &current,
            Some(group) if group.category == category && start as i64 - group.end as i64 <= 1
        );

        if extends_group {
            current.as_mut().expect("group present").end = end;
        } else {
            if let Some(group) = current.take() {
                merged.push(group.close(text));
            }
            current = Some(LabelGroup {
                start,
                end,
                category,
            });
        }
    }

    if let Some(group) = current {
        merged.push(group.close(text));
    }

    merged
}

/// Replace each labeled span with its ` <CATEGORY>` placeholder token,
/// XML-escaped.
///
/// Labels MUST be pre-sorted by `start_char` (merge output already is):
/// the running offset compounds left to right, so out-of-order input is a
/// precondition violation, not a recoverable state. Runs of spaces are
/// collapsed and the result trimmed once all spans are spliced.
pub fn replace_labels_in_text(text: &str, labels: &[DocLabel]) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let mut offset: i64 = 0;

    for label in labels {
        let start = ((label.start_char as i64 + offset).max(0) as usize).min(chars.len());
        let end = ((label.end_char as i64 + offset).max(0) as usize).clamp(start, chars.len());

        let placeholder = xml_escape(&format!(" <{}>", label.attrs.label.to_uppercase()));
        let placeholder_chars: Vec<char> = placeholder.chars().collect();
        let replaced_len = end - start;

        chars.splice(start..end, placeholder_chars.iter().copied());
        offset += placeholder_chars.len() as i64 - replaced_len as i64;
    }

    let replaced: String = chars.into_iter().collect();
    collapse_spaces(&replaced).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_norm::xml_unescape_angles;

    fn label(text: &str, start: usize, end: usize, category: &str) -> DocLabel {
        DocLabel {
            text: text.to_string(),
            start_char: start,
            end_char: end,
            attrs: EntityAttributes {
                label: category.to_string(),
                ..Default::default()
            },
        }
    }

    const ACUSADO: &str = "Acusado: Ramiro Marrón DNI 34.555.666.";

    #[test]
    fn merges_adjacent_same_category_spans() {
        let labels = vec![
            label("Ramiro", 9, 15, "PER"),
            label("Marrón", 16, 22, "PER"),
        ];
        let merged = merge_consecutive_labels(ACUSADO, &labels);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_char, 9);
        assert_eq!(merged[0].end_char, 22);
        // Re-sliced from the original text, separator space included
        assert!(merged[0].text.starts_with("Ramiro Marrón"));
    }

    #[test]
    fn different_categories_never_merge() {
        let labels = vec![
            label("Ramiro Marrón", 9, 22, "PER"),
            label("34.555.666", 27, 37, "DNI"),
        ];
        let merged = merge_consecutive_labels(ACUSADO, &labels);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn wide_gap_blocks_merging() {
        // "Ramiro" and "34.555.666" share no category anyway; same-category
        // spans 5 chars apart must stay separate too.
        let text = "Ana y luego Eva";
        let labels = vec![label("Ana", 0, 3, "PER"), label("Eva", 12, 15, "PER")];
        let merged = merge_consecutive_labels(text, &labels);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merging_is_idempotent() {
        let labels = vec![
            label("Ramiro", 9, 15, "PER"),
            label("Marrón", 16, 22, "PER"),
            label("34.555.666", 27, 37, "DNI"),
        ];
        let once = merge_consecutive_labels(ACUSADO, &labels);
        let twice = merge_consecutive_labels(ACUSADO, &once);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.start_char, b.start_char);
            assert_eq!(a.end_char, b.end_char);
            assert_eq!(a.attrs.label, b.attrs.label);
        }
    }

    #[test]
    fn merged_labels_are_sorted_and_non_overlapping() {
        let labels = vec![
            label("34.555.666", 27, 37, "DNI"),
            label("Marrón", 16, 22, "PER"),
            label("Ramiro", 9, 15, "PER"),
        ];
        let merged = merge_consecutive_labels(ACUSADO, &labels);
        for pair in merged.windows(2) {
            assert!(pair[0].end_char <= pair[1].start_char);
        }
    }

    #[test]
    fn alt_span_overrides_merge_coordinates() {
        let text = "el 3 de mayo de 2023 firmó";
        let mut date = label("3 de mayo de 2023", 3, 20, "FECHA");
        date.attrs.alt_text = Some("2023-05-03".into());
        date.attrs.alt_start_char = Some(3);
        date.attrs.alt_end_char = Some(20);
        let merged = merge_consecutive_labels(text, &[date]);
        assert_eq!(merged[0].start_char, 3);
        assert_eq!(merged[0].end_char, 20);
    }

    #[test]
    fn acusado_scenario() {
        let labels = vec![
            label("Ramiro Marrón", 9, 22, "PER"),
            label("34.555.666", 27, 37, "DNI"),
        ];
        let merged = merge_consecutive_labels(ACUSADO, &labels);
        let replaced = replace_labels_in_text(ACUSADO, &merged);
        assert_eq!(
            xml_unescape_angles(&replaced),
            "Acusado: <PER> DNI <DNI>."
        );
    }

    #[test]
    fn substitution_length_accounting_is_exact() {
        // N - sum(end_i - start_i) + sum(L_i), no off-by-one drift
        let text = "0123456789abcdefghij";
        let labels = vec![label("2345", 2, 6, "NUM"), label("cdef", 12, 16, "PER")];
        let result = replace_labels_in_text(text, &labels);
        // " <NUM>" escapes to " &lt;NUM&gt;" (12 chars), same for PER.
        // No space runs form (placeholders land mid-word), no trim occurs.
        let expected_len = text.len() - (6 - 2) - (16 - 12) + 12 + 12;
        assert_eq!(result.chars().count(), expected_len);
    }

    #[test]
    fn substitution_collapses_spaces_and_trims() {
        let text = " Ramiro dijo";
        let labels = vec![label("Ramiro", 1, 7, "PER")];
        let replaced = replace_labels_in_text(text, &labels);
        assert_eq!(xml_unescape_angles(&replaced), "<PER> dijo");
    }

    #[test]
    fn empty_labels_only_normalizes_whitespace() {
        assert_eq!(replace_labels_in_text("  hola   mundo ", &[]), "hola mundo");
    }
}
