//! Per-paragraph alignment tables.
//!
//! Bridges the two coordinate systems: the token aligner works over the
//! paragraph's text streams, while patching needs absolute byte offsets
//! into the XML file. Each row pins one source token (file, paragraph,
//! fragment, byte span) to the replacement text the aligner chose for it.

use std::collections::BTreeMap;

use crate::labels::{merge_consecutive_labels, replace_labels_in_text};
use crate::matching::MatchedParagraph;
use crate::seq_align::{align_text, AlignedToken};
use crate::text_norm::token_spans;

/// One source token with its absolute byte span and replacement target.
#[derive(Debug, Clone)]
pub struct TokenRow {
    pub xml_file: String,
    pub paragraph_index: usize,
    pub fragment_index: usize,
    pub token_index: usize,
    pub token: String,
    /// Absolute byte offset of the token within its XML file.
    pub start_char: usize,
    pub end_char: usize,
    /// Replacement text: empty for a deleted token, the token itself when
    /// unchanged, the placeholder label on the first token of a replaced
    /// span.
    pub target: String,
}

/// A fragment-level splice: all of a fragment's token targets joined, and
/// the byte span they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentEdit {
    pub xml_file: String,
    pub paragraph_index: usize,
    pub fragment_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub target: String,
}

/// Blank a row's target when it repeats the previous row's target, unless
/// the row is a verbatim match echoing its own source token. A multi-token
/// replaced span carries its label on every gap row; this keeps only the
/// first so the placeholder is emitted once. Legitimately repeated words
/// (target == own source) are never dropped.
fn collapse_repeated_targets(rows: &mut [AlignedToken]) {
    let mut previous: Option<String> = None;
    for row in rows.iter_mut() {
        let original = row.target.clone();
        if let Some(prev_target) = &previous {
            if *prev_target == row.target && row.target != row.source {
                row.target.clear();
            }
        }
        previous = Some(original);
    }
}

/// Build the alignment table for one matched paragraph.
///
/// The source stream is the raw fragment text (joined with spaces, so
/// fragment boundaries tokenize cleanly); the target stream is the
/// paragraph's placeholder-substituted prediction text. Both are wrapped
/// in `<START>`/`<END>` sentinels before alignment and the sentinel rows
/// are stripped here.
pub fn gen_alignment_table(matched: &MatchedParagraph) -> Vec<TokenRow> {
    let paragraph = &matched.paragraph;
    let meta = &paragraph.metadata;

    let original_text = meta
        .fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let merged = merge_consecutive_labels(&paragraph.plain_text, &matched.prediction.labels);
    let anonymized_text = replace_labels_in_text(&paragraph.plain_text, &merged);

    let mut aligned = align_text(
        &format!("<START> {original_text} <END>"),
        &format!("<START> {anonymized_text} <END>"),
    );
    collapse_repeated_targets(&mut aligned);

    // Strip the sentinel rows
    let aligned: &[AlignedToken] = if aligned.len() >= 2 {
        &aligned[1..aligned.len() - 1]
    } else {
        &[]
    };

    let mut rows = Vec::with_capacity(aligned.len());
    let mut row_index = 0usize;

    for (fragment_index, fragment) in meta.fragments.iter().enumerate() {
        for (token_index, &(token_start, token_end)) in
            token_spans(&fragment.text).iter().enumerate()
        {
            let start = meta.start + fragment.start + token_start;
            let end = meta.start + fragment.start + token_end;
            let target = aligned
                .get(row_index)
                .map(|r| r.target.clone())
                .unwrap_or_default();

            rows.push(TokenRow {
                xml_file: meta.xml_file.clone(),
                paragraph_index: fragment.paragraph_index,
                fragment_index,
                token_index,
                token: fragment.text[token_start..token_end].to_string(),
                start_char: start,
                end_char: end,
                target,
            });
            row_index += 1;
        }
    }

    if row_index != aligned.len() {
        log::warn!(
            "alignment row count mismatch in {} (paragraph at byte {}): {} source tokens vs {} aligned rows",
            meta.xml_file,
            meta.start,
            row_index,
            aligned.len()
        );
    }

    rows
}

/// Group token rows into fragment-level edits: targets joined with spaces,
/// spans widened to min start / max end. Grouping is keyed and ordered by
/// `(xml_file, paragraph_index, fragment_index)` so the output is
/// deterministic.
pub fn group_fragment_edits(rows: &[TokenRow]) -> Vec<FragmentEdit> {
    let mut groups: BTreeMap<(String, usize, usize), FragmentEdit> = BTreeMap::new();

    for row in rows {
        let key = (row.xml_file.clone(), row.paragraph_index, row.fragment_index);
        groups
            .entry(key)
            .and_modify(|edit| {
                edit.target.push(' ');
                edit.target.push_str(&row.target);
                edit.start_char = edit.start_char.min(row.start_char);
                edit.end_char = edit.end_char.max(row.end_char);
            })
            .or_insert_with(|| FragmentEdit {
                xml_file: row.xml_file.clone(),
                paragraph_index: row.paragraph_index,
                fragment_index: row.fragment_index,
                start_char: row.start_char,
                end_char: row.end_char,
                target: row.target.clone(),
            });
    }

    groups.into_values().collect()
}
