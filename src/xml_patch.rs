//! In-place XML patching.
//!
//! Fragment-level edits are spliced into the raw XML at descending start
//! offsets — earlier (higher-offset) splices must not invalidate the
//! stored offsets of later (lower-offset) ones. After all splices, a
//! normalization pass rewrites whitespace at run boundaries, pins
//! `xml:space="preserve"` on every surviving text node, and removes runs
//! the substitution emptied. Normalization shifts offsets, so it MUST run
//! after the last splice.

use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use crate::alignment_table::{gen_alignment_table, group_fragment_edits, FragmentEdit};
use crate::matching::MatchedParagraph;
use crate::text_norm::collapse_inline_whitespace;
use crate::xml_index::find_paragraph_blocks;

lazy_static! {
    static ref HYPERLINK_OPEN_RE: Regex =
        Regex::new(r"<w:hyperlink[^>]*>").expect("invalid regex");
    static ref RUN_RE: Regex = Regex::new(r"(?s)<w:r(?: [^>]*)?>.*?</w:r>").expect("invalid regex");
    static ref WT_RE: Regex =
        Regex::new(r"<w:t((?: [^>]*)?)>([^<]*)</w:t>").expect("invalid regex");
    static ref XML_SPACE_RE: Regex = Regex::new(r#"xml:space="[^"]*""#).expect("invalid regex");
}

/// Apply every matched paragraph's replacements to the extracted DOCX
/// parts under `base_dir`, in place. XML parts without edits are left
/// byte-identical.
pub fn replace_text_in_xml(matched: &[MatchedParagraph], base_dir: &Path) -> Result<()> {
    let mut rows = Vec::new();
    for paragraph in matched {
        rows.extend(gen_alignment_table(paragraph));
    }
    let edits = group_fragment_edits(&rows);

    let mut per_file: BTreeMap<&str, Vec<&FragmentEdit>> = BTreeMap::new();
    for edit in &edits {
        per_file.entry(edit.xml_file.as_str()).or_default().push(edit);
    }

    for (xml_file, mut file_edits) in per_file {
        let path = base_dir.join(xml_file);
        let mut content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read XML part: {}", path.display()))?;

        // Descending offsets keep the remaining edits' spans valid
        file_edits.sort_by(|a, b| b.end_char.cmp(&a.end_char));
        for edit in file_edits {
            let target = collapse_inline_whitespace(&edit.target);
            content.replace_range(edit.start_char..edit.end_char, &target);
        }

        let content = normalize_document(&content);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write XML part: {}", path.display()))?;
    }

    Ok(())
}

/// Normalize a patched XML part:
/// - unwrap `<w:hyperlink>` elements, keeping the runs they contain;
/// - per paragraph, collapse each text run's non-newline whitespace, give
///   the first non-empty run no leading space and every subsequent
///   non-empty run exactly one, and trim trailing whitespace;
/// - set `xml:space="preserve"` on every surviving text node (without it
///   the renderer swallows the deliberate leading spaces);
/// - remove runs whose text ended up empty.
pub fn normalize_document(xml: &str) -> String {
    let mut content = HYPERLINK_OPEN_RE.replace_all(xml, "").into_owned();
    content = content.replace("</w:hyperlink>", "");

    let blocks = find_paragraph_blocks(&content);
    for (p_start, p_end) in blocks.into_iter().rev() {
        let block = content[p_start..p_end].to_string();
        let normalized = normalize_paragraph_block(&block);
        content.replace_range(p_start..p_end, &normalized);
    }

    content
}

fn normalize_paragraph_block(block: &str) -> String {
    // (run_start, run_end, replacement) — replacement None removes the run
    let mut edits: Vec<(usize, usize, Option<String>)> = Vec::new();
    let mut first_text_emitted = false;

    for run_match in RUN_RE.find_iter(block) {
        let run = run_match.as_str();
        let Some(caps) = WT_RE.captures(run) else {
            continue;
        };
        let text = caps.get(2).expect("no group 2").as_str();

        let collapsed = collapse_inline_whitespace(text);
        let trimmed = collapsed.trim();
        if trimmed.is_empty() {
            edits.push((run_match.start(), run_match.end(), None));
            continue;
        }

        let new_text = if first_text_emitted {
            format!(" {trimmed}")
        } else {
            first_text_emitted = true;
            trimmed.to_string()
        };

        let rebuilt = rebuild_run(run, &caps, &new_text);
        edits.push((run_match.start(), run_match.end(), Some(rebuilt)));
    }

    let mut result = block.to_string();
    for (start, end, replacement) in edits.into_iter().rev() {
        match replacement {
            Some(new_run) => result.replace_range(start..end, &new_run),
            None => result.replace_range(start..end, ""),
        }
    }
    result
}

/// Rewrite a run's `<w:t>` element with new text and a pinned
/// `xml:space="preserve"` attribute.
fn rebuild_run(run: &str, caps: &regex::Captures, new_text: &str) -> String {
    let wt_match = caps.get(0).expect("no full match");
    let attrs = caps.get(1).map_or("", |m| m.as_str());

    let attrs = if XML_SPACE_RE.is_match(attrs) {
        XML_SPACE_RE
            .replace(attrs, r#"xml:space="preserve""#)
            .into_owned()
    } else {
        format!(r#"{attrs} xml:space="preserve""#)
    };

    format!(
        "{}<w:t{}>{}</w:t>{}",
        &run[..wt_match.start()],
        attrs,
        new_text,
        &run[wt_match.end()..]
    )
}
