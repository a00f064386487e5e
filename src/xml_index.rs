//! OOXML paragraph and text-run indexing.
//!
//! Scans a DOCX-internal XML part with regexes rather than a DOM parser.
//! That is a deliberate resilience choice: court documents in the wild
//! carry malformed or oddly-nested run formatting that a strict parser
//! rejects, while a byte-offset scan tolerates anything around the
//! `<w:t>` runs it actually needs. The offsets recorded here are the
//! ground truth the patcher later splices against, so the indexer and the
//! patcher must read the file identically (raw bytes, no reflowing).

use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

use crate::text_norm::normalize_text;

lazy_static! {
    // `[ >]` keeps the match tag-name-boundary-aware: `<w:pPr>` must not
    // open a paragraph block.
    static ref PARAGRAPH_OPEN_RE: Regex = Regex::new(r"<w:p[ >]").expect("invalid regex");
    static ref PARAGRAPH_CLOSE_RE: Regex = Regex::new(r"</w:p>").expect("invalid regex");
    static ref FRAGMENT_RE: Regex =
        Regex::new(r"<w:t(?: [^>]*)?>([^<]*)</w:t>").expect("invalid regex");
}

/// One run of literal text inside a paragraph's XML.
///
/// `start`/`end` are byte offsets of the text content relative to the
/// paragraph block; the absolute file offset of a fragment is
/// `paragraph.metadata.start + fragment.start`.
#[derive(Debug, Clone)]
pub struct XmlTextFragment {
    pub text: String,
    pub normalized_text: String,
    pub start: usize,
    pub end: usize,
    pub fragment_index: usize,
    pub paragraph_index: usize,
}

/// Location of a paragraph block within its source XML part.
#[derive(Debug, Clone)]
pub struct ParagraphMetadata {
    /// Byte offset of the paragraph block within the XML file.
    pub start: usize,
    pub end: usize,
    /// Ordered text runs of the paragraph.
    pub fragments: Vec<XmlTextFragment>,
    /// Path of the XML part relative to the extraction root
    /// (e.g. `word/document.xml`, `word/header1.xml`).
    pub xml_file: String,
}

/// A paragraph: the concatenation of its fragments' normalized text plus
/// its location metadata. Immutable once indexed.
#[derive(Debug, Clone)]
pub struct XmlParagraph {
    pub plain_text: String,
    pub metadata: ParagraphMetadata,
}

/// Byte ranges of every `<w:p ...>...</w:p>` block in the XML, in order.
pub fn find_paragraph_blocks(xml: &str) -> Vec<(usize, usize)> {
    let starts: Vec<usize> = PARAGRAPH_OPEN_RE.find_iter(xml).map(|m| m.start()).collect();
    let ends: Vec<usize> = PARAGRAPH_CLOSE_RE.find_iter(xml).map(|m| m.end()).collect();

    let mut blocks = Vec::new();
    let mut last_end = 0usize;
    for &ps in &starts {
        if ps < last_end {
            continue;
        }
        if let Some(&pe) = ends.iter().find(|&&pe| pe > ps) {
            blocks.push((ps, pe));
            last_end = pe;
        }
    }
    blocks
}

/// Index every paragraph of one XML part of an extracted DOCX.
///
/// `xml_file` is the part's path relative to `base_dir` and is carried
/// through to the patcher, which reopens the same file. An XML part with
/// no paragraphs (an empty header, `[Content_Types].xml`, ...) yields an
/// empty list, not an error.
pub fn index_paragraphs(base_dir: &Path, xml_file: &str) -> Result<Vec<XmlParagraph>> {
    let path = base_dir.join(xml_file);
    let xml = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read XML part: {}", path.display()))?;

    let mut paragraphs = Vec::new();

    for (paragraph_index, &(p_start, p_end)) in find_paragraph_blocks(&xml).iter().enumerate() {
        let block = &xml[p_start..p_end];
        let mut fragments = Vec::new();

        for (fragment_index, caps) in FRAGMENT_RE.captures_iter(block).enumerate() {
            let text_match = caps.get(1).expect("no group 1");
            let text = text_match.as_str();
            fragments.push(XmlTextFragment {
                text: text.to_string(),
                normalized_text: normalize_text(text),
                start: text_match.start(),
                end: text_match.end(),
                fragment_index,
                paragraph_index,
            });
        }

        // Whitespace-only fragments still concatenate: fragment order is
        // what keeps split runs forming one logical text stream.
        let plain_text: String = fragments
            .iter()
            .map(|f| f.normalized_text.as_str())
            .collect();

        paragraphs.push(XmlParagraph {
            plain_text,
            metadata: ParagraphMetadata {
                start: p_start,
                end: p_end,
                fragments,
                xml_file: xml_file.to_string(),
            },
        });
    }

    Ok(paragraphs)
}
