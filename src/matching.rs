//! Paragraph/prediction matching.
//!
//! Primary key: a hash of the NFKC-normalized, trimmed paragraph text.
//! The NER service normalizes its input stream independently of the
//! indexer, so a small tail of paragraphs will not hash-match; those
//! resolve by minimum character error rate against the predictions no
//! hash bucket claimed. Matching is total: every source paragraph leaves
//! with exactly one prediction.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use unicode_normalization::UnicodeNormalization;

use crate::anonymize::AnonymizeError;
use crate::entities::ParagraphPrediction;
use crate::xml_index::XmlParagraph;

/// A source paragraph paired with the prediction chosen for it.
///
/// Built as a fresh record at match time — candidate bookkeeping never
/// lives on the paragraph value itself.
#[derive(Debug, Clone)]
pub struct MatchedParagraph {
    pub paragraph: XmlParagraph,
    pub prediction: ParagraphPrediction,
}

/// Hash of the NFKC-normalized, trimmed text. Both sides of the match go
/// through this same function.
pub fn content_hash(text: &str) -> u64 {
    let normalized: String = text.trim().nfkc().collect();
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    hasher.finish()
}

/// Character error rate of `hypothesis` against `reference`:
/// char-level Levenshtein distance divided by the reference length.
pub fn cer(reference: &str, hypothesis: &str) -> f64 {
    let ref_chars: Vec<char> = reference.chars().collect();
    let hyp_chars: Vec<char> = hypothesis.chars().collect();

    if ref_chars.is_empty() {
        return hyp_chars.len() as f64;
    }

    // Two-row Levenshtein
    let mut prev: Vec<usize> = (0..=hyp_chars.len()).collect();
    let mut curr = vec![0usize; hyp_chars.len() + 1];

    for (i, rc) in ref_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, hc) in hyp_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(rc != hc);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[hyp_chars.len()] as f64 / ref_chars.len() as f64
}

/// Assign every source paragraph its prediction.
///
/// Hash buckets may hold several prediction indices (duplicate paragraph
/// texts are legal); all duplicates of a hash take the first prediction in
/// that bucket — the contract guarantees a correct-content match, not an
/// order-stable one. Predictions never referenced by any bucket, and
/// paragraphs whose bucket is empty, pair up by minimum CER. If the
/// unreferenced pool is empty but an unmatched paragraph remains, the CER
/// search widens to every prediction so the totality guarantee holds.
pub fn match_paragraphs_with_predictions(
    source_paragraphs: &[XmlParagraph],
    predictions: &[ParagraphPrediction],
) -> Result<Vec<MatchedParagraph>, AnonymizeError> {
    if source_paragraphs.is_empty() {
        return Ok(Vec::new());
    }
    if predictions.is_empty() {
        return Err(AnonymizeError::NoPredictions);
    }

    // hash -> prediction indices sharing that text
    let mut hash_buckets: HashMap<u64, Vec<usize>> = HashMap::new();
    for (idx, prediction) in predictions.iter().enumerate() {
        hash_buckets
            .entry(content_hash(&prediction.document))
            .or_default()
            .push(idx);
    }

    // Candidate prediction indices per source paragraph, kept in a local
    // table parallel to the input slice.
    let candidates: Vec<Vec<usize>> = source_paragraphs
        .iter()
        .map(|p| {
            hash_buckets
                .get(&content_hash(&p.plain_text))
                .cloned()
                .unwrap_or_default()
        })
        .collect();

    // Predictions no hash bucket of any source paragraph points at
    let referenced: std::collections::HashSet<usize> =
        candidates.iter().flatten().copied().collect();
    let mut unreferenced: Vec<usize> = (0..predictions.len())
        .filter(|i| !referenced.contains(i))
        .collect();
    unreferenced.sort_unstable();

    let mut matched = Vec::with_capacity(source_paragraphs.len());
    for (paragraph, paragraph_candidates) in source_paragraphs.iter().zip(&candidates) {
        let chosen = if let Some(&first) = paragraph_candidates.first() {
            first
        } else {
            let widened: Vec<usize>;
            let pool: &[usize] = if unreferenced.is_empty() {
                log::warn!(
                    "no unreferenced predictions left; CER fallback widened to all predictions"
                );
                widened = (0..predictions.len()).collect();
                &widened
            } else {
                &unreferenced
            };

            let mut best = pool[0];
            let mut best_cer = cer(&paragraph.plain_text, &predictions[best].document);
            for &idx in &pool[1..] {
                let candidate_cer = cer(&paragraph.plain_text, &predictions[idx].document);
                if candidate_cer < best_cer {
                    best = idx;
                    best_cer = candidate_cer;
                }
            }
            log::warn!(
                "paragraph in {} had no exact match; assigned prediction {} by CER {:.3}",
                paragraph.metadata.xml_file,
                best,
                best_cer
            );
            best
        };

        matched.push(MatchedParagraph {
            paragraph: paragraph.clone(),
            prediction: predictions[chosen].clone(),
        });
    }

    Ok(matched)
}
