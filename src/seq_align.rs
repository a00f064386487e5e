//! Generic token sequence alignment.
//!
//! Aligns two whitespace-tokenized strings (the original paragraph text
//! and its placeholder-substituted counterpart) and reports, for every
//! source token, what should stand in its place: the token itself where
//! the streams agree, a replacement label where the anonymized side
//! diverges, or nothing where tokens were dropped outright.
//!
//! The matching-blocks computation is a Ratcliff-Obershelp longest-match
//! recursion over token streams. Between two agreement blocks, target-side
//! tokens absent from the source gap are taken as the replacement label
//! for that gap; when several distinct candidates appear they are joined
//! with `/`. This multi-candidate fallback is a best-effort heuristic with
//! no precision guarantee: when the two tokenizations diverge by more than
//! the matching window, a label can land on the wrong token. Callers wrap
//! both inputs in `<START>`/`<END>` sentinels so leading and trailing
//! mismatch regions still have a matching anchor, and strip the sentinel
//! rows from the output.

use std::collections::HashMap;

use crate::text_norm::tokenize;

/// A run of identical tokens: `a..a+size` in the source stream matches
/// `b..b+size` in the target stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBlock {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// One aligned source token and its replacement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedToken {
    pub source: String,
    pub target: String,
}

/// Longest matching block of `a[alo..ahi]` vs `b[blo..bhi]`.
///
/// Ties resolve to the earliest block in `a`, then in `b`, so the
/// recursion is deterministic.
fn longest_match(
    a: &[&str],
    b2j: &HashMap<&str, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> MatchBlock {
    let mut best = MatchBlock {
        a: alo,
        b: blo,
        size: 0,
    };
    // j2len[j] = length of the match ending at a[i], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(a[i]) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j == 0 {
                    1
                } else {
                    j2len.get(&(j - 1)).copied().unwrap_or(0) + 1
                };
                new_j2len.insert(j, k);
                if k > best.size {
                    best = MatchBlock {
                        a: i + 1 - k,
                        b: j + 1 - k,
                        size: k,
                    };
                }
            }
        }
        j2len = new_j2len;
    }

    best
}

/// All matching blocks between two token streams, in ascending order,
/// terminated by a zero-size sentinel block at `(a.len(), b.len())`.
pub fn matching_blocks(a: &[&str], b: &[&str]) -> Vec<MatchBlock> {
    let mut b2j: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, token) in b.iter().enumerate() {
        b2j.entry(*token).or_default().push(j);
    }

    let mut queue = vec![(0usize, a.len(), 0usize, b.len())];
    let mut blocks = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let m = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if m.size == 0 {
            continue;
        }
        blocks.push(m);
        if alo < m.a && blo < m.b {
            queue.push((alo, m.a, blo, m.b));
        }
        if m.a + m.size < ahi && m.b + m.size < bhi {
            queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
        }
    }

    blocks.sort_by_key(|m| (m.a, m.b));

    // Coalesce adjacent blocks so gap extraction sees clean boundaries
    let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len() + 1);
    for block in blocks {
        match merged.last_mut() {
            Some(prev) if prev.a + prev.size == block.a && prev.b + prev.size == block.b => {
                prev.size += block.size;
            }
            _ => merged.push(block),
        }
    }

    merged.push(MatchBlock {
        a: a.len(),
        b: b.len(),
        size: 0,
    });
    merged
}

/// Align `source_text` against `target_text` token-by-token.
///
/// Returns exactly one row per source token, in order. Matched tokens
/// carry themselves as `target`; tokens in a mismatch gap all carry the
/// gap's replacement label (`/`-joined when ambiguous), or an empty string
/// when the target gap offers no replacement. Target-only insertions
/// produce no row — there is no source position to patch.
pub fn align_text(source_text: &str, target_text: &str) -> Vec<AlignedToken> {
    let source_tokens = tokenize(source_text);
    let target_tokens = tokenize(target_text);
    let blocks = matching_blocks(&source_tokens, &target_tokens);

    let mut rows = Vec::with_capacity(source_tokens.len());
    let mut prev_a = 0usize;
    let mut prev_b = 0usize;

    for block in blocks {
        let source_gap = &source_tokens[prev_a..block.a];
        let target_gap = &target_tokens[prev_b..block.b];

        if !source_gap.is_empty() {
            let mut candidates: Vec<&str> = Vec::new();
            for token in target_gap {
                if !source_gap.contains(token) && !candidates.contains(token) {
                    candidates.push(*token);
                }
            }
            let label = candidates.join("/");
            for token in source_gap {
                rows.push(AlignedToken {
                    source: (*token).to_string(),
                    target: label.clone(),
                });
            }
        }

        for k in 0..block.size {
            let token = source_tokens[block.a + k];
            rows.push(AlignedToken {
                source: token.to_string(),
                target: token.to_string(),
            });
        }

        prev_a = block.a + block.size;
        prev_b = block.b + block.size;
    }

    rows
}
