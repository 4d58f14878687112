use std::collections::HashMap;
use std::ops::Range;

use crate::budget::Budget;
use crate::diff_hunk::{HighlightKind, HighlightRange};
use crate::myers::{self, DiffOp, DiffTag, EditScript, EditScriptError, Limits, ScriptBuilder};

/// A removed line positionally paired with an added line (0-based indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    pub old_index: usize,
    pub new_index: usize,
}

/// Collect every pair produced by a `Delete` immediately followed by an
/// `Insert`. The i-th deleted line pairs with the i-th inserted line; the
/// leftovers of the longer side stay unpaired.
pub fn candidate_pairs(script: &EditScript) -> Vec<CandidatePair> {
    let mut pairs = Vec::new();
    for window in script.ops().windows(2) {
        if let [DiffOp::Delete {
            old_index, old_len, ..
        }, DiffOp::Insert {
            new_index, new_len, ..
        }] = *window
        {
            pairs.extend((0..old_len.min(new_len)).map(|i| CandidatePair {
                old_index: old_index + i,
                new_index: new_index + i,
            }));
        }
    }
    pairs
}

/// Shared prefix plus shared suffix over the length of the longer line.
///
/// The suffix is measured on what remains after the prefix, so the score is
/// at most 1.0. Two empty lines score 1.0.
pub fn similarity(old: &[char], new: &[char]) -> f64 {
    let longest = old.len().max(new.len());
    if longest == 0 {
        return 1.0;
    }
    let prefix = common_prefix(old, new);
    let suffix = common_suffix(&old[prefix..], &new[prefix..]);
    (prefix + suffix) as f64 / longest as f64
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Highlight ranges of an accepted pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineHighlight {
    /// `removed` ranges on the old line
    pub removed: Vec<HighlightRange>,
    /// `added` ranges on the new line
    pub added: Vec<HighlightRange>,
}

impl LineHighlight {
    /// Translate a character script into per-side ranges
    pub fn from_script(script: &EditScript) -> Self {
        let mut highlight = Self::default();
        for op in script.ops() {
            match op.tag() {
                DiffTag::Equal => {}
                DiffTag::Delete => {
                    push_range(&mut highlight.removed, op.old_range(), HighlightKind::Removed)
                }
                DiffTag::Insert => {
                    push_range(&mut highlight.added, op.new_range(), HighlightKind::Added)
                }
            }
        }
        highlight
    }
}

fn push_range(ranges: &mut Vec<HighlightRange>, span: Range<usize>, kind: HighlightKind) {
    if span.is_empty() {
        return;
    }
    match ranges.last_mut() {
        Some(last) if last.end == span.start => last.end = span.end,
        _ => ranges.push(HighlightRange::new(span.start, span.end, kind)),
    }
}

/// Character-level diff of one line pair.
///
/// With `cleanup`, equal islands no longer than the changes on both of their
/// sides are folded into the change, which keeps highlights on whole words
/// instead of scattered shared letters.
pub fn char_edit_script(
    old: &[char],
    new: &[char],
    cleanup: bool,
    budget: &Budget,
) -> Result<EditScript, EditScriptError> {
    let script = myers::diff(old, new, |a, b| a == b, &Limits::with_budget(budget.clone()))?;
    if cleanup {
        Ok(fold_short_equalities(&script))
    } else {
        Ok(script)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk {
    Equal(usize),
    Change { deleted: usize, inserted: usize },
}

fn fold_short_equalities(script: &EditScript) -> EditScript {
    let mut chunks: Vec<Chunk> = Vec::with_capacity(script.ops().len());
    for op in script.ops() {
        match *op {
            DiffOp::Equal { len, .. } => chunks.push(Chunk::Equal(len)),
            DiffOp::Delete { old_len, .. } => chunks.push(Chunk::Change {
                deleted: old_len,
                inserted: 0,
            }),
            DiffOp::Insert { new_len, .. } => {
                if let Some(Chunk::Change { inserted, .. }) = chunks.last_mut() {
                    *inserted += new_len;
                } else {
                    chunks.push(Chunk::Change {
                        deleted: 0,
                        inserted: new_len,
                    });
                }
            }
        }
    }

    loop {
        let mut folded = false;
        let mut i = 1;
        while i + 1 < chunks.len() {
            if let (
                Chunk::Change {
                    deleted: d1,
                    inserted: i1,
                },
                Chunk::Equal(len),
                Chunk::Change {
                    deleted: d2,
                    inserted: i2,
                },
            ) = (chunks[i - 1], chunks[i], chunks[i + 1])
            {
                if len <= d1.max(i1) && len <= d2.max(i2) {
                    chunks[i - 1] = Chunk::Change {
                        deleted: d1 + len + d2,
                        inserted: i1 + len + i2,
                    };
                    chunks.remove(i);
                    chunks.remove(i);
                    folded = true;
                    continue;
                }
            }
            i += 1;
        }
        if !folded {
            break;
        }
    }

    let mut builder = ScriptBuilder::default();
    let (mut old_pos, mut new_pos) = (0, 0);
    for chunk in chunks {
        match chunk {
            Chunk::Equal(len) => {
                builder.equal(old_pos, new_pos, len);
                old_pos += len;
                new_pos += len;
            }
            Chunk::Change { deleted, inserted } => {
                builder.delete(old_pos, deleted, new_pos);
                builder.insert(old_pos + deleted, new_pos, inserted);
                old_pos += deleted;
                new_pos += inserted;
            }
        }
    }
    builder.finish()
}

/// Decides which candidate pairs become modified lines and highlights them.
///
/// A pair is scored by the share of the longer line covered by the common
/// prefix plus suffix. Pairs at or above the threshold are diffed character
/// by character.
#[derive(Debug, Clone, Copy)]
pub struct CharHighlighter {
    max_line_length: usize,
    similarity_threshold: f64,
    cleanup: bool,
}

impl CharHighlighter {
    pub fn new(max_line_length: usize, similarity_threshold: f64, cleanup: bool) -> Self {
        Self {
            max_line_length,
            similarity_threshold,
            cleanup,
        }
    }

    /// Highlight a pair, or `None` when it is rejected and should render as
    /// an independent removed/added line
    pub fn highlight(
        &self,
        old_line: &str,
        new_line: &str,
        budget: &Budget,
    ) -> Result<Option<LineHighlight>, EditScriptError> {
        let old: Vec<char> = old_line.chars().collect();
        let new: Vec<char> = new_line.chars().collect();

        if old.len() > self.max_line_length || new.len() > self.max_line_length {
            log::debug!(
                "skipping character diff of {}/{} character lines (limit {})",
                old.len(),
                new.len(),
                self.max_line_length
            );
            return Ok(None);
        }

        let score = similarity(&old, &new);
        if score < self.similarity_threshold {
            log::trace!("pair rejected, similarity {score:.3} < {:.3}", self.similarity_threshold);
            return Ok(None);
        }

        let script = char_edit_script(&old, &new, self.cleanup, budget)?;
        Ok(Some(LineHighlight::from_script(&script)))
    }
}

/// Accepted pairs keyed by line index on either side
#[derive(Debug, Clone, Default)]
pub struct ModifiedLines {
    old: HashMap<usize, Vec<HighlightRange>>,
    new: HashMap<usize, Vec<HighlightRange>>,
}

impl ModifiedLines {
    pub fn insert(&mut self, pair: CandidatePair, highlight: LineHighlight) {
        self.old.insert(pair.old_index, highlight.removed);
        self.new.insert(pair.new_index, highlight.added);
    }

    /// Ranges of the old line at `index`, if it is half of a modified pair
    pub fn old(&self, index: usize) -> Option<&[HighlightRange]> {
        self.old.get(&index).map(Vec::as_slice)
    }

    /// Ranges of the new line at `index`, if it is half of a modified pair
    pub fn new_side(&self, index: usize) -> Option<&[HighlightRange]> {
        self.new.get(&index).map(Vec::as_slice)
    }

    /// Number of accepted pairs
    pub fn len(&self) -> usize {
        self.old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
    }
}
