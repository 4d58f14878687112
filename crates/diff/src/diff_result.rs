#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::diff_hunk::{DiffLine, Hunk};

/// Line counts over all hunks of a result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiffStats {
    /// Added lines plus the new halves of modified pairs
    pub additions: usize,
    /// Removed lines plus the old halves of modified pairs
    pub deletions: usize,
    /// `additions + deletions`
    pub changes: usize,
}

impl DiffStats {
    pub fn from_hunks(hunks: &[Hunk]) -> Self {
        let additions = hunks.iter().map(Hunk::added_lines).sum();
        let deletions = hunks.iter().map(Hunk::deleted_lines).sum();
        Self {
            additions,
            deletions,
            changes: additions + deletions,
        }
    }
}

/// Bookkeeping about a single computation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DiffMetadata {
    /// Wall-clock duration of the call
    pub calculation_time_ms: f64,
    /// Characters in both inputs together
    pub total_characters: usize,
    /// Number of maximal change runs in the line script
    pub changes_count: usize,
    /// Unix epoch milliseconds at the start of the call
    pub timestamp: u64,
    /// Caller-supplied generation id, echoed back
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub generation: Option<u64>,
}

/// Output of [`compute_diff`](crate::compute_diff)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiffResult {
    pub hunks: Vec<Hunk>,
    pub stats: DiffStats,
    pub metadata: DiffMetadata,
}

impl DiffResult {
    /// Check whether the texts differ at all
    pub fn has_changes(&self) -> bool {
        !self.hunks.is_empty()
    }

    /// Iterate every line of every hunk
    pub fn lines(&self) -> impl Iterator<Item = &DiffLine> + '_ {
        self.hunks.iter().flat_map(|hunk| hunk.lines.iter())
    }

    /// Lines that are one half of a modified pair
    pub fn modified_lines(&self) -> impl Iterator<Item = &DiffLine> + '_ {
        self.lines().filter(|line| line.highlight_ranges.is_some())
    }
}
