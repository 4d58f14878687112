use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::line_diff::LineMatching;

/// Combined character count of both texts above which diffing is refused
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 10_000_000;

/// Lines longer than this (in characters) never get character highlights
pub const DEFAULT_MAX_LINE_LENGTH: usize = 10_000;

/// Unchanged lines shown around each change
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Wall-clock budget of a single diff
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Minimum similarity for an adjacent removed/added pair to count as a
/// modified line. Zero accepts every adjacent pair.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.0;

/// Options recognised by [`compute_diff`](crate::compute_diff)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct DiffOptions {
    /// Upper bound on `old.chars().count() + new.chars().count()`
    pub max_content_length: usize,

    /// Character-level highlighting is skipped for longer lines
    pub max_line_length: usize,

    /// Number of unchanged lines kept around every change
    pub context_lines: usize,

    /// Time budget in milliseconds
    pub timeout_ms: u64,

    /// Pairing acceptance threshold in `[0, 1]`
    pub similarity_threshold: f64,

    /// Compare lines without their trailing whitespace
    pub ignore_trailing_whitespace: bool,

    /// Treat CRLF lines as LF lines and ignore a missing final newline
    pub normalize_line_endings: bool,

    /// Merge short unchanged islands inside a modified line into the
    /// surrounding highlight
    pub semantic_cleanup: bool,

    /// Fail instead of computing line scripts with a larger edit distance
    pub max_edit_distance: Option<usize>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            context_lines: DEFAULT_CONTEXT_LINES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            ignore_trailing_whitespace: false,
            normalize_line_endings: false,
            semantic_cleanup: true,
            max_edit_distance: None,
        }
    }
}

impl DiffOptions {
    pub fn max_content_length(mut self, max: usize) -> Self {
        self.max_content_length = max;
        self
    }

    pub fn max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    pub fn context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn ignore_trailing_whitespace(mut self, ignore: bool) -> Self {
        self.ignore_trailing_whitespace = ignore;
        self
    }

    pub fn normalize_line_endings(mut self, normalize: bool) -> Self {
        self.normalize_line_endings = normalize;
        self
    }

    pub fn semantic_cleanup(mut self, enabled: bool) -> Self {
        self.semantic_cleanup = enabled;
        self
    }

    pub fn max_edit_distance(mut self, max: Option<usize>) -> Self {
        self.max_edit_distance = max;
        self
    }

    pub fn line_matching(&self) -> LineMatching {
        LineMatching {
            ignore_trailing_whitespace: self.ignore_trailing_whitespace,
            normalize_line_endings: self.normalize_line_endings,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The similarity threshold clamped into `[0, 1]`
    pub fn effective_similarity_threshold(&self) -> f64 {
        let threshold = self.similarity_threshold;
        if threshold.is_nan() {
            log::warn!("similarity threshold is NaN, using {DEFAULT_SIMILARITY_THRESHOLD}");
            return DEFAULT_SIMILARITY_THRESHOLD;
        }
        let clamped = threshold.clamp(0.0, 1.0);
        if clamped != threshold {
            log::warn!("similarity threshold {threshold} clamped to {clamped}");
        }
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DiffOptions::default();
        assert_eq!(options.max_content_length, 10_000_000);
        assert_eq!(options.max_line_length, 10_000);
        assert_eq!(options.context_lines, 3);
        assert_eq!(options.timeout(), Duration::from_secs(5));
        assert_eq!(options.similarity_threshold, 0.0);
        assert!(options.semantic_cleanup);
        assert_eq!(options.line_matching(), LineMatching::default());
    }

    #[test]
    fn test_threshold_clamping() {
        let effective = |threshold| {
            DiffOptions::default()
                .similarity_threshold(threshold)
                .effective_similarity_threshold()
        };
        assert_eq!(effective(1.5), 1.0);
        assert_eq!(effective(-0.5), 0.0);
        assert_eq!(effective(f64::NAN), DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_uses_defaults() {
        let options: DiffOptions =
            serde_json::from_str(r#"{"contextLines": 1, "timeoutMs": 250}"#).unwrap();
        assert_eq!(options.context_lines, 1);
        assert_eq!(options.timeout_ms, 250);
        assert_eq!(options.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }
}
