use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context};
use derive_more::Display;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::assembler::HunkAssembler;
use crate::budget::{Budget, CancellationToken};
use crate::config::DiffOptions;
use crate::diff_hunk::Hunk;
use crate::diff_result::{DiffMetadata, DiffResult, DiffStats};
use crate::error::{DiffError, TextSide};
use crate::highlight::{
    candidate_pairs, CandidatePair, CharHighlighter, LineHighlight, ModifiedLines,
};
use crate::line_diff::LineDiff;
use crate::myers::{EditScriptError, Limits};

/// Candidate pairs at or above this count are highlighted on the rayon pool
pub const PARALLEL_PAIR_THRESHOLD: usize = 32;

/// Pipeline stage, recorded on [`DiffError::DiffCalculation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stage {
    #[display(fmt = "idle")]
    Idle,
    #[display(fmt = "validating input")]
    Validating,
    #[display(fmt = "diffing lines")]
    LineDiffing,
    #[display(fmt = "pairing lines")]
    Pairing,
    #[display(fmt = "highlighting")]
    Highlighting,
    #[display(fmt = "assembling")]
    Assembling,
    #[display(fmt = "done")]
    Done,
}

/// Per-call inputs that are not options: the host's generation id and a
/// cancellation token
#[derive(Debug, Clone, Default)]
pub struct DiffControl {
    pub generation: Option<u64>,
    pub cancel: Option<CancellationToken>,
}

impl DiffControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Compare two texts.
///
/// # Examples
///
/// ```
/// use diff_engine::{compute_diff, DiffLineKind, DiffOptions};
///
/// let result = compute_diff("a\nb\nc", "a\nx\nc", &DiffOptions::default()).unwrap();
/// assert_eq!(result.hunks.len(), 1);
/// assert_eq!(result.stats.changes, 2);
/// assert!(result.lines().any(|line| line.kind == DiffLineKind::Modified));
/// ```
pub fn compute_diff(old: &str, new: &str, options: &DiffOptions) -> Result<DiffResult, DiffError> {
    compute_diff_with(old, new, options, &DiffControl::default())
}

/// Compare two texts under a caller-supplied generation and cancellation token
pub fn compute_diff_with(
    old: &str,
    new: &str,
    options: &DiffOptions,
    control: &DiffControl,
) -> Result<DiffResult, DiffError> {
    let started = Instant::now();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();

    let mut budget = Budget::unlimited();
    if let Some(deadline) = started.checked_add(options.timeout()) {
        budget = budget.with_deadline(deadline);
    }
    if let Some(token) = &control.cancel {
        budget = budget.with_cancellation(token.clone());
    }

    let run = Run {
        options,
        budget,
        started,
        stage: Cell::new(Stage::Idle),
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run.execute(old, new)));
    let (hunks, total_characters, changes_count) = match outcome {
        Ok(result) => result?,
        Err(payload) => {
            let stage = run.stage.get();
            log::warn!("diff panicked while {stage}");
            return Err(DiffError::DiffCalculation {
                stage,
                cause: anyhow!("panicked: {}", panic_message(payload.as_ref())),
            });
        }
    };

    let stats = DiffStats::from_hunks(&hunks);
    let calculation_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    log::debug!(
        "diff finished: {} hunks, +{} -{} in {:.2}ms",
        hunks.len(),
        stats.additions,
        stats.deletions,
        calculation_time_ms
    );

    Ok(DiffResult {
        hunks,
        stats,
        metadata: DiffMetadata {
            calculation_time_ms,
            total_characters,
            changes_count,
            timestamp,
            generation: control.generation,
        },
    })
}

/// State of one pipeline execution
struct Run<'o> {
    options: &'o DiffOptions,
    budget: Budget,
    started: Instant,
    stage: Cell<Stage>,
}

impl Run<'_> {
    /// Returns the hunks, the character total and the number of change runs
    fn execute(&self, old: &str, new: &str) -> Result<(Vec<Hunk>, usize, usize), DiffError> {
        // Validation runs before the budget is consulted, so oversized or
        // invalid input is always reported as such.
        self.stage.set(Stage::Validating);
        log::debug!("entering stage: {}", Stage::Validating);
        let total_characters = check_size(old, new, self.options.max_content_length)?;
        check_content(old, TextSide::Old)?;
        check_content(new, TextSide::New)?;

        self.enter(Stage::LineDiffing)?;
        let limits = Limits {
            max_edit_distance: self.options.max_edit_distance,
            budget: self.budget.clone(),
        };
        let lines = LineDiff::compute(old, new, self.options.line_matching(), &limits)
            .map_err(|err| self.script_error(err))?;
        let changes_count = lines.script().change_runs().len();

        self.enter(Stage::Pairing)?;
        let pairs = candidate_pairs(lines.script());
        log::debug!("{} change runs, {} candidate pairs", changes_count, pairs.len());

        self.enter(Stage::Highlighting)?;
        let modified = self
            .highlight(&lines, &pairs)
            .map_err(|err| self.script_error(err))?;

        self.enter(Stage::Assembling)?;
        let hunks = HunkAssembler::new(self.options.context_lines)
            .assemble(&lines, &modified)
            .context("assembling hunks")
            .map_err(|cause| self.calculation_error(cause))?;

        self.enter(Stage::Done)?;
        Ok((hunks, total_characters, changes_count))
    }

    /// Move to `stage`, failing if the budget has run out
    fn enter(&self, stage: Stage) -> Result<(), DiffError> {
        self.budget.check().map_err(|err| self.script_error(err))?;
        self.stage.set(stage);
        log::debug!("entering stage: {stage}");
        Ok(())
    }

    fn highlight(
        &self,
        lines: &LineDiff<'_>,
        pairs: &[CandidatePair],
    ) -> Result<ModifiedLines, EditScriptError> {
        let highlighter = CharHighlighter::new(
            self.options.max_line_length,
            self.options.effective_similarity_threshold(),
            self.options.semantic_cleanup,
        );
        let budget = &self.budget;
        let highlight_pair = |pair: &CandidatePair| {
            let old_line = lines.old_lines()[pair.old_index];
            let new_line = lines.new_lines()[pair.new_index];
            highlighter
                .highlight(old_line, new_line, budget)
                .map(|accepted| accepted.map(|highlight| (*pair, highlight)))
        };

        type Accepted = Option<(CandidatePair, LineHighlight)>;
        let accepted: Vec<Accepted> = if pairs.len() >= PARALLEL_PAIR_THRESHOLD {
            pairs.par_iter().map(&highlight_pair).collect::<Result<_, _>>()?
        } else {
            pairs.iter().map(&highlight_pair).collect::<Result<_, _>>()?
        };

        let mut modified = ModifiedLines::default();
        for (pair, highlight) in accepted.into_iter().flatten() {
            modified.insert(pair, highlight);
        }
        log::debug!("{} of {} candidate pairs highlighted", modified.len(), pairs.len());
        Ok(modified)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn script_error(&self, err: EditScriptError) -> DiffError {
        match err {
            EditScriptError::DeadlineExceeded | EditScriptError::Cancelled => {
                let cancelled = err == EditScriptError::Cancelled;
                log::debug!("stopped while {}: {err}", self.stage.get());
                DiffError::DiffTimeout {
                    elapsed_ms: self.elapsed_ms(),
                    timeout_ms: self.options.timeout_ms,
                    cancelled,
                }
            }
            EditScriptError::EditDistanceExceeded { .. } => {
                self.calculation_error(anyhow::Error::new(err))
            }
        }
    }

    fn calculation_error(&self, cause: anyhow::Error) -> DiffError {
        let stage = self.stage.get();
        log::warn!("diff failed while {stage}: {cause:#}");
        DiffError::DiffCalculation { stage, cause }
    }
}

/// Returns the combined character count, or `ContentTooLarge`
fn check_size(old: &str, new: &str, limit: usize) -> Result<usize, DiffError> {
    let bytes = old.len().saturating_add(new.len());
    // A UTF-8 character takes at most 4 bytes
    if bytes / 4 > limit {
        log::warn!("rejecting {bytes} bytes of input without counting characters");
        return Err(DiffError::ContentTooLarge { total: bytes, limit });
    }

    let total = old.chars().count() + new.chars().count();
    if total > limit {
        log::warn!("rejecting {total} characters of input (limit {limit})");
        return Err(DiffError::ContentTooLarge { total, limit });
    }
    Ok(total)
}

/// Reject C0 control characters other than tab, line feed and carriage return
fn check_content(text: &str, side: TextSide) -> Result<(), DiffError> {
    // Every byte of a multi-byte UTF-8 sequence is >= 0x80, so a byte scan
    // sees exactly the ASCII control characters.
    let mut line = 1;
    for byte in text.bytes() {
        match byte {
            b'\n' => line += 1,
            b'\t' | b'\r' => {}
            0x00..=0x1f => {
                return Err(DiffError::InvalidContent {
                    side,
                    line,
                    code: u32::from(byte),
                })
            }
            _ => {}
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_size_fast_path() {
        let err = check_size(&"x".repeat(100), "", 10).unwrap_err();
        assert!(matches!(err, DiffError::ContentTooLarge { total: 100, limit: 10 }));
        // The byte count is not presented as a character count
        assert_eq!(err.to_string(), "content too large: input exceeds the limit of 10 characters");
    }

    #[test]
    fn test_size_counts_characters_not_bytes() {
        // 4 characters in 12 bytes
        assert_eq!(check_size("日本", "語!", 4).unwrap(), 4);
        assert!(check_size("日本", "語!", 3).is_err());
    }

    #[test]
    fn test_control_characters() {
        assert!(check_content("tab\there\r\nok", TextSide::Old).is_ok());
        let err = check_content("fine\nstill fine\nbell\u{7}", TextSide::New).unwrap_err();
        assert!(matches!(
            err,
            DiffError::InvalidContent {
                side: TextSide::New,
                line: 3,
                code: 7
            }
        ));
    }

    #[test]
    fn test_generation_is_echoed() {
        let control = DiffControl::new().generation(42);
        let result = compute_diff_with("a", "b", &DiffOptions::default(), &control).unwrap();
        assert_eq!(result.metadata.generation, Some(42));
        assert_eq!(result.metadata.total_characters, 2);
        assert_eq!(result.metadata.changes_count, 1);
    }

    #[test]
    fn test_edit_distance_limit_is_a_calculation_error() {
        let options = DiffOptions::default().max_edit_distance(Some(1));
        let err = compute_diff("a\nb\nc", "x\ny\nz", &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiffCalculation);
        assert!(matches!(
            err,
            DiffError::DiffCalculation {
                stage: Stage::LineDiffing,
                ..
            }
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let control = DiffControl::new().cancellation(token);
        let err = compute_diff_with("a", "b", &DiffOptions::default(), &control).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_parallel_and_sequential_highlighting_agree() {
        let old: String = (0..PARALLEL_PAIR_THRESHOLD * 2)
            .map(|i| format!("let value_{i} = {i};\n"))
            .collect();
        let new = old.replace(" = ", " := ");
        let result = compute_diff(&old, &new, &DiffOptions::default()).unwrap();

        let modified: Vec<_> = result.modified_lines().collect();
        assert_eq!(modified.len(), PARALLEL_PAIR_THRESHOLD * 4);
        for line in modified {
            // Only a ':' was inserted
            let expected = if line.in_new() { 1 } else { 0 };
            assert_eq!(line.highlights().len(), expected, "{line:?}");
        }
    }
}
