// Diff engine: line hunks with character-level highlights
// The edit-script primitive is public for callers that diff their own sequences

mod assembler;
pub mod budget;
mod config;
mod diff_hunk;
mod diff_result;
mod engine;
mod error;
mod highlight;
mod line_diff;
pub mod myers;
mod unified;
mod worker;

pub use assembler::HunkAssembler;
pub use budget::{Budget, CancellationToken};
pub use config::{
    DiffOptions, DEFAULT_CONTEXT_LINES, DEFAULT_MAX_CONTENT_LENGTH, DEFAULT_MAX_LINE_LENGTH,
    DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TIMEOUT_MS,
};
pub use diff_hunk::{DiffLine, DiffLineKind, HighlightKind, HighlightRange, Hunk};
pub use diff_result::{DiffMetadata, DiffResult, DiffStats};
pub use engine::{compute_diff, compute_diff_with, DiffControl, Stage, PARALLEL_PAIR_THRESHOLD};
pub use error::{DiffError, ErrorKind, ErrorReport, TextSide};
pub use highlight::{
    candidate_pairs, char_edit_script, similarity, CandidatePair, CharHighlighter, LineHighlight,
    ModifiedLines,
};
pub use line_diff::{split_lines, LineDiff, LineMatching};
pub use unified::unified_diff;
pub use worker::{DiffOutcome, DiffWorker, DEFAULT_DEBOUNCE};
