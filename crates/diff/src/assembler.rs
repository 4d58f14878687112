use std::ops::Range;

use anyhow::{ensure, Result};

use crate::diff_hunk::{DiffLine, Hunk};
use crate::highlight::ModifiedLines;
use crate::line_diff::LineDiff;
use crate::myers::ChangeRun;

/// Groups the changes of a line script into context-bounded hunks.
///
/// Unchanged lines further than `context_lines` from every change are not
/// part of any hunk.
#[derive(Debug, Clone, Copy)]
pub struct HunkAssembler {
    context_lines: usize,
}

impl HunkAssembler {
    pub fn new(context_lines: usize) -> Self {
        Self { context_lines }
    }

    /// Build the hunks of `lines`, attaching highlights of modified pairs
    pub fn assemble(&self, lines: &LineDiff<'_>, modified: &ModifiedLines) -> Result<Vec<Hunk>> {
        let runs = lines.script().change_runs();
        let old_len = lines.old_lines().len();

        let mut hunks = Vec::new();
        for group in self.group_runs(&runs) {
            // Neighbouring runs bound the context; equal lines before a run
            // are aligned on both sides, so old and new get the same amount.
            let previous_end = group.start.checked_sub(1).map_or(0, |i| runs[i].old.end);
            let next_start = runs.get(group.end).map_or(old_len, |run| run.old.start);
            let group = &runs[group];
            let first = &group[0];
            let last = &group[group.len() - 1];

            let leading = self.context_lines.min(first.old.start - previous_end);
            let trailing = self.context_lines.min(next_start - last.old.end);

            let mut hunk_lines = Vec::new();
            let (mut old_pos, mut new_pos) = (first.old.start - leading, first.new.start - leading);
            let (old_origin, new_origin) = (old_pos, new_pos);

            for run in group {
                push_context(&mut hunk_lines, lines, old_pos..run.old.start, new_pos);
                push_run(&mut hunk_lines, lines, run, modified);
                old_pos = run.old.end;
                new_pos = run.new.end;
            }
            push_context(&mut hunk_lines, lines, old_pos..old_pos + trailing, new_pos);

            let old_count = last.old.end + trailing - old_origin;
            let new_count = last.new.end + trailing - new_origin;
            let hunk = Hunk {
                old_start: header_start(old_origin, old_count),
                old_lines: old_count,
                new_start: header_start(new_origin, new_count),
                new_lines: new_count,
                lines: hunk_lines,
            };
            check_counts(&hunk)?;
            hunks.push(hunk);
        }

        log::debug!("assembled {} hunks from {} change runs", hunks.len(), runs.len());
        Ok(hunks)
    }

    /// Split runs into index ranges whose context windows overlap or touch
    fn group_runs(&self, runs: &[ChangeRun]) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        let mut start = 0;
        for i in 1..runs.len() {
            let gap = runs[i].old.start - runs[i - 1].old.end;
            if gap > 2 * self.context_lines {
                groups.push(start..i);
                start = i;
            }
        }
        if start < runs.len() {
            groups.push(start..runs.len());
        }
        groups
    }
}

/// Unified-diff start: 1-based first line, or the line before an empty side
fn header_start(origin: usize, count: usize) -> usize {
    if count == 0 {
        origin
    } else {
        origin + 1
    }
}

fn push_context(
    out: &mut Vec<DiffLine>,
    lines: &LineDiff<'_>,
    old: Range<usize>,
    new_start: usize,
) {
    for (offset, old_index) in old.enumerate() {
        let content = lines.old_lines()[old_index];
        out.push(DiffLine::context(content, old_index + 1, new_start + offset + 1));
    }
}

/// Old-side lines first, then new-side lines
fn push_run(
    out: &mut Vec<DiffLine>,
    lines: &LineDiff<'_>,
    run: &ChangeRun,
    modified: &ModifiedLines,
) {
    for old_index in run.old.clone() {
        let content = lines.old_lines()[old_index];
        out.push(match modified.old(old_index) {
            Some(ranges) => DiffLine::modified_old(content, old_index + 1, ranges.to_vec()),
            None => DiffLine::removed(content, old_index + 1),
        });
    }
    for new_index in run.new.clone() {
        let content = lines.new_lines()[new_index];
        out.push(match modified.new_side(new_index) {
            Some(ranges) => DiffLine::modified_new(content, new_index + 1, ranges.to_vec()),
            None => DiffLine::added(content, new_index + 1),
        });
    }
}

fn check_counts(hunk: &Hunk) -> Result<()> {
    let old_side = hunk.lines.iter().filter(|l| l.in_old()).count();
    let new_side = hunk.lines.iter().filter(|l| l.in_new()).count();
    ensure!(
        old_side == hunk.old_lines && new_side == hunk.new_lines,
        "hunk {} holds {} old and {} new lines",
        hunk.header(),
        old_side,
        new_side
    );
    Ok(())
}
