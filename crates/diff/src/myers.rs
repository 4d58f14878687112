use std::ops::Range;

use derive_more::Display;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::budget::{Budget, Poller};

/// The kind of an edit operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DiffTag {
    #[display(fmt = "equal")]
    Equal,
    #[display(fmt = "insert")]
    Insert,
    #[display(fmt = "delete")]
    Delete,
}

/// A single operation of an edit script, indexing into both sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffOp {
    /// `old[old_index..old_index + len] == new[new_index..new_index + len]`
    Equal {
        old_index: usize,
        new_index: usize,
        len: usize,
    },
    /// `old[old_index..old_index + old_len]` is removed at `new_index`
    Delete {
        old_index: usize,
        old_len: usize,
        new_index: usize,
    },
    /// `new[new_index..new_index + new_len]` is inserted at `old_index`
    Insert {
        old_index: usize,
        new_index: usize,
        new_len: usize,
    },
}

impl DiffOp {
    pub fn tag(&self) -> DiffTag {
        match self {
            DiffOp::Equal { .. } => DiffTag::Equal,
            DiffOp::Delete { .. } => DiffTag::Delete,
            DiffOp::Insert { .. } => DiffTag::Insert,
        }
    }

    /// The span of the old sequence this operation consumes
    pub fn old_range(&self) -> Range<usize> {
        match *self {
            DiffOp::Equal { old_index, len, .. } => old_index..old_index + len,
            DiffOp::Delete {
                old_index, old_len, ..
            } => old_index..old_index + old_len,
            DiffOp::Insert { old_index, .. } => old_index..old_index,
        }
    }

    /// The span of the new sequence this operation consumes
    pub fn new_range(&self) -> Range<usize> {
        match *self {
            DiffOp::Equal { new_index, len, .. } => new_index..new_index + len,
            DiffOp::Delete { new_index, .. } => new_index..new_index,
            DiffOp::Insert {
                new_index, new_len, ..
            } => new_index..new_index + new_len,
        }
    }
}

/// A maximal run of non-equal operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRun {
    /// Deleted span of the old sequence
    pub old: Range<usize>,
    /// Inserted span of the new sequence
    pub new: Range<usize>,
}

/// An ordered list of operations covering both sequences completely.
///
/// Scripts are normalised: neighbouring operations never share a tag, and a
/// run of changes is always a `Delete` followed by an `Insert`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    ops: Vec<DiffOp>,
}

impl EditScript {
    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<DiffOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Check whether any operation is an insert or delete
    pub fn has_changes(&self) -> bool {
        self.ops.iter().any(|op| op.tag() != DiffTag::Equal)
    }

    /// Number of inserted plus deleted elements
    pub fn edit_distance(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                DiffOp::Equal { .. } => 0,
                DiffOp::Delete { old_len, .. } => *old_len,
                DiffOp::Insert { new_len, .. } => *new_len,
            })
            .sum()
    }

    /// Group the script into maximal runs of changes
    pub fn change_runs(&self) -> Vec<ChangeRun> {
        let mut runs = Vec::new();
        let mut current: Option<ChangeRun> = None;

        for op in &self.ops {
            if op.tag() == DiffTag::Equal {
                runs.extend(current.take());
                continue;
            }
            let (old, new) = (op.old_range(), op.new_range());
            match current.as_mut() {
                Some(run) => {
                    run.old.end = old.end;
                    run.new.end = new.end;
                }
                None => current = Some(ChangeRun { old, new }),
            }
        }
        runs.extend(current);
        runs
    }

    /// Rebuild the new sequence from `old` by applying the script
    pub fn apply<T: Clone>(&self, old: &[T], new: &[T]) -> Vec<T> {
        let mut result = Vec::with_capacity(new.len());
        for op in &self.ops {
            match op.tag() {
                DiffTag::Equal => result.extend_from_slice(&old[op.old_range()]),
                DiffTag::Insert => result.extend_from_slice(&new[op.new_range()]),
                DiffTag::Delete => {}
            }
        }
        result
    }

    /// Check that the script consumes `0..old_len` and `0..new_len` in order
    pub fn covers(&self, old_len: usize, new_len: usize) -> bool {
        let (mut old_pos, mut new_pos) = (0, 0);
        for op in &self.ops {
            let (old, new) = (op.old_range(), op.new_range());
            if old.start != old_pos || new.start != new_pos {
                return false;
            }
            old_pos = old.end;
            new_pos = new.end;
        }
        old_pos == old_len && new_pos == new_len
    }
}

/// Accumulates operations in order and normalises them into an [`EditScript`]
#[derive(Debug, Default)]
pub(crate) struct ScriptBuilder {
    ops: Vec<DiffOp>,
    pending: Option<PendingRun>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRun {
    old_index: usize,
    new_index: usize,
    old_len: usize,
    new_len: usize,
}

impl ScriptBuilder {
    pub(crate) fn equal(&mut self, old_index: usize, new_index: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.flush();
        if let Some(DiffOp::Equal {
            old_index: last_old,
            new_index: last_new,
            len: last_len,
        }) = self.ops.last_mut()
        {
            if *last_old + *last_len == old_index && *last_new + *last_len == new_index {
                *last_len += len;
                return;
            }
        }
        self.ops.push(DiffOp::Equal {
            old_index,
            new_index,
            len,
        });
    }

    pub(crate) fn delete(&mut self, old_index: usize, old_len: usize, new_index: usize) {
        if old_len > 0 {
            self.pending_run(old_index, new_index).old_len += old_len;
        }
    }

    pub(crate) fn insert(&mut self, old_index: usize, new_index: usize, new_len: usize) {
        if new_len > 0 {
            self.pending_run(old_index, new_index).new_len += new_len;
        }
    }

    pub(crate) fn push(&mut self, op: DiffOp) {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => self.equal(old_index, new_index, len),
            DiffOp::Delete {
                old_index,
                old_len,
                new_index,
            } => self.delete(old_index, old_len, new_index),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => self.insert(old_index, new_index, new_len),
        }
    }

    fn pending_run(&mut self, old_index: usize, new_index: usize) -> &mut PendingRun {
        self.pending.get_or_insert(PendingRun {
            old_index,
            new_index,
            old_len: 0,
            new_len: 0,
        })
    }

    fn flush(&mut self) {
        let Some(run) = self.pending.take() else {
            return;
        };
        if run.old_len > 0 {
            self.ops.push(DiffOp::Delete {
                old_index: run.old_index,
                old_len: run.old_len,
                new_index: run.new_index,
            });
        }
        if run.new_len > 0 {
            self.ops.push(DiffOp::Insert {
                old_index: run.old_index + run.old_len,
                new_index: run.new_index,
                new_len: run.new_len,
            });
        }
    }

    pub(crate) fn finish(mut self) -> EditScript {
        self.flush();
        EditScript { ops: self.ops }
    }
}

/// Why an edit script could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditScriptError {
    #[error("edit distance exceeds the limit of {max}")]
    EditDistanceExceeded { max: usize },
    #[error("deadline reached before the edit script was complete")]
    DeadlineExceeded,
    #[error("edit script computation was cancelled")]
    Cancelled,
}

/// Bounds applied to a single [`diff`] call
#[derive(Debug, Clone, Default)]
pub struct Limits {
    /// Abort once the edit distance is known to exceed this value
    pub max_edit_distance: Option<usize>,
    /// Deadline and cancellation, polled from the main loop
    pub budget: Budget,
}

impl Limits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_budget(budget: Budget) -> Self {
        Self {
            max_edit_distance: None,
            budget,
        }
    }

    pub fn max_edit_distance(mut self, max: usize) -> Self {
        self.max_edit_distance = Some(max);
        self
    }
}

/// Compute a shortest edit script turning `old` into `new`.
///
/// Linear-space Myers: the middle snake is found by running the forward and
/// backward greedy searches towards each other, then both halves recurse.
/// On a tie between diagonals `k - 1` and `k + 1` the deletion is extended
/// first, in both directions, so equal inputs give equal scripts.
///
/// # Examples
///
/// ```
/// use diff_engine::myers::{diff, DiffOp, Limits};
///
/// let old = ["a", "b", "c"];
/// let new = ["a", "x", "c"];
/// let script = diff(&old, &new, |a, b| a == b, &Limits::unlimited()).unwrap();
/// assert_eq!(
///     script.ops(),
///     &[
///         DiffOp::Equal { old_index: 0, new_index: 0, len: 1 },
///         DiffOp::Delete { old_index: 1, old_len: 1, new_index: 1 },
///         DiffOp::Insert { old_index: 2, new_index: 1, new_len: 1 },
///         DiffOp::Equal { old_index: 2, new_index: 2, len: 1 },
///     ]
/// );
/// ```
pub fn diff<T, F>(
    old: &[T],
    new: &[T],
    equals: F,
    limits: &Limits,
) -> Result<EditScript, EditScriptError>
where
    F: Fn(&T, &T) -> bool,
{
    let mut myers = Myers {
        old,
        new,
        equals,
        max_edit_distance: limits.max_edit_distance,
        poller: limits.budget.poller(),
        script: ScriptBuilder::default(),
    };
    myers.poller.poll()?;
    myers.conquer(0..old.len(), 0..new.len())?;
    Ok(myers.script.finish())
}

/// Furthest-reaching x per diagonal, stored densely at `k + offset`
struct V {
    offset: isize,
    data: Vec<isize>,
}

impl V {
    /// Room for diagonals `-max_d..=max_d`; unexplored entries hold -1
    fn new(max_d: usize) -> Self {
        V {
            offset: max_d as isize,
            data: vec![-1; 2 * max_d + 1],
        }
    }

    fn get(&self, k: isize) -> isize {
        self.data[(k + self.offset) as usize]
    }

    fn set(&mut self, k: isize, x: isize) {
        self.data[(k + self.offset) as usize] = x;
    }

    /// The value on diagonal `k`, if it is in range and explored
    fn lookup(&self, k: isize) -> Option<isize> {
        let index = k + self.offset;
        if index < 0 {
            return None;
        }
        self.data
            .get(index as usize)
            .copied()
            .filter(|&x| x >= 0)
    }
}

struct Myers<'a, T, F> {
    old: &'a [T],
    new: &'a [T],
    equals: F,
    max_edit_distance: Option<usize>,
    poller: Poller<'a>,
    script: ScriptBuilder,
}

impl<T, F> Myers<'_, T, F>
where
    F: Fn(&T, &T) -> bool,
{
    fn eq(&self, old_index: usize, new_index: usize) -> bool {
        (self.equals)(&self.old[old_index], &self.new[new_index])
    }

    fn common_prefix(&self, old: Range<usize>, new: Range<usize>) -> usize {
        old.zip(new).take_while(|&(o, n)| self.eq(o, n)).count()
    }

    fn common_suffix(&self, old: Range<usize>, new: Range<usize>) -> usize {
        old.rev()
            .zip(new.rev())
            .take_while(|&(o, n)| self.eq(o, n))
            .count()
    }

    fn charge(&self, edits: usize) -> Result<(), EditScriptError> {
        match self.max_edit_distance {
            Some(max) if edits > max => Err(EditScriptError::EditDistanceExceeded { max }),
            _ => Ok(()),
        }
    }

    fn conquer(
        &mut self,
        mut old: Range<usize>,
        mut new: Range<usize>,
    ) -> Result<(), EditScriptError> {
        let prefix = self.common_prefix(old.clone(), new.clone());
        self.script.equal(old.start, new.start, prefix);
        old.start += prefix;
        new.start += prefix;

        let suffix = self.common_suffix(old.clone(), new.clone());
        let suffix_start = (old.end - suffix, new.end - suffix);
        old.end -= suffix;
        new.end -= suffix;
        self.poller.tick(prefix + suffix + 1)?;

        if old.is_empty() && new.is_empty() {
            // Nothing left between the prefix and the suffix
        } else if new.is_empty() {
            self.charge(old.len())?;
            self.script.delete(old.start, old.len(), new.start);
        } else if old.is_empty() {
            self.charge(new.len())?;
            self.script.insert(old.start, new.start, new.len());
        } else if let Some((x, y)) = self.middle_snake(old.clone(), new.clone())? {
            self.conquer(old.start..x, new.start..y)?;
            self.conquer(x..old.end, y..new.end)?;
        } else {
            self.charge(old.len() + new.len())?;
            self.script.delete(old.start, old.len(), new.start);
            self.script.insert(old.end, new.start, new.len());
        }

        self.script.equal(suffix_start.0, suffix_start.1, suffix);
        Ok(())
    }

    /// Find a point on an optimal path roughly half-way through the edit
    /// graph of `old` × `new`, returned in absolute indices.
    fn middle_snake(
        &mut self,
        old: Range<usize>,
        new: Range<usize>,
    ) -> Result<Option<(usize, usize)>, EditScriptError> {
        let n = old.len() as isize;
        let m = new.len() as isize;
        let max_d = (old.len() + new.len() + 1) / 2 + 1;

        let mut forward = V::new(max_d);
        let mut backward = V::new(max_d);
        forward.set(1, 0);
        backward.set(1, 0);

        // The parity of the edit distance matches the parity of `delta`, so
        // only one of the two searches can close the gap on each step.
        let delta = n - m;
        let odd = delta % 2 != 0;

        // Diagonals that ran off the graph are skipped on later steps.
        let (mut forward_start, mut forward_end) = (0isize, 0isize);
        let (mut backward_start, mut backward_end) = (0isize, 0isize);

        for d in 0..max_d as isize {
            self.poller.tick(2 * d as usize + 1)?;
            if d > 0 {
                let lower_bound = if odd { 2 * d - 1 } else { 2 * d };
                self.charge(lower_bound as usize)?;
            }

            let mut k = -d + forward_start;
            while k <= d - forward_end {
                let mut x = if k == -d || (k != d && forward.get(k - 1) < forward.get(k + 1)) {
                    forward.get(k + 1)
                } else {
                    forward.get(k - 1) + 1
                };
                let mut y = x - k;

                let start = (x, y);
                while x < n
                    && y >= 0
                    && y < m
                    && self.eq(old.start + x as usize, new.start + y as usize)
                {
                    x += 1;
                    y += 1;
                }
                self.poller.tick((x - start.0) as usize)?;
                forward.set(k, x);

                if x > n {
                    forward_end += 2;
                } else if y > m {
                    forward_start += 2;
                } else if odd && y >= 0 {
                    if let Some(back_x) = backward.lookup(delta - k) {
                        if x >= n - back_x {
                            return Ok(Some((old.start + x as usize, new.start + y as usize)));
                        }
                    }
                }
                k += 2;
            }

            let mut k = -d + backward_start;
            while k <= d - backward_end {
                let mut x = if k == -d || (k != d && backward.get(k - 1) < backward.get(k + 1)) {
                    backward.get(k + 1)
                } else {
                    backward.get(k - 1) + 1
                };
                let mut y = x - k;

                let start = x;
                while x < n
                    && y >= 0
                    && y < m
                    && self.eq(
                        old.start + (n - 1 - x) as usize,
                        new.start + (m - 1 - y) as usize,
                    )
                {
                    x += 1;
                    y += 1;
                }
                self.poller.tick((x - start) as usize)?;
                backward.set(k, x);

                if x > n {
                    backward_end += 2;
                } else if y > m {
                    backward_start += 2;
                } else if !odd {
                    let forward_k = delta - k;
                    if let Some(forward_x) = forward.lookup(forward_k) {
                        let forward_y = forward_x - forward_k;
                        if forward_x >= n - x && forward_x <= n && (0..=m).contains(&forward_y) {
                            return Ok(Some((
                                old.start + forward_x as usize,
                                new.start + forward_y as usize,
                            )));
                        }
                    }
                }
                k += 2;
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CancellationToken;
    use proptest::prelude::*;
    use std::time::Instant;

    fn diff_eq<T: PartialEq>(old: &[T], new: &[T]) -> EditScript {
        diff(old, new, |a, b| a == b, &Limits::unlimited()).unwrap()
    }

    /// Short sequences over a small alphabet, so that matches are common
    fn seq(alphabet: u8, max_len: usize) -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0..alphabet, 0..max_len)
    }

    fn lcs_len<T: PartialEq>(old: &[T], new: &[T]) -> usize {
        let mut table = vec![vec![0usize; new.len() + 1]; old.len() + 1];
        for i in (0..old.len()).rev() {
            for j in (0..new.len()).rev() {
                table[i][j] = if old[i] == new[j] {
                    table[i + 1][j + 1] + 1
                } else {
                    table[i + 1][j].max(table[i][j + 1])
                };
            }
        }
        table[0][0]
    }

    proptest! {
        #[test]
        fn test_length_invariant(old: Vec<u8>, new: Vec<u8>) {
            let script = diff_eq(&old, &new);
            prop_assert!(script.covers(old.len(), new.len()));
        }

        #[test]
        fn test_round_trip(old in seq(4, 40), new in seq(4, 40)) {
            let script = diff_eq(&old, &new);
            prop_assert_eq!(script.apply(&old, &new), new);
        }

        #[test]
        fn test_minimal(old in seq(4, 30), new in seq(4, 30)) {
            let script = diff_eq(&old, &new);
            let expected = old.len() + new.len() - 2 * lcs_len(&old, &new);
            prop_assert_eq!(script.edit_distance(), expected);
        }

        #[test]
        fn test_normalised(old in seq(3, 30), new in seq(3, 30)) {
            let script = diff_eq(&old, &new);
            for pair in script.ops().windows(2) {
                prop_assert_ne!(pair[0].tag(), pair[1].tag());
                let (first, second) = (pair[0].tag(), pair[1].tag());
                prop_assert!(!(first == DiffTag::Insert && second == DiffTag::Delete));
            }
        }

        #[test]
        fn test_deterministic(old in seq(4, 40), new in seq(4, 40)) {
            prop_assert_eq!(diff_eq(&old, &new), diff_eq(&old, &new));
        }

        #[test]
        fn test_symmetry(old in seq(4, 30), new in seq(4, 30)) {
            let (forward, backward) = (diff_eq(&old, &new), diff_eq(&new, &old));
            prop_assert_eq!(forward.edit_distance(), backward.edit_distance());
        }
    }

    #[test]
    fn test_both_empty() {
        let script = diff_eq::<u8>(&[], &[]);
        assert!(script.is_empty());
    }

    #[test]
    fn test_identical() {
        let script = diff_eq(&[1, 2, 3], &[1, 2, 3]);
        assert_eq!(
            script.ops(),
            &[DiffOp::Equal {
                old_index: 0,
                new_index: 0,
                len: 3
            }]
        );
    }

    #[test]
    fn test_completely_different() {
        let script = diff_eq(&["a", "b", "c"], &["x", "y", "z"]);
        assert_eq!(
            script.ops(),
            &[
                DiffOp::Delete {
                    old_index: 0,
                    old_len: 3,
                    new_index: 0
                },
                DiffOp::Insert {
                    old_index: 3,
                    new_index: 0,
                    new_len: 3
                },
            ]
        );
    }

    #[test]
    fn test_duplicates() {
        let script = diff_eq(&["a", "a", "b"], &["a", "b", "b"]);
        assert_eq!(
            script.ops(),
            &[
                DiffOp::Equal {
                    old_index: 0,
                    new_index: 0,
                    len: 1
                },
                DiffOp::Delete {
                    old_index: 1,
                    old_len: 1,
                    new_index: 1
                },
                DiffOp::Insert {
                    old_index: 2,
                    new_index: 1,
                    new_len: 1
                },
                DiffOp::Equal {
                    old_index: 2,
                    new_index: 2,
                    len: 1
                },
            ]
        );
    }

    #[test]
    fn test_insertion_in_middle() {
        let script = diff_eq(&["a", "c"], &["a", "b", "c"]);
        assert_eq!(
            script.ops().iter().map(DiffOp::tag).collect::<Vec<_>>(),
            vec![DiffTag::Equal, DiffTag::Insert, DiffTag::Equal]
        );
        assert_eq!(script.change_runs(), vec![ChangeRun { old: 1..1, new: 1..2 }]);
    }

    #[test]
    fn test_custom_equality() {
        let old = ["A", "b"];
        let new = ["a", "B"];
        let script = diff(
            &old,
            &new,
            |a, b| a.eq_ignore_ascii_case(b),
            &Limits::unlimited(),
        )
        .unwrap();
        assert!(!script.has_changes());
    }

    #[test]
    fn test_edit_distance_limit() {
        let old: Vec<u32> = (0..100).collect();
        let new: Vec<u32> = (0..100).map(|i| if i % 10 == 0 { 1000 + i } else { i }).collect();

        let within = diff(&old, &new, |a, b| a == b, &Limits::unlimited().max_edit_distance(20));
        assert_eq!(within.unwrap().edit_distance(), 20);

        let exceeded = diff(&old, &new, |a, b| a == b, &Limits::unlimited().max_edit_distance(19));
        assert_eq!(
            exceeded,
            Err(EditScriptError::EditDistanceExceeded { max: 19 })
        );
    }

    #[test]
    fn test_edit_distance_limit_one_sided() {
        let new: Vec<u32> = (0..50).collect();
        let result = diff(&[], &new, |a, b| a == b, &Limits::unlimited().max_edit_distance(10));
        assert_eq!(
            result,
            Err(EditScriptError::EditDistanceExceeded { max: 10 })
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let limits = Limits::with_budget(Budget::unlimited().with_cancellation(token));
        let result = diff(&[1, 2], &[3, 4], |a, b| a == b, &limits);
        assert_eq!(result, Err(EditScriptError::Cancelled));
    }

    #[test]
    fn test_deadline_interrupts_long_run() {
        // Disjoint inputs force D = N + M, far more work than one poll interval
        let old: Vec<u32> = (0..20_000).map(|i| i * 2).collect();
        let new: Vec<u32> = (0..20_000).map(|i| i * 2 + 1).collect();
        let limits = Limits::with_budget(Budget::unlimited().with_deadline(Instant::now()));
        let result = diff(&old, &new, |a, b| a == b, &limits);
        assert_eq!(result, Err(EditScriptError::DeadlineExceeded));
    }
}
