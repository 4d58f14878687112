use std::collections::HashMap;

use crate::myers::{self, DiffOp, EditScript, EditScriptError, Limits, ScriptBuilder};

/// Split a text on `\n`.
///
/// A `\r` before the `\n` stays in the line. An empty text has no lines and
/// a trailing `\n` does not start an extra empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

fn ends_without_newline(text: &str) -> bool {
    !text.is_empty() && !text.ends_with('\n')
}

/// How two lines are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineMatching {
    /// Compare lines without trailing whitespace, including a trailing `\r`
    pub ignore_trailing_whitespace: bool,
    /// Drop the `\r` of CRLF lines and ignore a missing final newline
    pub normalize_line_endings: bool,
}

/// Line-level edit script between two texts
#[derive(Debug, Clone)]
pub struct LineDiff<'a> {
    old_lines: Vec<&'a str>,
    new_lines: Vec<&'a str>,
    script: EditScript,
}

impl<'a> LineDiff<'a> {
    /// Diff `old` against `new` line by line
    pub fn compute(
        old: &'a str,
        new: &'a str,
        matching: LineMatching,
        limits: &Limits,
    ) -> Result<Self, EditScriptError> {
        let mut old_lines = split_lines(old);
        let mut new_lines = split_lines(new);
        if matching.normalize_line_endings {
            strip_carriage_returns(&mut old_lines);
            strip_carriage_returns(&mut new_lines);
        }

        // Interning turns every line comparison inside the search into an
        // integer compare.
        let mut interner = Interner::new(matching.ignore_trailing_whitespace);
        let old_ids = interner.intern_all(&old_lines);
        let new_ids = interner.intern_all(&new_lines);
        log::trace!(
            "interned {} old and {} new lines into {} distinct ids",
            old_ids.len(),
            new_ids.len(),
            interner.len()
        );

        let mut script = myers::diff(&old_ids, &new_ids, |a, b| a == b, limits)?;
        let final_newline_differs = ends_without_newline(old) != ends_without_newline(new);
        if final_newline_differs && !matching.normalize_line_endings {
            log::trace!("final newline differs");
            script = split_last_equal(script);
        }

        Ok(Self {
            old_lines,
            new_lines,
            script,
        })
    }

    pub fn old_lines(&self) -> &[&'a str] {
        &self.old_lines
    }

    pub fn new_lines(&self) -> &[&'a str] {
        &self.new_lines
    }

    pub fn script(&self) -> &EditScript {
        &self.script
    }

    /// Walk the script as `(old_line_number, new_line_number)` pairs.
    ///
    /// Numbers are 1-based; the side a line is missing from is `None`.
    pub fn line_pairs(&self) -> Vec<(Option<usize>, Option<usize>)> {
        let mut pairs = Vec::with_capacity(self.old_lines.len().max(self.new_lines.len()));
        for op in self.script.ops() {
            match *op {
                DiffOp::Equal {
                    old_index,
                    new_index,
                    len,
                } => pairs.extend((1..=len).map(|i| (Some(old_index + i), Some(new_index + i)))),
                DiffOp::Delete {
                    old_index, old_len, ..
                } => pairs.extend((old_index..old_index + old_len).map(|i| (Some(i + 1), None))),
                DiffOp::Insert {
                    new_index, new_len, ..
                } => pairs.extend((new_index..new_index + new_len).map(|i| (None, Some(i + 1)))),
            }
        }
        pairs
    }
}

fn strip_carriage_returns(lines: &mut [&str]) {
    for line in lines.iter_mut() {
        let text = *line;
        if let Some(stripped) = text.strip_suffix('\r') {
            *line = stripped;
        }
    }
}

/// Turn a final `Equal` of the last lines into a delete plus insert
fn split_last_equal(script: EditScript) -> EditScript {
    if !matches!(script.ops().last(), Some(DiffOp::Equal { .. })) {
        return script;
    }
    let mut ops = script.into_ops();
    let mut builder = ScriptBuilder::default();
    let last = ops.pop();
    for op in ops {
        builder.push(op);
    }
    if let Some(DiffOp::Equal {
        old_index,
        new_index,
        len,
    }) = last
    {
        let (old_last, new_last) = (old_index + len - 1, new_index + len - 1);
        builder.equal(old_index, new_index, len - 1);
        builder.delete(old_last, 1, new_last);
        builder.insert(old_last + 1, new_last, 1);
    }
    builder.finish()
}

/// Maps equal lines to equal ids, in first-seen order
struct Interner<'a> {
    ids: HashMap<&'a str, u32>,
    ignore_trailing_whitespace: bool,
}

impl<'a> Interner<'a> {
    fn new(ignore_trailing_whitespace: bool) -> Self {
        Self {
            ids: HashMap::new(),
            ignore_trailing_whitespace,
        }
    }

    fn intern_all(&mut self, lines: &[&'a str]) -> Vec<u32> {
        lines.iter().map(|line| self.intern(line)).collect()
    }

    fn intern(&mut self, line: &'a str) -> u32 {
        let key = if self.ignore_trailing_whitespace {
            line.trim_end()
        } else {
            line
        };
        let next = self.ids.len() as u32;
        *self.ids.entry(key).or_insert(next)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compute<'a>(old: &'a str, new: &'a str, matching: LineMatching) -> LineDiff<'a> {
        LineDiff::compute(old, new, matching, &Limits::unlimited()).unwrap()
    }

    fn ignore_whitespace() -> LineMatching {
        LineMatching {
            ignore_trailing_whitespace: true,
            ..LineMatching::default()
        }
    }

    fn normalized() -> LineMatching {
        LineMatching {
            normalize_line_endings: true,
            ..LineMatching::default()
        }
    }

    #[test]
    fn test_split_lines() {
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a"), vec!["a"]);
        assert_eq!(split_lines("a\n"), vec!["a"]);
        assert_eq!(split_lines("a\r\nb\n\nc"), vec!["a\r", "b", "", "c"]);
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
    }

    #[test]
    fn test_line_pairs() {
        let diff = compute("a\nb\nc", "a\nx\nc\nd", LineMatching::default());
        assert_eq!(
            diff.line_pairs(),
            vec![
                (Some(1), Some(1)),
                (Some(2), None),
                (None, Some(2)),
                (Some(3), Some(3)),
                (None, Some(4)),
            ]
        );
    }

    #[test]
    fn test_trailing_whitespace() {
        let strict = compute("a  \nb", "a\nb", LineMatching::default());
        assert!(strict.script().has_changes());

        let relaxed = compute("a  \r\nb", "a\nb", ignore_whitespace());
        assert!(!relaxed.script().has_changes());
    }

    #[test]
    fn test_round_trip() {
        let old = "one\ntwo\nthree\nfour";
        let new = "zero\none\nthree\nfour\nfive";
        let diff = compute(old, new, LineMatching::default());
        assert_eq!(
            diff.script().apply(diff.old_lines(), diff.new_lines()),
            diff.new_lines().to_vec()
        );
    }

    #[test]
    fn test_crlf_lines_differ_from_lf_lines() {
        let diff = compute("a\r\nb\r\n", "a\nb\n", LineMatching::default());
        assert_eq!(diff.old_lines(), &["a\r", "b\r"]);
        assert_eq!(diff.script().edit_distance(), 4);

        let diff = compute("a\r\nb\r\n", "a\nb\n", normalized());
        assert_eq!(diff.old_lines(), &["a", "b"]);
        assert!(!diff.script().has_changes());
    }

    #[test]
    fn test_missing_final_newline_changes_last_line() {
        let diff = compute("a\nb", "a\nb\n", LineMatching::default());
        assert_eq!(
            diff.line_pairs(),
            vec![(Some(1), Some(1)), (Some(2), None), (None, Some(2))]
        );
        assert!(diff.script().covers(2, 2));

        assert!(!compute("a\nb", "a\nb\n", normalized()).script().has_changes());
    }

    #[test]
    fn test_appended_line_keeps_last_line_equal() {
        // The old last line is matched with a line that is not last
        let diff = compute("a\nb", "a\nb\nc\n", LineMatching::default());
        assert_eq!(
            diff.line_pairs(),
            vec![(Some(1), Some(1)), (Some(2), Some(2)), (None, Some(3))]
        );
    }
}
