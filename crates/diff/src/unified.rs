use std::fmt;

use crate::config::DiffOptions;
use crate::diff_hunk::{DiffLine, DiffLineKind, Hunk};
use crate::diff_result::DiffResult;
use crate::engine::compute_diff;
use crate::error::DiffError;

impl DiffLine {
    /// The unified-diff marker of this line
    pub fn prefix(&self) -> char {
        match self.kind {
            DiffLineKind::Context => ' ',
            DiffLineKind::Removed => '-',
            DiffLineKind::Added => '+',
            DiffLineKind::Modified if self.in_old() => '-',
            DiffLineKind::Modified => '+',
        }
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.lines {
            writeln!(f, "{}{}", line.prefix(), line.content)?;
        }
        Ok(())
    }
}

impl DiffResult {
    /// Render every hunk in unified format, without file headers
    pub fn to_unified(&self) -> String {
        self.hunks.iter().map(Hunk::to_string).collect()
    }
}

/// Diff two texts and render the result in unified format
pub fn unified_diff(old: &str, new: &str, context_lines: usize) -> Result<String, DiffError> {
    let options = DiffOptions::default().context_lines(context_lines);
    Ok(compute_diff(old, new, &options)?.to_unified())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(DiffLine::context("a", 1, 1).prefix(), ' ');
        assert_eq!(DiffLine::removed("a", 1).prefix(), '-');
        assert_eq!(DiffLine::added("a", 1).prefix(), '+');
        assert_eq!(DiffLine::modified_old("a", 1, vec![]).prefix(), '-');
        assert_eq!(DiffLine::modified_new("a", 1, vec![]).prefix(), '+');
    }

    #[test]
    fn test_identical_texts_render_nothing() {
        assert_eq!(unified_diff("same\n", "same\n", 3).unwrap(), "");
    }

    #[test]
    fn test_unified_modification() {
        insta::assert_snapshot!(unified_diff("a\nb\nc\n", "a\nx\nc\n", 1).unwrap().trim_end(), @r"
        @@ -1,3 +1,3 @@
         a
        -b
        +x
         c
        ");
    }
}
