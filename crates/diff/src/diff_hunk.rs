use derive_more::Display;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which side of a modified pair a highlight belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HighlightKind {
    /// Characters only present in the new line
    #[display(fmt = "added")]
    Added,

    /// Characters only present in the old line
    #[display(fmt = "removed")]
    Removed,
}

/// A span of characters inside one line, `end` exclusive.
///
/// Offsets count Unicode scalar values, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: HighlightKind,
}

impl HighlightRange {
    pub fn new(start: usize, end: usize, kind: HighlightKind) -> Self {
        Self { start, end, kind }
    }

    pub fn to_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Represents the type of a line in a diff hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DiffLineKind {
    /// Unchanged line shown for orientation
    #[display(fmt = "context")]
    Context,

    /// Line only exists in the new text
    #[display(fmt = "added")]
    Added,

    /// Line only exists in the old text
    #[display(fmt = "removed")]
    Removed,

    /// One side of a changed line paired with its counterpart
    #[display(fmt = "modified")]
    Modified,
}

/// A single rendered line of a hunk
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DiffLine {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: DiffLineKind,

    /// Line text without its terminator
    pub content: String,

    /// 1-based line number in the old text, if the line exists there
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub old_line_number: Option<usize>,

    /// 1-based line number in the new text, if the line exists there
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub new_line_number: Option<usize>,

    /// Changed spans, only present on modified lines
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub highlight_ranges: Option<Vec<HighlightRange>>,
}

impl DiffLine {
    pub fn context(content: &str, old_line_number: usize, new_line_number: usize) -> Self {
        Self {
            kind: DiffLineKind::Context,
            content: content.to_string(),
            old_line_number: Some(old_line_number),
            new_line_number: Some(new_line_number),
            highlight_ranges: None,
        }
    }

    pub fn removed(content: &str, old_line_number: usize) -> Self {
        Self {
            kind: DiffLineKind::Removed,
            content: content.to_string(),
            old_line_number: Some(old_line_number),
            new_line_number: None,
            highlight_ranges: None,
        }
    }

    pub fn added(content: &str, new_line_number: usize) -> Self {
        Self {
            kind: DiffLineKind::Added,
            content: content.to_string(),
            old_line_number: None,
            new_line_number: Some(new_line_number),
            highlight_ranges: None,
        }
    }

    /// The old half of a modified pair, carrying `removed` ranges
    pub fn modified_old(
        content: &str,
        old_line_number: usize,
        ranges: Vec<HighlightRange>,
    ) -> Self {
        Self {
            kind: DiffLineKind::Modified,
            content: content.to_string(),
            old_line_number: Some(old_line_number),
            new_line_number: None,
            highlight_ranges: Some(ranges),
        }
    }

    /// The new half of a modified pair, carrying `added` ranges
    pub fn modified_new(
        content: &str,
        new_line_number: usize,
        ranges: Vec<HighlightRange>,
    ) -> Self {
        Self {
            kind: DiffLineKind::Modified,
            content: content.to_string(),
            old_line_number: None,
            new_line_number: Some(new_line_number),
            highlight_ranges: Some(ranges),
        }
    }

    /// Check whether the line is part of the old text
    pub fn in_old(&self) -> bool {
        self.old_line_number.is_some()
    }

    /// Check whether the line is part of the new text
    pub fn in_new(&self) -> bool {
        self.new_line_number.is_some()
    }

    /// Counts towards `stats.additions`
    pub fn is_addition(&self) -> bool {
        matches!(self.kind, DiffLineKind::Added | DiffLineKind::Modified) && !self.in_old()
    }

    /// Counts towards `stats.deletions`
    pub fn is_deletion(&self) -> bool {
        matches!(self.kind, DiffLineKind::Removed | DiffLineKind::Modified) && !self.in_new()
    }

    pub fn highlights(&self) -> &[HighlightRange] {
        self.highlight_ranges.as_deref().unwrap_or_default()
    }
}

/// Represents a hunk of changes between two versions of text
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Hunk {
    /// 1-based first old line, or the line before the change when `old_lines` is 0
    pub old_start: usize,

    /// Number of old-side lines in the hunk
    pub old_lines: usize,

    /// 1-based first new line, or the line before the change when `new_lines` is 0
    pub new_start: usize,

    /// Number of new-side lines in the hunk
    pub new_lines: usize,

    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// The unified-diff header, e.g. `@@ -1,3 +1,4 @@`
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        )
    }

    /// The 0-based span of old lines covered by this hunk
    pub fn old_range(&self) -> Range<usize> {
        let start = if self.old_lines == 0 {
            self.old_start
        } else {
            self.old_start - 1
        };
        start..start + self.old_lines
    }

    /// The 0-based span of new lines covered by this hunk
    pub fn new_range(&self) -> Range<usize> {
        let start = if self.new_lines == 0 {
            self.new_start
        } else {
            self.new_start - 1
        };
        start..start + self.new_lines
    }

    /// Get the number of added lines in this hunk
    pub fn added_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.is_addition()).count()
    }

    /// Get the number of deleted lines in this hunk
    pub fn deleted_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.is_deletion()).count()
    }

    /// Get the number of unchanged lines in this hunk
    pub fn context_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == DiffLineKind::Context)
            .count()
    }
}
