use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Role a row plays in an aligned diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    /// Token present on both sides.
    Context,
    /// Token only present on the left (before) side.
    Deletion,
    /// Token only present on the right (after) side.
    Addition,
}

impl DiffLineKind {
    /// Marker shown next to the left column.
    #[must_use]
    pub const fn left_marker(self) -> &'static str {
        match self {
            Self::Context | Self::Addition => " ",
            Self::Deletion => "-",
        }
    }

    /// Marker shown next to the right column.
    #[must_use]
    pub const fn right_marker(self) -> &'static str {
        match self {
            Self::Context | Self::Deletion => " ",
            Self::Addition => "+",
        }
    }
}

/// One aligned row of a two-sided diff.
///
/// Rows are ephemeral: they are recomputed from the two instruction lists of a
/// snapshot whenever a view needs them and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Whether the row is shared, removed or added.
    pub kind: DiffLineKind,
    /// 0-based index into the left sequence, absent for additions.
    #[serde(default)]
    pub left_index: Option<u32>,
    /// Left content, empty for additions.
    #[serde(default)]
    pub left_text: String,
    /// 0-based index into the right sequence, absent for deletions.
    #[serde(default)]
    pub right_index: Option<u32>,
    /// Right content, empty for deletions.
    #[serde(default)]
    pub right_text: String,
}

impl DiffLine {
    /// Row present on both sides.
    pub fn context(left_index: u32, right_index: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind: DiffLineKind::Context,
            left_index: Some(left_index),
            left_text: text.clone(),
            right_index: Some(right_index),
            right_text: text,
        }
    }

    /// Left-only row.
    pub fn deletion(left_index: u32, text: impl Into<String>) -> Self {
        Self {
            kind: DiffLineKind::Deletion,
            left_index: Some(left_index),
            left_text: text.into(),
            right_index: None,
            right_text: String::new(),
        }
    }

    /// Right-only row.
    pub fn addition(right_index: u32, text: impl Into<String>) -> Self {
        Self {
            kind: DiffLineKind::Addition,
            left_index: None,
            left_text: String::new(),
            right_index: Some(right_index),
            right_text: text.into(),
        }
    }

    /// `true` when both sides carry the same token.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self.kind, DiffLineKind::Context)
    }
}

/// Summary counts for a set of hunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiffStats {
    /// Number of added tokens.
    pub additions: u32,
    /// Number of removed tokens.
    pub deletions: u32,
}

impl DiffStats {
    /// A stats instance with zero additions and deletions.
    pub const ZERO: Self = Self {
        additions: 0,
        deletions: 0,
    };

    /// Convenience constructor for explicit values.
    #[must_use]
    pub const fn new(additions: u32, deletions: u32) -> Self {
        Self {
            additions,
            deletions,
        }
    }

    /// Combine two stats structs.
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self {
            additions: self.additions + other.additions,
            deletions: self.deletions + other.deletions,
        }
    }
}

/// Shape of a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Only added instructions.
    Insert,
    /// Only removed instructions.
    Remove,
    /// Removed and added instructions.
    Replace,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::Replace => "replace",
        })
    }
}

/// A contiguous run of non-matching rows collapsed into one record.
///
/// A hunk always holds at least one removed or added instruction. Hunks of a
/// snapshot never overlap and are ordered by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEdit {
    /// 0-based index of the first removed instruction (or the insertion point).
    pub before_start: u32,
    /// 0-based index of the first added instruction (or the deletion point).
    pub after_start: u32,
    /// Removed instruction texts, in order.
    #[serde(default)]
    pub removed: Vec<String>,
    /// Added instruction texts, in order.
    #[serde(default)]
    pub added: Vec<String>,
    /// Kind tag, either supplied by the instrumentation or derived.
    #[serde(default)]
    pub kind: Option<EditKind>,
    /// Free-text provenance note supplied by the instrumentation.
    #[serde(default)]
    pub note: Option<String>,
}

impl PatchEdit {
    /// Build a hunk and tag it with the kind implied by its contents.
    #[must_use]
    pub fn new(
        before_start: u32,
        after_start: u32,
        removed: Vec<String>,
        added: Vec<String>,
    ) -> Self {
        let mut edit = Self {
            before_start,
            after_start,
            removed,
            added,
            kind: None,
            note: None,
        };
        edit.kind = edit.derived_kind();
        edit
    }

    /// Kind implied by the removed/added counts, `None` for an empty hunk.
    #[must_use]
    pub fn derived_kind(&self) -> Option<EditKind> {
        match (self.removed.is_empty(), self.added.is_empty()) {
            (true, true) => None,
            (true, false) => Some(EditKind::Insert),
            (false, true) => Some(EditKind::Remove),
            (false, false) => Some(EditKind::Replace),
        }
    }

    /// `true` when the hunk carries no instructions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Half-open index range covered on the before side.
    #[must_use]
    pub fn before_range(&self) -> Range<u32> {
        let len = u32::try_from(self.removed.len()).unwrap_or(u32::MAX);
        self.before_start..self.before_start.saturating_add(len)
    }

    /// Added/removed counts of this hunk.
    #[must_use]
    pub fn stats(&self) -> DiffStats {
        DiffStats::new(
            u32::try_from(self.added.len()).unwrap_or(u32::MAX),
            u32::try_from(self.removed.len()).unwrap_or(u32::MAX),
        )
    }
}
