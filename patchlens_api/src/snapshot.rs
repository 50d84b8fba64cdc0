use serde::{Deserialize, Serialize};

use super::diff::{DiffStats, PatchEdit};

/// Who owns the patch recorded by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerClass {
    /// Patch applied by the hosting framework itself.
    Internal,
    /// Patch applied by a third-party module.
    External,
}

impl OwnerClass {
    /// Classify an owner tag against the configured internal prefixes.
    ///
    /// Matching is case-insensitive on the prefix.
    #[must_use]
    pub fn classify(owner: &str, internal_prefixes: &[String]) -> Self {
        let owner = owner.to_ascii_lowercase();
        if internal_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && owner.starts_with(&prefix.to_ascii_lowercase()))
        {
            Self::Internal
        } else {
            Self::External
        }
    }
}

/// One recorded patch event.
///
/// Snapshots are created once per patch application and never mutated after
/// they enter the history. Stack-depth arrays are either absent or exactly as
/// long as the instruction list they annotate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Identifier of the module that applied the patch.
    pub owner: String,
    /// Identity of the patched method, e.g. `Verse.Pawn::Tick`.
    pub method: String,
    /// Optional patch step name reported by the instrumentation.
    #[serde(default)]
    pub step: Option<String>,
    /// Optional origin (patch method or assembly) reported by the instrumentation.
    #[serde(default)]
    pub origin: Option<String>,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Time spent applying the patch, in microseconds.
    #[serde(default)]
    pub duration_us: u64,
    /// Instruction texts before the patch.
    #[serde(default)]
    pub before_instructions: Vec<String>,
    /// Instruction texts after the patch.
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Evaluation-stack depth per before instruction.
    #[serde(default)]
    pub before_stack_depths: Option<Vec<i32>>,
    /// Evaluation-stack depth per after instruction.
    #[serde(default)]
    pub stack_depths: Option<Vec<i32>>,
    /// Hunks recorded at creation time.
    #[serde(default)]
    pub patch_edits: Vec<PatchEdit>,
    /// Free-text warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Number of added instructions across all hunks.
    #[serde(default)]
    pub added: u32,
    /// Number of removed instructions across all hunks.
    #[serde(default)]
    pub removed: u32,
}

impl Snapshot {
    /// Minimal snapshot holding only identity and the two instruction lists.
    pub fn new(
        owner: impl Into<String>,
        method: impl Into<String>,
        timestamp_ms: i64,
        before_instructions: Vec<String>,
        instructions: Vec<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
            step: None,
            origin: None,
            timestamp_ms,
            duration_us: 0,
            before_instructions,
            instructions,
            before_stack_depths: None,
            stack_depths: None,
            patch_edits: Vec::new(),
            warnings: Vec::new(),
            added: 0,
            removed: 0,
        }
    }

    /// Deduplication key.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (self.owner.as_str(), self.method.as_str())
    }

    /// Summary counts as recorded.
    #[must_use]
    pub const fn stats(&self) -> DiffStats {
        DiffStats::new(self.added, self.removed)
    }

    /// Owner class derived from the owner tag.
    #[must_use]
    pub fn owner_class(&self, internal_prefixes: &[String]) -> OwnerClass {
        OwnerClass::classify(&self.owner, internal_prefixes)
    }

    /// Case-insensitive substring search over owner, method, step and origin.
    ///
    /// `needle` is expected in lowercase already.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        [
            Some(self.owner.as_str()),
            Some(self.method.as_str()),
            self.step.as_deref(),
            self.origin.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}
