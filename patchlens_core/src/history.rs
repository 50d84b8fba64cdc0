//! Append-only, time-ordered snapshot history.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use patchlens_api::{OwnerClass, Snapshot};
use tracing::debug;

use crate::hunks::normalize_snapshot;
use crate::Result;

/// Filters applied by [`SnapshotHistory::query`].
#[derive(Default, Clone, Copy)]
pub struct SnapshotQuery<'a> {
    owner_class: Option<OwnerClass>,
    search: Option<&'a str>,
    relevance: Option<&'a dyn Fn(&Snapshot) -> bool>,
}

impl<'a> SnapshotQuery<'a> {
    /// Query matching every snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only snapshots of the given owner class.
    #[must_use]
    pub const fn owner_class(mut self, class: OwnerClass) -> Self {
        self.owner_class = Some(class);
        self
    }

    /// Case-insensitive substring search over owner, method, step and origin.
    #[must_use]
    pub const fn search(mut self, needle: &'a str) -> Self {
        self.search = Some(needle);
        self
    }

    /// Caller-supplied context relevance predicate.
    #[must_use]
    pub fn relevance(mut self, predicate: &'a dyn Fn(&Snapshot) -> bool) -> Self {
        self.relevance = Some(predicate);
        self
    }
}

impl fmt::Debug for SnapshotQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotQuery")
            .field("owner_class", &self.owner_class)
            .field("search", &self.search)
            .field("relevance", &self.relevance.is_some())
            .finish()
    }
}

/// Recorded snapshots in ascending timestamp order.
///
/// Recording order breaks timestamp ties: of two snapshots with the same
/// timestamp, the one recorded later sorts later.
#[derive(Debug, Default)]
pub struct SnapshotHistory {
    snapshots: Vec<Arc<Snapshot>>,
    internal_owners: Vec<String>,
}

impl SnapshotHistory {
    /// Empty history classifying owners with the given internal prefixes.
    #[must_use]
    pub fn new(internal_owners: Vec<String>) -> Self {
        Self {
            snapshots: Vec::new(),
            internal_owners,
        }
    }

    /// Normalize and append a snapshot.
    pub fn record(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(normalize_snapshot(snapshot));
        let at = self
            .snapshots
            .partition_point(|existing| existing.timestamp_ms <= snapshot.timestamp_ms);
        debug!(
            owner = %snapshot.owner,
            method = %snapshot.method,
            hunks = snapshot.patch_edits.len(),
            "recorded snapshot"
        );
        self.snapshots.insert(at, Arc::clone(&snapshot));
        snapshot
    }

    /// Filtered, deduplicated snapshots in ascending timestamp order.
    ///
    /// For each `(owner, method)` only the most recent snapshot survives; the
    /// filters are applied after deduplication.
    #[must_use]
    pub fn query(&self, query: &SnapshotQuery<'_>) -> Vec<Arc<Snapshot>> {
        let mut newest: HashMap<(&str, &str), usize> = HashMap::new();
        for (idx, snapshot) in self.snapshots.iter().enumerate() {
            // later positions are newer or recorded later at the same timestamp
            newest.insert(snapshot.key(), idx);
        }
        let needle = query.search.map(str::to_lowercase);

        self.snapshots
            .iter()
            .enumerate()
            .filter(|(idx, snapshot)| newest.get(&snapshot.key()) == Some(idx))
            .map(|(_, snapshot)| snapshot)
            .filter(|snapshot| self.accepts(query, needle.as_deref(), snapshot))
            .cloned()
            .collect()
    }

    fn accepts(&self, query: &SnapshotQuery<'_>, needle: Option<&str>, snapshot: &Snapshot) -> bool {
        query
            .owner_class
            .map_or(true, |class| snapshot.owner_class(&self.internal_owners) == class)
            && needle.map_or(true, |needle| snapshot.matches_search(needle))
            && query.relevance.map_or(true, |relevant| relevant(snapshot))
    }

    /// Most recent snapshot for `(owner, method)`.
    #[must_use]
    pub fn latest(&self, owner: &str, method: &str) -> Option<Arc<Snapshot>> {
        self.snapshots
            .iter()
            .rev()
            .find(|snapshot| snapshot.key() == (owner, method))
            .cloned()
    }

    /// Owner prefixes classified as internal.
    #[must_use]
    pub fn internal_owners(&self) -> &[String] {
        &self.internal_owners
    }

    /// Number of recorded snapshots, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Export every recorded snapshot as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let all: Vec<&Snapshot> = self.snapshots.iter().map(AsRef::as_ref).collect();
        Ok(serde_json::to_string_pretty(&all)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(owner: &str, method: &str, ts: i64) -> Snapshot {
        Snapshot::new(owner, method, ts, vec!["ret".into()], vec!["nop".into(), "ret".into()])
    }

    fn history() -> SnapshotHistory {
        SnapshotHistory::new(vec!["patchlens".into()])
    }

    #[test]
    fn dedup_keeps_latest_timestamp() {
        let mut history = history();
        history.record(snapshot("mod", "Pawn::Tick", 20));
        history.record(snapshot("mod", "Pawn::Tick", 10));
        history.record(snapshot("mod", "Pawn::Draw", 15));

        let stamps: Vec<i64> = history
            .query(&SnapshotQuery::new())
            .iter()
            .map(|snapshot| snapshot.timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![15, 20]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn equal_timestamps_prefer_later_record() {
        let mut history = history();
        let mut first = snapshot("mod", "Pawn::Tick", 5);
        first.step = Some("first".into());
        let mut second = snapshot("mod", "Pawn::Tick", 5);
        second.step = Some("second".into());
        history.record(first);
        history.record(second);

        let results = history.query(&SnapshotQuery::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].step.as_deref(), Some("second"));
        assert_eq!(
            history.latest("mod", "Pawn::Tick").and_then(|s| s.step.clone()),
            Some("second".into())
        );
    }

    #[test]
    fn filters_compose() {
        let mut history = history();
        history.record(snapshot("patchlens.core", "Pawn::Tick", 1));
        let mut external = snapshot("Other.Mod", "Pawn::Draw", 2);
        external.origin = Some("OtherMod.Patches".into());
        history.record(external);
        history.record(snapshot("Other.Mod", "Map::Update", 3));

        let internal = history.query(&SnapshotQuery::new().owner_class(OwnerClass::Internal));
        assert_eq!(internal.len(), 1);

        let searched = history.query(&SnapshotQuery::new().search("PATCHES"));
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].method, "Pawn::Draw");

        let only_map = |snapshot: &Snapshot| snapshot.method.starts_with("Map::");
        let relevant = history.query(
            &SnapshotQuery::new()
                .owner_class(OwnerClass::External)
                .relevance(&only_map),
        );
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].timestamp_ms, 3);
    }

    #[test]
    fn record_normalizes() {
        let mut history = history();
        let recorded = history.record(snapshot("mod", "Pawn::Tick", 1));
        assert_eq!(recorded.added, 1);
        assert_eq!(recorded.patch_edits.len(), 1);
    }

    #[test]
    fn exports_json_array() {
        let mut history = history();
        history.record(snapshot("mod", "Pawn::Tick", 1));
        let json = history.to_json().expect("export");
        let parsed: Vec<Snapshot> = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].method, "Pawn::Tick");
    }
}
