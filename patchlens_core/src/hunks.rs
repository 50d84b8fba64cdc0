//! Hunk extraction and snapshot normalization.

use std::borrow::Cow;

use patchlens_api::{DiffLine, DiffLineKind, DiffStats, PatchEdit, Snapshot};
use tracing::{debug, warn};

use crate::diff::{index_u32, snapshot_diff};

/// Collapse contiguous non-matching rows into hunks.
///
/// A hunk opens on the first non-matching row and closes on the next matching
/// row or at the end of the diff. Hunks without any removed or added content
/// are never emitted.
#[must_use]
pub fn extract_hunks(diff: &[DiffLine]) -> Vec<PatchEdit> {
    let mut hunks = Vec::new();
    let mut current: Option<PatchEdit> = None;
    let (mut left_pos, mut right_pos) = (0_usize, 0_usize);

    for row in diff {
        match row.kind {
            DiffLineKind::Context => {
                close(&mut current, &mut hunks);
                left_pos += 1;
                right_pos += 1;
            }
            DiffLineKind::Deletion => {
                open(&mut current, left_pos, right_pos)
                    .removed
                    .push(row.left_text.clone());
                left_pos += 1;
            }
            DiffLineKind::Addition => {
                open(&mut current, left_pos, right_pos)
                    .added
                    .push(row.right_text.clone());
                right_pos += 1;
            }
        }
    }
    close(&mut current, &mut hunks);
    hunks
}

fn open(current: &mut Option<PatchEdit>, left_pos: usize, right_pos: usize) -> &mut PatchEdit {
    current.get_or_insert_with(|| PatchEdit {
        before_start: index_u32(left_pos),
        after_start: index_u32(right_pos),
        removed: Vec::new(),
        added: Vec::new(),
        kind: None,
        note: None,
    })
}

fn close(current: &mut Option<PatchEdit>, hunks: &mut Vec<PatchEdit>) {
    if let Some(mut hunk) = current.take() {
        if hunk.is_empty() {
            return;
        }
        hunk.kind = hunk.derived_kind();
        hunks.push(hunk);
    }
}

/// Hunks of a snapshot: the stored ones, or a fresh extraction when the
/// snapshot carries none.
#[must_use]
pub fn resolve_hunks(snapshot: &Snapshot) -> Cow<'_, [PatchEdit]> {
    if snapshot.patch_edits.is_empty() {
        debug!(method = %snapshot.method, "no stored hunks, extracting from instruction diff");
        Cow::Owned(extract_hunks(&snapshot_diff(snapshot)))
    } else {
        Cow::Borrowed(&snapshot.patch_edits)
    }
}

/// Sum of the hunk stats.
#[must_use]
pub fn total_stats(hunks: &[PatchEdit]) -> DiffStats {
    hunks
        .iter()
        .fold(DiffStats::ZERO, |acc, hunk| acc.add(hunk.stats()))
}

/// Enforce the snapshot invariants before it enters the history.
///
/// - stack-depth arrays whose length differs from their instruction list are
///   dropped, with a warning appended
/// - supplied hunks that are empty are discarded; unordered or overlapping
///   supplied hunks are replaced by extracted ones
/// - missing hunks are extracted from the instruction diff
/// - summary counts are recomputed from the hunks
#[must_use]
pub fn normalize_snapshot(mut snapshot: Snapshot) -> Snapshot {
    if let Some(message) = depth_mismatch(
        "before",
        snapshot.before_stack_depths.as_deref(),
        snapshot.before_instructions.len(),
    ) {
        snapshot.before_stack_depths = None;
        snapshot.warnings.push(message);
    }
    if let Some(message) = depth_mismatch(
        "after",
        snapshot.stack_depths.as_deref(),
        snapshot.instructions.len(),
    ) {
        snapshot.stack_depths = None;
        snapshot.warnings.push(message);
    }

    snapshot.patch_edits.retain(|hunk| !hunk.is_empty());
    if !is_ordered(&snapshot.patch_edits) {
        warn!(method = %snapshot.method, "supplied hunks overlap or are unordered, re-extracting");
        snapshot
            .warnings
            .push("supplied hunks overlapped and were re-extracted from the diff".to_owned());
        snapshot.patch_edits.clear();
    }
    if snapshot.patch_edits.is_empty() {
        snapshot.patch_edits = extract_hunks(&snapshot_diff(&snapshot));
    }
    for hunk in &mut snapshot.patch_edits {
        if hunk.kind.is_none() {
            hunk.kind = hunk.derived_kind();
        }
    }

    let stats = total_stats(&snapshot.patch_edits);
    snapshot.added = stats.additions;
    snapshot.removed = stats.deletions;
    snapshot
}

fn depth_mismatch(side: &str, depths: Option<&[i32]>, expected: usize) -> Option<String> {
    let depths = depths?;
    if depths.len() == expected {
        return None;
    }
    warn!(side, found = depths.len(), expected, "dropping stack depths");
    Some(format!(
        "{side} stack depths dropped: {} entries for {expected} instructions",
        depths.len()
    ))
}

fn is_ordered(hunks: &[PatchEdit]) -> bool {
    hunks.windows(2).all(|pair| match pair {
        [first, second] => {
            first.before_range().end <= second.before_start
                && first.before_start < second.before_start
                && first.after_start < second.after_start
        }
        _ => true,
    })
}

#[cfg(test)]
mod tests {
    use patchlens_api::EditKind;

    use super::*;
    use crate::diff::diff_lines;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| (*item).to_owned()).collect()
    }

    #[test]
    fn pure_insertion_yields_one_hunk() {
        let before = tokens(&["ldarg.0", "call Foo::get_X", "ret"]);
        let after = tokens(&["ldarg.0", "call Foo::get_X", "call Bar::get_Y", "ret"]);
        let hunks = extract_hunks(&diff_lines(&before, &after));

        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert!(hunk.removed.is_empty());
        assert_eq!(hunk.added, tokens(&["call Bar::get_Y"]));
        assert_eq!(hunk.before_start, 2);
        assert_eq!(hunk.after_start, 2);
        assert_eq!(hunk.kind, Some(EditKind::Insert));
    }

    #[test]
    fn separated_changes_produce_separate_hunks() {
        let before = tokens(&["a", "b", "c", "d", "e"]);
        let after = tokens(&["a", "B", "c", "d", "E", "f"]);
        let hunks = extract_hunks(&diff_lines(&before, &after));

        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].removed, tokens(&["b"]));
        assert_eq!(hunks[0].added, tokens(&["B"]));
        assert_eq!(hunks[0].before_start, 1);
        assert_eq!(hunks[1].removed, tokens(&["e"]));
        assert_eq!(hunks[1].added, tokens(&["E", "f"]));
        assert_eq!(hunks[1].before_start, 4);
        assert_eq!(hunks[1].after_start, 4);
    }

    #[test]
    fn identical_input_has_no_hunks() {
        let seq = tokens(&["nop", "ret"]);
        assert!(extract_hunks(&diff_lines(&seq, &seq)).is_empty());
    }

    #[test]
    fn resolve_prefers_stored_hunks() {
        let mut snapshot = Snapshot::new(
            "mod",
            "Foo::Bar",
            1,
            tokens(&["a"]),
            tokens(&["b"]),
        );
        assert_eq!(resolve_hunks(&snapshot).len(), 1);
        assert!(matches!(resolve_hunks(&snapshot), Cow::Owned(_)));

        let mut stored = PatchEdit::new(0, 0, tokens(&["a"]), tokens(&["b"]));
        stored.note = Some("from instrumentation".into());
        snapshot.patch_edits = vec![stored];
        let resolved = resolve_hunks(&snapshot);
        assert!(matches!(resolved, Cow::Borrowed(_)));
        assert_eq!(resolved[0].note.as_deref(), Some("from instrumentation"));
    }

    #[test]
    fn normalize_drops_mismatched_depths_and_counts() {
        let mut snapshot = Snapshot::new(
            "mod",
            "Foo::Bar",
            1,
            tokens(&["ldarg.0", "ret"]),
            tokens(&["ldarg.0", "pop", "ret"]),
        );
        snapshot.before_stack_depths = Some(vec![1, 0]);
        snapshot.stack_depths = Some(vec![1]);

        let snapshot = normalize_snapshot(snapshot);
        assert_eq!(snapshot.before_stack_depths, Some(vec![1, 0]));
        assert!(snapshot.stack_depths.is_none());
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].contains("after stack depths dropped"));
        assert_eq!(snapshot.patch_edits.len(), 1);
        assert_eq!(snapshot.added, 1);
        assert_eq!(snapshot.removed, 0);
    }

    #[test]
    fn normalize_keeps_provenance_and_fills_kind() {
        let mut snapshot = Snapshot::new("mod", "Foo::Bar", 1, tokens(&["a"]), tokens(&["b"]));
        let mut supplied = PatchEdit::new(0, 0, tokens(&["a"]), tokens(&["b"]));
        supplied.kind = None;
        supplied.note = Some("prefix replaced body".into());
        snapshot.patch_edits = vec![supplied, PatchEdit::new(1, 1, Vec::new(), Vec::new())];

        let snapshot = normalize_snapshot(snapshot);
        assert_eq!(snapshot.patch_edits.len(), 1);
        assert_eq!(snapshot.patch_edits[0].kind, Some(EditKind::Replace));
        assert_eq!(
            snapshot.patch_edits[0].note.as_deref(),
            Some("prefix replaced body")
        );
        assert_eq!(snapshot.stats(), DiffStats::new(1, 1));
    }

    #[test]
    fn normalize_replaces_overlapping_hunks() {
        let mut snapshot = Snapshot::new(
            "mod",
            "Foo::Bar",
            1,
            tokens(&["a", "b", "c"]),
            tokens(&["x", "b", "y"]),
        );
        snapshot.patch_edits = vec![
            PatchEdit::new(0, 0, tokens(&["a", "b"]), tokens(&["x"])),
            PatchEdit::new(1, 1, tokens(&["b"]), tokens(&["y"])),
        ];
        let snapshot = normalize_snapshot(snapshot);
        assert_eq!(snapshot.patch_edits.len(), 2);
        assert_eq!(snapshot.patch_edits[1].before_start, 2);
        assert!(snapshot
            .warnings
            .iter()
            .any(|warning| warning.contains("re-extracted")));
    }
}
