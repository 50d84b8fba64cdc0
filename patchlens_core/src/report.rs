//! Plain-text report for one snapshot.
//!
//! The report concatenates the engine outputs: header, warnings, the aligned
//! instruction diff with stack depths, the hunks with their provenance, and
//! optionally a reconstruction.

use std::fmt::Write as _;

use patchlens_api::{DiffLine, DiffLineKind, Snapshot};

use crate::diff::snapshot_diff;
use crate::hunks::resolve_hunks;
use crate::reconstruct::Reconstruction;

/// Render `snapshot` (and its reconstruction, if any) as text.
#[must_use]
pub fn render_snapshot(snapshot: &Snapshot, reconstruction: Option<&Reconstruction>) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_report(&mut out, snapshot, reconstruction);
    out
}

fn write_report(
    out: &mut String,
    snapshot: &Snapshot,
    reconstruction: Option<&Reconstruction>,
) -> std::fmt::Result {
    writeln!(out, "== {} :: {} ==", snapshot.owner, snapshot.method)?;
    if let Some(step) = &snapshot.step {
        writeln!(out, "step: {step}")?;
    }
    if let Some(origin) = &snapshot.origin {
        writeln!(out, "origin: {origin}")?;
    }
    writeln!(
        out,
        "recorded at {} ms, applied in {} us",
        snapshot.timestamp_ms, snapshot.duration_us
    )?;

    let hunks = resolve_hunks(snapshot);
    writeln!(
        out,
        "+{} -{} in {} hunk(s)",
        snapshot.added,
        snapshot.removed,
        hunks.len()
    )?;
    if !snapshot.warnings.is_empty() {
        writeln!(out, "warnings:")?;
        for warning in &snapshot.warnings {
            writeln!(out, "  ! {warning}")?;
        }
    }

    writeln!(out, "\n-- instructions --")?;
    for row in snapshot_diff(snapshot) {
        write_row(out, snapshot, &row)?;
    }

    writeln!(out, "\n-- hunks --")?;
    if hunks.is_empty() {
        writeln!(out, "(no changes)")?;
    }
    for (ordinal, hunk) in hunks.iter().enumerate() {
        let kind = hunk
            .kind
            .or_else(|| hunk.derived_kind())
            .map_or_else(|| "change".to_owned(), |kind| kind.to_string());
        writeln!(
            out,
            "#{} {kind} at before {} / after {}",
            ordinal + 1,
            hunk.before_start,
            hunk.after_start
        )?;
        if let Some(note) = &hunk.note {
            writeln!(out, "  note: {note}")?;
        }
        for removed in &hunk.removed {
            writeln!(out, "  - {removed}")?;
        }
        for added in &hunk.added {
            writeln!(out, "  + {added}")?;
        }
    }

    if let Some(reconstruction) = reconstruction {
        writeln!(out, "\n-- reconstruction --")?;
        writeln!(
            out,
            "applied {} rewrite(s){}",
            reconstruction.applied,
            if reconstruction.used_overlay {
                ", overlay shown"
            } else {
                ""
            }
        )?;
        for summary in &reconstruction.summaries {
            writeln!(out, "  * {summary}")?;
        }
        writeln!(out)?;
        out.push_str(&reconstruction.text);
        if !reconstruction.text.is_empty() && !reconstruction.text.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(())
}

fn write_row(out: &mut String, snapshot: &Snapshot, row: &DiffLine) -> std::fmt::Result {
    let depth = match row.kind {
        DiffLineKind::Deletion => depth_at(snapshot.before_stack_depths.as_deref(), row.left_index),
        DiffLineKind::Context | DiffLineKind::Addition => {
            depth_at(snapshot.stack_depths.as_deref(), row.right_index)
        }
    };
    let (marker, text) = match row.kind {
        DiffLineKind::Deletion => (row.kind.left_marker(), row.left_text.as_str()),
        DiffLineKind::Context | DiffLineKind::Addition => {
            (row.kind.right_marker(), row.right_text.as_str())
        }
    };
    writeln!(
        out,
        "{marker} {:>4} {:>4} {depth:>3} | {text}",
        index_cell(row.left_index),
        index_cell(row.right_index),
    )
}

fn depth_at(depths: Option<&[i32]>, index: Option<u32>) -> String {
    depths
        .zip(index)
        .and_then(|(depths, index)| depths.get(usize::try_from(index).ok()?))
        .map_or_else(|| "-".to_owned(), ToString::to_string)
}

fn index_cell(index: Option<u32>) -> String {
    index.map_or_else(String::new, |index| index.to_string())
}
