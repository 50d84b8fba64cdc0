//! Comment block listing instruction-level changes that could not be mapped.

use crate::config::OverlayLimits;
use crate::reconstruct::SourcePreviewHunk;

const PREFIX: &str = "// patchlens";

/// Overlay lines (without indentation or line endings) for `hunks`.
pub(crate) fn render(hunks: &[&SourcePreviewHunk], limits: OverlayLimits) -> Vec<String> {
    let mut lines = vec![format!(
        "{PREFIX} overlay: {} change(s) not mapped to source",
        hunks.len()
    )];
    for (ordinal, hunk) in hunks.iter().take(limits.max_hunks).enumerate() {
        let kind = hunk
            .kind
            .map_or_else(|| "change".to_owned(), |kind| kind.to_string());
        lines.push(format!(
            "// hunk {} ({kind}) at instruction {} -> {}",
            ordinal + 1,
            hunk.before_start,
            hunk.after_start
        ));
        if let Some(note) = &hunk.note {
            lines.push(format!("//   note: {}", clip(note, limits.max_line_len)));
        }
        push_side(&mut lines, '-', &hunk.removed, limits);
        push_side(&mut lines, '+', &hunk.added, limits);
    }
    if hunks.len() > limits.max_hunks {
        lines.push(format!(
            "// ... {} more hunk(s) omitted",
            hunks.len() - limits.max_hunks
        ));
    }
    lines.push(format!("{PREFIX} overlay end"));
    lines
}

fn push_side(lines: &mut Vec<String>, marker: char, items: &[String], limits: OverlayLimits) {
    for item in items.iter().take(limits.max_lines_per_side) {
        lines.push(format!("//   {marker} {}", clip(item, limits.max_line_len)));
    }
    if items.len() > limits.max_lines_per_side {
        lines.push(format!(
            "//   {marker} ... {} more",
            items.len() - limits.max_lines_per_side
        ));
    }
}

/// Cap `text` at `max` characters, marking the cut with `...`.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
