//! Side-by-side alignment of original and reconstructed source.

use std::collections::BTreeSet;

use patchlens_api::DiffStats;
use serde::{Deserialize, Serialize};

use crate::diff::{align, index_u32, Step};
use crate::reconstruct::Reconstruction;

/// Role of a source diff row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRowKind {
    /// Line present on both sides.
    Context,
    /// Original line with no counterpart in the patched text.
    Removed,
    /// Patched line with no counterpart in the original.
    Added,
    /// Annotation inserted by reconstruction; never matched.
    Synthetic,
}

/// One row of the aligned source view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDiffRow {
    /// Role of the row.
    pub kind: SourceRowKind,
    /// 1-based line in the original text.
    pub left_line: Option<u32>,
    /// Original text, empty when absent.
    pub left: String,
    /// 1-based line in the patched text.
    pub right_line: Option<u32>,
    /// Patched text, empty when absent.
    pub right: String,
}

/// Aligned rows for an original text and its reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDiff {
    rows: Vec<SourceDiffRow>,
}

impl SourceDiff {
    /// All rows, top to bottom.
    #[must_use]
    pub fn rows(&self) -> &[SourceDiffRow] {
        &self.rows
    }

    /// Original and patched columns, always of equal length.
    #[must_use]
    pub fn columns(&self) -> (Vec<String>, Vec<String>) {
        self.rows
            .iter()
            .map(|row| (row.left.clone(), row.right.clone()))
            .unzip()
    }

    /// Added/removed line counts, synthetic rows excluded.
    #[must_use]
    pub fn stats(&self) -> DiffStats {
        self.rows.iter().fold(DiffStats::ZERO, |acc, row| match row.kind {
            SourceRowKind::Added => acc.add(DiffStats::new(1, 0)),
            SourceRowKind::Removed => acc.add(DiffStats::new(0, 1)),
            SourceRowKind::Context | SourceRowKind::Synthetic => acc,
        })
    }
}

/// Align `original` against the reconstructed text.
///
/// Synthetic lines are taken out before alignment and put back as
/// [`SourceRowKind::Synthetic`] rows right before the row of the next real
/// patched line, so the two columns stay in step.
#[must_use]
pub fn align_source(original: &str, reconstruction: &Reconstruction) -> SourceDiff {
    let synthetic: BTreeSet<usize> = reconstruction
        .synthetic_lines
        .iter()
        .filter_map(|&line| usize::try_from(line).ok())
        .collect();
    let patched: Vec<&str> = reconstruction.text.lines().collect();
    let (real, injected): (Vec<(usize, &str)>, Vec<(usize, &str)>) = patched
        .iter()
        .copied()
        .enumerate()
        .partition(|(idx, _)| !synthetic.contains(idx));

    let left: Vec<&str> = original.lines().collect();
    let right: Vec<&str> = real.iter().map(|&(_, text)| text).collect();

    let mut rows = Vec::with_capacity(left.len() + patched.len());
    let mut pending = injected.into_iter().peekable();
    let mut flush_before = |rows: &mut Vec<SourceDiffRow>, limit: usize| {
        while let Some(&(idx, text)) = pending.peek() {
            if idx >= limit {
                break;
            }
            rows.push(SourceDiffRow {
                kind: SourceRowKind::Synthetic,
                left_line: None,
                left: String::new(),
                right_line: Some(line_number(idx)),
                right: text.to_owned(),
            });
            pending.next();
        }
    };

    for step in align(&left, &right) {
        match step {
            Step::Keep { left: l, right: r } => {
                let (idx, text) = real[r];
                flush_before(&mut rows, idx);
                rows.push(SourceDiffRow {
                    kind: SourceRowKind::Context,
                    left_line: Some(line_number(l)),
                    left: left[l].to_owned(),
                    right_line: Some(line_number(idx)),
                    right: text.to_owned(),
                });
            }
            Step::Remove { left: l } => rows.push(SourceDiffRow {
                kind: SourceRowKind::Removed,
                left_line: Some(line_number(l)),
                left: left[l].to_owned(),
                right_line: None,
                right: String::new(),
            }),
            Step::Add { right: r } => {
                let (idx, text) = real[r];
                flush_before(&mut rows, idx);
                rows.push(SourceDiffRow {
                    kind: SourceRowKind::Added,
                    left_line: None,
                    left: String::new(),
                    right_line: Some(line_number(idx)),
                    right: text.to_owned(),
                });
            }
        }
    }
    flush_before(&mut rows, usize::MAX);
    SourceDiff { rows }
}

fn line_number(idx: usize) -> u32 {
    index_u32(idx).saturating_add(1)
}
