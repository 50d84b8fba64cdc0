//! Longest-common-subsequence alignment shared by the instruction diff and
//! the source-line diff.
//!
//! The alignment knows nothing about lines or instructions beyond equality
//! and ordering of tokens. Ties in the backtrack advance the side holding the
//! smaller token, which makes `align(b, a)` the exact mirror of `align(a, b)`.

use patchlens_api::{DiffLine, Snapshot};

/// One step of an alignment between two sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Token present on both sides.
    Keep {
        /// Index into the left sequence.
        left: usize,
        /// Index into the right sequence.
        right: usize,
    },
    /// Token only present on the left side.
    Remove {
        /// Index into the left sequence.
        left: usize,
    },
    /// Token only present on the right side.
    Add {
        /// Index into the right sequence.
        right: usize,
    },
}

/// Align two sequences.
///
/// Every element of both inputs appears in exactly one step, in original
/// relative order. Inside each run of non-matching steps removals come
/// before additions. Runs in `O(|left| * |right|)` time and space.
pub fn align<T: Ord>(left: &[T], right: &[T]) -> Vec<Step> {
    let rows = left.len();
    let cols = right.len();
    let width = cols + 1;

    // table[i * width + j] = LCS length of left[i..] and right[j..]
    let mut table = vec![0_usize; (rows + 1) * width];
    for i in (0..rows).rev() {
        for j in (0..cols).rev() {
            table[i * width + j] = if left[i] == right[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut steps = Vec::with_capacity(rows + cols);
    let mut pending = PendingRun::default();
    let (mut i, mut j) = (0, 0);
    while i < rows || j < cols {
        if i < rows && j < cols && left[i] == right[j] {
            pending.flush(&mut steps);
            steps.push(Step::Keep { left: i, right: j });
            i += 1;
            j += 1;
        } else if j >= cols {
            pending.removed.push(i);
            i += 1;
        } else if i >= rows {
            pending.added.push(j);
            j += 1;
        } else {
            let down = table[(i + 1) * width + j];
            let across = table[i * width + j + 1];
            if down > across || (down == across && left[i] < right[j]) {
                pending.removed.push(i);
                i += 1;
            } else {
                pending.added.push(j);
                j += 1;
            }
        }
    }
    pending.flush(&mut steps);
    steps
}

#[derive(Default)]
struct PendingRun {
    removed: Vec<usize>,
    added: Vec<usize>,
}

impl PendingRun {
    fn flush(&mut self, steps: &mut Vec<Step>) {
        steps.extend(self.removed.drain(..).map(|left| Step::Remove { left }));
        steps.extend(self.added.drain(..).map(|right| Step::Add { right }));
    }
}

/// Align two text sequences into display rows.
pub fn diff_lines<S>(left: &[S], right: &[S]) -> Vec<DiffLine>
where
    S: AsRef<str> + Ord,
{
    align(left, right)
        .into_iter()
        .map(|step| match step {
            Step::Keep { left: l, right: r } => {
                DiffLine::context(index_u32(l), index_u32(r), left[l].as_ref())
            }
            Step::Remove { left: l } => DiffLine::deletion(index_u32(l), left[l].as_ref()),
            Step::Add { right: r } => DiffLine::addition(index_u32(r), right[r].as_ref()),
        })
        .collect()
}

/// Instruction diff of a snapshot, before against after.
#[must_use]
pub fn snapshot_diff(snapshot: &Snapshot) -> Vec<DiffLine> {
    diff_lines(&snapshot.before_instructions, &snapshot.instructions)
}

pub(crate) fn index_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use patchlens_api::DiffLineKind;

    use super::*;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| (*item).to_owned()).collect()
    }

    #[test]
    fn empty_left_is_all_additions() {
        let rows = diff_lines(&[] as &[String], &tokens(&["a", "b"]));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.kind == DiffLineKind::Addition));
        assert_eq!(rows[1].right_index, Some(1));
    }

    #[test]
    fn empty_right_is_all_deletions() {
        let rows = diff_lines(&tokens(&["a", "b"]), &[] as &[String]);
        assert!(rows.iter().all(|row| row.kind == DiffLineKind::Deletion));
    }

    #[test]
    fn identical_sequences_match_everywhere() {
        let seq = tokens(&["ldarg.0", "call Foo::get_X", "ret"]);
        let rows = diff_lines(&seq, &seq);
        assert!(rows.iter().all(DiffLine::is_matched));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn insertion_lands_between_context_rows() {
        let before = tokens(&["ldarg.0", "call Foo::get_X", "ret"]);
        let after = tokens(&["ldarg.0", "call Foo::get_X", "call Bar::get_Y", "ret"]);
        let rows = diff_lines(&before, &after);
        let kinds: Vec<_> = rows.iter().map(|row| row.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiffLineKind::Context,
                DiffLineKind::Context,
                DiffLineKind::Addition,
                DiffLineKind::Context,
            ]
        );
        assert_eq!(rows[2].right_text, "call Bar::get_Y");
        assert_eq!(rows[3].left_index, Some(2));
        assert_eq!(rows[3].right_index, Some(3));
    }

    #[test]
    fn removals_precede_additions_within_a_run() {
        let steps = align(&["a", "x", "c"], &["a", "y", "z", "c"]);
        assert_eq!(
            steps,
            vec![
                Step::Keep { left: 0, right: 0 },
                Step::Remove { left: 1 },
                Step::Add { right: 1 },
                Step::Add { right: 2 },
                Step::Keep { left: 2, right: 3 },
            ]
        );
    }

    #[test]
    fn swapped_inputs_mirror_the_alignment() {
        let a = ["c", "a"];
        let b = ["a", "b", "a", "a"];
        let forward = align(&a, &b);
        let backward = align(&b, &a);
        let mirrored: Vec<Step> = backward
            .into_iter()
            .map(|step| match step {
                Step::Keep { left, right } => Step::Keep {
                    left: right,
                    right: left,
                },
                Step::Remove { left } => Step::Add { right: left },
                Step::Add { right } => Step::Remove { left: right },
            })
            .collect();
        let keeps = |steps: &[Step]| {
            steps
                .iter()
                .filter(|step| matches!(step, Step::Keep { .. }))
                .copied()
                .collect::<Vec<_>>()
        };
        assert_eq!(keeps(&forward), keeps(&mirrored));
    }
}
