//! Heuristic reconstruction of patched source text.
//!
//! Instruction-level hunks are turned into `(candidate, anchor)` pairs by the
//! rule pipeline in [`rules`]. Each pair is located in the target method body
//! and applied only when the match is unambiguous (or resolved by the
//! occurrence counter / literal best guess). Hunks that cannot be mapped are
//! listed in a comment overlay, and when the method body itself cannot be
//! located nothing is rewritten at all. The engine never fails: internal faults fall
//! back to the original text plus an explanatory summary.

mod overlay;
mod rules;
mod source_diff;

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use patchlens_api::{EditKind, MethodRef, PatchEdit, Snapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{EngineConfig, OverlayLimits};
use crate::hunks::resolve_hunks;
use crate::scan::{is_ident_byte, is_word_boundary, line_of, Lexed};
use crate::Result;

use self::rules::{Anchor, AnchorClass, Candidate, RuleSet};
pub use self::source_diff::{align_source, SourceDiff, SourceDiffRow, SourceRowKind};

/// Anchor names too generic to rewrite safely.
const DENIED_ANCHORS: &[&str] = &[
    "Instance",
    "Current",
    "Value",
    "Item",
    "Count",
    "Length",
    "Key",
    "Invoke",
    "ToString",
    "GetType",
    "Equals",
    "GetHashCode",
    "Dispose",
    "this",
    "base",
];

const ANNOTATION: &str = "// patchlens:";

/// Hunk as seen by the reconstruction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePreviewHunk {
    /// 0-based before-side index of the hunk.
    pub before_start: u32,
    /// 0-based after-side index of the hunk.
    pub after_start: u32,
    /// Removed instruction texts.
    pub removed: Vec<String>,
    /// Added instruction texts.
    pub added: Vec<String>,
    /// Before-side instructions starting at `before_start`, probed for
    /// anchors when nothing was removed.
    pub probe: Vec<String>,
    /// Before-side instruction right before the hunk, used to place the overlay.
    pub preceding: Option<String>,
    /// Kind tag carried over from the hunk.
    pub kind: Option<EditKind>,
    /// Provenance note carried over from the hunk.
    pub note: Option<String>,
}

impl SourcePreviewHunk {
    /// Working copy of `edit` with a forward window of `probe_window`
    /// before-side instructions.
    #[must_use]
    pub fn from_edit(edit: &PatchEdit, before: &[String], probe_window: usize) -> Self {
        let start = usize::try_from(edit.before_start).unwrap_or(usize::MAX);
        let probe = before
            .iter()
            .skip(start)
            .take(probe_window)
            .cloned()
            .collect();
        let preceding = start
            .checked_sub(1)
            .and_then(|idx| before.get(idx))
            .cloned();
        Self {
            before_start: edit.before_start,
            after_start: edit.after_start,
            removed: edit.removed.clone(),
            added: edit.added.clone(),
            probe,
            preceding,
            kind: edit.kind.or_else(|| edit.derived_kind()),
            note: edit.note.clone(),
        }
    }

    fn anchor_source(&self) -> &[String] {
        if self.removed.is_empty() {
            &self.probe
        } else {
            &self.removed
        }
    }
}

/// Result of a reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconstruction {
    /// Rewritten text including annotation and overlay lines.
    pub text: String,
    /// Number of rewrites applied.
    pub applied: u32,
    /// Human-readable decisions, in evaluation order.
    pub summaries: Vec<String>,
    /// 0-based indices of the lines inserted by reconstruction.
    pub synthetic_lines: Vec<u32>,
    /// Whether an overlay block was emitted.
    pub used_overlay: bool,
}

/// Rule-driven source rewriter.
#[derive(Debug)]
pub struct Reconstructor {
    rules: RuleSet,
    deny: BTreeSet<String>,
    literal_guess_limit: usize,
    probe_window: usize,
    overlay: OverlayLimits,
}

impl Reconstructor {
    /// Build a reconstructor from the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if a built-in rule fails to compile.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let deny = DENIED_ANCHORS
            .iter()
            .map(|name| (*name).to_owned())
            .chain(config.deny_list.iter().cloned())
            .collect();
        Ok(Self {
            rules: RuleSet::builtin()?,
            deny,
            literal_guess_limit: config.literal_guess_limit,
            probe_window: config.probe_window,
            overlay: config.overlay,
        })
    }

    /// Reconstruction working set for a snapshot.
    #[must_use]
    pub fn preview_hunks(&self, snapshot: &Snapshot) -> Vec<SourcePreviewHunk> {
        resolve_hunks(snapshot)
            .iter()
            .map(|edit| {
                SourcePreviewHunk::from_edit(edit, &snapshot.before_instructions, self.probe_window)
            })
            .collect()
    }

    /// Reconstruct the patched view of `snapshot`'s method.
    #[must_use]
    pub fn reconstruct_snapshot(&self, snapshot: &Snapshot, source: Option<&str>) -> Reconstruction {
        self.reconstruct(source, &self.preview_hunks(snapshot), &snapshot.method)
    }

    /// Rewrite `source` for `hunks` of `method`.
    ///
    /// With no source the overlay block alone is returned. Output is a pure
    /// function of the inputs.
    #[must_use]
    pub fn reconstruct(
        &self,
        source: Option<&str>,
        hunks: &[SourcePreviewHunk],
        method: &str,
    ) -> Reconstruction {
        let Some(source) = source else {
            return self.overlay_only(hunks);
        };
        if hunks.is_empty() {
            return unchanged(source, "no instruction changes to reconstruct".to_owned());
        }
        match self.try_reconstruct(source, hunks, method) {
            Ok(result) => result,
            Err(err) => {
                warn!(method, error = %err, "reconstruction failed, keeping original source");
                unchanged(
                    source,
                    format!("reconstruction failed, showing original source: {err}"),
                )
            }
        }
    }

    fn overlay_only(&self, hunks: &[SourcePreviewHunk]) -> Reconstruction {
        let mut summaries = vec!["no source available; showing instruction changes only".to_owned()];
        if hunks.is_empty() {
            summaries.push("no instruction changes to reconstruct".to_owned());
            return Reconstruction {
                text: String::new(),
                applied: 0,
                summaries,
                synthetic_lines: Vec::new(),
                used_overlay: false,
            };
        }
        let all: Vec<&SourcePreviewHunk> = hunks.iter().collect();
        let lines = overlay::render(&all, self.overlay);
        let mut text = String::new();
        for line in &lines {
            text.push_str(line);
            text.push('\n');
        }
        Reconstruction {
            text,
            applied: 0,
            summaries,
            synthetic_lines: (0..lines.len()).map(crate::diff::index_u32).collect(),
            used_overlay: true,
        }
    }

    /// Original text with every hunk listed in an overlay at the top. Used
    /// when the target method cannot be located, so nothing is rewritten.
    fn overlay_on_top(
        &self,
        source: &str,
        hunks: &[SourcePreviewHunk],
        method: &str,
    ) -> Reconstruction {
        let all: Vec<&SourcePreviewHunk> = hunks.iter().collect();
        let insertion = Insertion {
            line: 0,
            order: 0,
            lines: overlay::render(&all, self.overlay),
        };
        let (text, synthetic_lines) = assemble(source, vec![insertion]);
        Reconstruction {
            text,
            applied: 0,
            summaries: vec![
                format!("method body for `{method}` not found; no rewrites applied"),
                format!("{0} of {0} hunk(s) listed in the overlay block", hunks.len()),
            ],
            synthetic_lines,
            used_overlay: true,
        }
    }

    fn try_reconstruct(
        &self,
        source: &str,
        hunks: &[SourcePreviewHunk],
        method: &str,
    ) -> Result<Reconstruction> {
        let lexed = Lexed::new(source);
        let scope = MethodRef::parse(method).and_then(|target| lexed.body_of(&target));
        let Some(scope) = scope else {
            debug!(method, "method body not found, refusing to rewrite");
            return Ok(self.overlay_on_top(source, hunks, method));
        };
        let mut summaries = Vec::new();

        let plans: Vec<Vec<(Candidate, Anchor)>> =
            hunks.iter().map(|hunk| self.pairs_for(hunk)).collect();
        let mut frequency: HashMap<(&str, &str), usize> = HashMap::new();
        for plan in &plans {
            let keys: BTreeSet<(&str, &str)> = plan
                .iter()
                .map(|(candidate, anchor)| (candidate.expr.as_str(), anchor.token.as_str()))
                .collect();
            for key in keys {
                *frequency.entry(key).or_default() += 1;
            }
        }

        let mut pass = Pass {
            lexed: &lexed,
            scope: scope.clone(),
            matches: HashMap::new(),
            counters: HashMap::new(),
            edits: Vec::new(),
            notes: Vec::new(),
        };
        let mut resolved = vec![false; hunks.len()];

        for (hunk_idx, plan) in plans.iter().enumerate() {
            let mut used_anchors: BTreeSet<&str> = BTreeSet::new();
            let mut used_candidates: BTreeSet<&str> = BTreeSet::new();
            let mut denied: BTreeSet<&str> = BTreeSet::new();

            for (candidate, anchor) in plan {
                if used_anchors.contains(anchor.token.as_str())
                    || used_candidates.contains(candidate.expr.as_str())
                {
                    continue;
                }
                if self.deny.contains(&anchor.token) {
                    if denied.insert(anchor.token.as_str()) {
                        summaries.push(format!(
                            "left `{}` unchanged: anchor is on the deny list",
                            anchor.token
                        ));
                    }
                    continue;
                }
                let key = (candidate.expr.as_str(), anchor.token.as_str());
                let repeated = frequency.get(&key).copied().unwrap_or(0) >= 2;
                match pass.decide(candidate, anchor, repeated, self.literal_guess_limit)? {
                    Decision::Applied(summary) => {
                        summaries.push(summary);
                        resolved[hunk_idx] = true;
                        used_anchors.insert(anchor.token.as_str());
                        used_candidates.insert(candidate.expr.as_str());
                    }
                    Decision::Skipped(summary) => summaries.push(summary),
                }
            }
        }

        let applied = u32::try_from(pass.edits.len()).unwrap_or(u32::MAX);
        let unresolved: Vec<&SourcePreviewHunk> = hunks
            .iter()
            .zip(&resolved)
            .filter(|(_, resolved)| !**resolved)
            .map(|(hunk, _)| hunk)
            .collect();

        let Pass { edits, notes, .. } = pass;
        let mut edits = edits;
        edits.sort_by_key(|edit| edit.range.start);
        let (rewritten, shifts) = apply_edits(source, &edits);
        let shift = |offset: usize| shifted(offset, &shifts);

        let mut insertions: Vec<Insertion> = Vec::new();
        if !unresolved.is_empty() {
            let anchor_offset = edits
                .first()
                .map(|edit| edit.range.start)
                .or_else(|| placement_anchor(&lexed, &scope, &unresolved, &self.rules))
                .unwrap_or_else(|| first_code_offset(source, &scope));
            insertions.push(Insertion {
                line: line_of(&rewritten, shift(anchor_offset)),
                order: 0,
                lines: overlay::render(&unresolved, self.overlay),
            });
            summaries.push(format!(
                "{} of {} hunk(s) listed in the overlay block",
                unresolved.len(),
                hunks.len()
            ));
        }
        for edit in &edits {
            insertions.push(Insertion {
                line: line_of(&rewritten, shift(edit.range.start)),
                order: 1,
                lines: vec![format!(
                    "{ANNOTATION} rewrote `{}` -> `{}`",
                    collapse(&source[edit.range.clone()]),
                    collapse(&edit.text)
                )],
            });
        }
        for note in notes {
            insertions.push(Insertion {
                line: line_of(&rewritten, shift(note.offset)),
                order: 2,
                lines: vec![format!("{ANNOTATION} {}", note.text)],
            });
        }
        insertions.sort_by_key(|insertion| (insertion.line, insertion.order));

        let (text, synthetic_lines) = assemble(&rewritten, insertions);
        debug!(method, applied, hunks = hunks.len(), "reconstructed source");
        Ok(Reconstruction {
            text,
            applied,
            summaries,
            synthetic_lines,
            used_overlay: !unresolved.is_empty(),
        })
    }

    /// Candidate/anchor pairs for one hunk, in deterministic order.
    ///
    /// Equal-length candidate and anchor lists are paired positionally,
    /// otherwise every combination is tried. Literal candidates only pair
    /// with literal anchors.
    fn pairs_for(&self, hunk: &SourcePreviewHunk) -> Vec<(Candidate, Anchor)> {
        let candidates = dedup(
            hunk.added
                .iter()
                .filter_map(|instruction| self.rules.classify(instruction))
                .map(|operand| operand.candidate()),
        );
        let anchors = dedup(
            hunk.anchor_source()
                .iter()
                .filter_map(|instruction| self.rules.classify(instruction))
                .filter_map(|operand| operand.anchor()),
        );

        let combined: Vec<(Candidate, Anchor)> = if candidates.len() == anchors.len() {
            candidates.into_iter().zip(anchors).collect()
        } else {
            candidates
                .iter()
                .flat_map(|candidate| {
                    anchors
                        .iter()
                        .map(move |anchor| (candidate.clone(), anchor.clone()))
                })
                .collect()
        };
        combined
            .into_iter()
            .filter(|(candidate, anchor)| {
                candidate.literal == (anchor.class == AnchorClass::Literal)
                    && candidate.expr != anchor.token
            })
            .collect()
    }
}

fn unchanged(source: &str, summary: String) -> Reconstruction {
    Reconstruction {
        text: source.to_owned(),
        applied: 0,
        summaries: vec![summary],
        synthetic_lines: Vec::new(),
        used_overlay: false,
    }
}

fn dedup<T: PartialEq>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Found {
    range: Range<usize>,
    args: Option<Range<usize>>,
}

#[derive(Debug, Default)]
struct MatchSet {
    found: Vec<Found>,
    in_comments: usize,
}

#[derive(Debug)]
struct Edit {
    range: Range<usize>,
    text: String,
}

#[derive(Debug, PartialEq, Eq)]
struct Note {
    offset: usize,
    text: String,
}

enum Decision {
    Applied(String),
    Skipped(String),
}

/// Per-call matching state. Counters are reset on every reconstruction.
struct Pass<'a, 'src> {
    lexed: &'a Lexed<'src>,
    scope: Range<usize>,
    matches: HashMap<(String, AnchorClass), MatchSet>,
    counters: HashMap<(String, String), usize>,
    edits: Vec<Edit>,
    notes: Vec<Note>,
}

impl Pass<'_, '_> {
    fn decide(
        &mut self,
        candidate: &Candidate,
        anchor: &Anchor,
        repeated: bool,
        literal_guess_limit: usize,
    ) -> Result<Decision> {
        let cache_key = (anchor.token.clone(), anchor.class);
        if !self.matches.contains_key(&cache_key) {
            let found = find_matches(self.lexed, &self.scope, anchor)?;
            self.matches.insert(cache_key.clone(), found);
        }
        let Some(set) = self.matches.get(&cache_key) else {
            return Ok(Decision::Skipped(format!("`{}` could not be searched", anchor.token)));
        };
        let total = set.found.len();

        let ordinal = if repeated {
            let counter = self
                .counters
                .entry((candidate.expr.clone(), anchor.token.clone()))
                .or_default();
            let current = *counter;
            *counter += 1;
            Some(current)
        } else {
            None
        };

        let (pick, reason) = match total {
            0 if set.in_comments > 0 => {
                return Ok(Decision::Skipped(format!(
                    "`{}` only appears inside comments; `{}` not applied",
                    anchor.token, candidate.expr
                )))
            }
            0 => {
                return Ok(Decision::Skipped(format!(
                    "`{}` not found in the method body; `{}` not applied",
                    anchor.token, candidate.expr
                )))
            }
            1 => (0, String::new()),
            _ => match ordinal.filter(|&ordinal| ordinal < total) {
                Some(ordinal) => (ordinal, format!(" (occurrence {} of {total})", ordinal + 1)),
                None if anchor.class == AnchorClass::Literal && total <= literal_guess_limit => {
                    (0, format!(" (best guess: first of {total} matches)"))
                }
                None => {
                    let note = Note {
                        offset: set.found[0].range.start,
                        text: format!(
                            "`{}` is ambiguous ({total} matches); `{}` not applied",
                            anchor.token, candidate.expr
                        ),
                    };
                    if !self.notes.contains(&note) {
                        self.notes.push(note);
                    }
                    return Ok(Decision::Skipped(format!(
                        "`{}` matched {total} times; `{}` left unchanged (ambiguous)",
                        anchor.token, candidate.expr
                    )));
                }
            },
        };

        let found = set.found[pick].clone();
        let text = self.lexed.text();
        if self
            .edits
            .iter()
            .any(|edit| edit.range.start < found.range.end && found.range.start < edit.range.end)
        {
            return Ok(Decision::Skipped(format!(
                "skipped `{}`: target overlaps an earlier rewrite",
                candidate.expr
            )));
        }
        let replacement = candidate.render(found.args.clone().map(|args| &text[args]));
        let summary = format!(
            "rewrote `{}` -> `{replacement}` at line {}{reason}",
            collapse(&text[found.range.clone()]),
            line_of(text, found.range.start) + 1
        );
        self.edits.push(Edit {
            range: found.range,
            text: replacement,
        });
        Ok(Decision::Applied(summary))
    }
}

/// Locate `anchor` in code within `scope`.
fn find_matches(lexed: &Lexed<'_>, scope: &Range<usize>, anchor: &Anchor) -> Result<MatchSet> {
    let text = lexed.text();
    let bytes = text.as_bytes();
    let window = &text[scope.clone()];
    let mut set = MatchSet::default();
    let token = regex::escape(&anchor.token);

    match anchor.class {
        AnchorClass::Member => {
            let pattern = regex::Regex::new(&format!(r"(?:[A-Za-z_]\w*\s*\.\s*)*\b{token}\b"))?;
            for found in pattern.find_iter(window) {
                let range = scope.start + found.start()..scope.start + found.end();
                if !classify_start(lexed, range.start, &mut set) {
                    continue;
                }
                let next = bytes[range.end..]
                    .iter()
                    .find(|byte| !byte.is_ascii_whitespace());
                if next == Some(&b'(') {
                    continue;
                }
                set.found.push(Found { range, args: None });
            }
        }
        AnchorClass::Call => {
            let pattern = regex::Regex::new(&format!(r"(?:[A-Za-z_]\w*\s*\.\s*)*\b{token}\s*\("))?;
            for found in pattern.find_iter(window) {
                let start = scope.start + found.start();
                if !classify_start(lexed, start, &mut set) {
                    continue;
                }
                let open = scope.start + found.end() - 1;
                let Some(close) = lexed.matching_close(open).filter(|&close| close <= scope.end)
                else {
                    continue;
                };
                set.found.push(Found {
                    range: start..close,
                    args: Some(open + 1..close - 1),
                });
            }
        }
        AnchorClass::Literal => {
            let numeric = !anchor.token.starts_with('"');
            for (offset, _) in window.match_indices(anchor.token.as_str()) {
                let start = scope.start + offset;
                let end = start + anchor.token.len();
                if numeric {
                    let boundary = |byte: Option<&u8>| {
                        byte.map_or(true, |&byte| !is_ident_byte(byte) && byte != b'.')
                    };
                    // the type suffix stays outside the rewritten range
                    let suffix = numeric_suffix(&bytes[end..]);
                    if !boundary(start.checked_sub(1).and_then(|at| bytes.get(at)))
                        || !boundary(bytes.get(end + suffix))
                    {
                        continue;
                    }
                    if !classify_start(lexed, start, &mut set) {
                        continue;
                    }
                } else if lexed.class_at(start) == crate::scan::Class::Comment {
                    set.in_comments += 1;
                    continue;
                }
                set.found.push(Found {
                    range: start..end,
                    args: None,
                });
            }
        }
    }
    Ok(set)
}

/// Length of a C# numeric type suffix (`f`, `d`, `m`, `u`, `l`, `ul`, `lu`)
/// at the start of `rest`.
fn numeric_suffix(rest: &[u8]) -> usize {
    match rest {
        [b'u' | b'U', b'l' | b'L', ..] | [b'l' | b'L', b'u' | b'U', ..] => 2,
        [b'f' | b'F' | b'd' | b'D' | b'm' | b'M' | b'u' | b'U' | b'l' | b'L', ..] => 1,
        _ => 0,
    }
}

/// `true` when a match starting at `start` is in code; counts comment hits.
fn classify_start(lexed: &Lexed<'_>, start: usize, set: &mut MatchSet) -> bool {
    match lexed.class_at(start) {
        crate::scan::Class::Code => true,
        crate::scan::Class::Comment => {
            set.in_comments += 1;
            false
        }
        crate::scan::Class::Literal => false,
    }
}

/// First in-scope code offset naming an anchor of an unresolved hunk, or
/// the member read right before it.
fn placement_anchor(
    lexed: &Lexed<'_>,
    scope: &Range<usize>,
    hunks: &[&SourcePreviewHunk],
    rules: &RuleSet,
) -> Option<usize> {
    let text = lexed.text();
    let bytes = text.as_bytes();
    hunks
        .iter()
        .flat_map(|hunk| hunk.anchor_source().iter().chain(hunk.preceding.iter()))
        .filter_map(|instruction| rules.classify(instruction)?.anchor())
        .filter(|anchor| anchor.class != AnchorClass::Literal)
        .filter_map(|anchor| {
            text[scope.clone()]
                .match_indices(anchor.token.as_str())
                .map(|(offset, _)| scope.start + offset)
                .find(|&start| {
                    lexed.is_code(start)
                        && is_word_boundary(bytes, start, start + anchor.token.len())
                })
        })
        .min()
}

fn first_code_offset(source: &str, body: &Range<usize>) -> usize {
    source[body.clone()]
        .char_indices()
        .find(|(_, ch)| !ch.is_whitespace())
        .map_or(body.start, |(offset, _)| body.start + offset)
}

/// Apply sorted, non-overlapping edits. Returns the new text and the
/// `(original end, delta)` of each edit.
fn apply_edits(source: &str, edits: &[Edit]) -> (String, Vec<(usize, isize)>) {
    let mut out = String::with_capacity(source.len());
    let mut shifts = Vec::with_capacity(edits.len());
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&source[cursor..edit.range.start]);
        out.push_str(&edit.text);
        cursor = edit.range.end;
        let removed = isize::try_from(edit.range.len()).unwrap_or(isize::MAX);
        let added = isize::try_from(edit.text.len()).unwrap_or(isize::MAX);
        shifts.push((edit.range.end, added - removed));
    }
    out.push_str(&source[cursor..]);
    (out, shifts)
}

/// Position of an original offset in the rewritten text. Offsets inside an
/// edit map to the start of its replacement.
fn shifted(offset: usize, shifts: &[(usize, isize)]) -> usize {
    let delta: isize = shifts
        .iter()
        .filter(|(end, _)| *end <= offset)
        .map(|(_, delta)| delta)
        .sum();
    offset.saturating_add_signed(delta)
}

struct Insertion {
    line: usize,
    order: u8,
    lines: Vec<String>,
}

/// Insert synthetic lines above their target lines, keeping the text's line
/// endings. Returns the text and the indices of the inserted lines.
fn assemble(text: &str, insertions: Vec<Insertion>) -> (String, Vec<u32>) {
    if insertions.is_empty() {
        return (text.to_owned(), Vec::new());
    }
    let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut out = String::with_capacity(text.len() + insertions.len() * 64);
    let mut synthetic = Vec::new();
    let mut out_line = 0_usize;
    let mut pending = insertions.into_iter().peekable();

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let width = line
            .bytes()
            .take_while(|byte| *byte == b' ' || *byte == b'\t')
            .count();
        while let Some(insertion) = pending.next_if(|insertion| insertion.line <= idx) {
            for inserted in insertion.lines {
                out.push_str(&line[..width]);
                out.push_str(&inserted);
                out.push_str(eol);
                synthetic.push(crate::diff::index_u32(out_line));
                out_line += 1;
            }
        }
        out.push_str(line);
        out_line += 1;
    }
    for insertion in pending {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push_str(eol);
        }
        for inserted in insertion.lines {
            out.push_str(&inserted);
            out.push_str(eol);
            synthetic.push(crate::diff::index_u32(out_line));
            out_line += 1;
        }
    }
    (out, synthetic)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
