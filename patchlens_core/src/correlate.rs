//! Instruction-offset to source-line correlation.
//!
//! Decompilers annotate their output with `IL_xxxx` labels (as comments or
//! jump labels). A [`LineMap`] records, for the target method's body, the
//! line on which each offset label first appears.

use std::sync::OnceLock;

use patchlens_api::MethodRef;
use regex::Regex;
use tracing::{debug, warn};

use crate::scan::{line_of, Lexed};
use crate::sources::SourceCache;

/// Sorted offset-to-line table for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    /// `(offset, 1-based line)` pairs in ascending offset order.
    entries: Vec<(u32, u32)>,
}

impl LineMap {
    /// Build the map from decompiled text.
    ///
    /// Markers are read from the body of `method` when it can be located,
    /// otherwise from the whole text.
    #[must_use]
    pub fn from_source(text: &str, method: &str) -> Self {
        let Some(marker) = marker_pattern() else {
            return Self::default();
        };
        let scope = MethodRef::parse(method)
            .and_then(|parsed| Lexed::new(text).body_of(&parsed))
            .unwrap_or(0..text.len());

        let mut entries: Vec<(u32, u32)> = marker
            .captures_iter(&text[scope.clone()])
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let offset = u32::from_str_radix(caps.get(1)?.as_str(), 16).ok()?;
                let line = line_of(text, scope.start + whole.start()) + 1;
                Some((offset, u32::try_from(line).ok()?))
            })
            .collect();
        // first line mentioning an offset wins
        entries.sort_by_key(|&(offset, line)| (offset, line));
        entries.dedup_by_key(|entry| entry.0);
        debug!(method, markers = entries.len(), "built offset line map");
        Self { entries }
    }

    /// Line of the greatest marker offset not above `offset`.
    #[must_use]
    pub fn lookup(&self, offset: u32) -> Option<u32> {
        let idx = self.entries.partition_point(|&(marker, _)| marker <= offset);
        idx.checked_sub(1).map(|at| self.entries[at].1)
    }

    /// Number of distinct markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no markers were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn marker_pattern() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| {
            Regex::new(r"\bIL_([0-9A-Fa-f]{4,8})\b")
                .map_err(|err| warn!(error = %err, "offset marker pattern rejected"))
                .ok()
        })
        .as_ref()
}

/// Source line (1-based) executing `offset` in `method`.
///
/// `None` when no source is available, the method has no markers, or the
/// offset precedes the first marker.
#[must_use]
pub fn map_instruction_to_source_line(cache: &SourceCache, method: &str, offset: u32) -> Option<u32> {
    let line = cache.line_map(method)?.lookup(offset);
    if line.is_none() {
        debug!(method, offset, "offset has no source line");
    }
    line
}
