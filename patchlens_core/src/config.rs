//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config file.
//! Environment overrides are applied on top of whatever was loaded.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

const CAPTURE_CAPACITY_ENV: &str = "PATCHLENS_CAPTURE_CAPACITY";
const PROBE_WINDOW_ENV: &str = "PATCHLENS_PROBE_WINDOW";
const INTERNAL_OWNERS_ENV: &str = "PATCHLENS_INTERNAL_OWNERS";

/// Size caps for the reconstruction overlay block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayLimits {
    /// Maximum number of hunks listed.
    pub max_hunks: usize,
    /// Maximum removed (and, separately, added) lines listed per hunk.
    pub max_lines_per_side: usize,
    /// Maximum characters per listed instruction.
    pub max_line_len: usize,
}

impl Default for OverlayLimits {
    fn default() -> Self {
        Self {
            max_hunks: 8,
            max_lines_per_side: 6,
            max_line_len: 120,
        }
    }
}

/// Tunables for the whole engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ring-buffer capacity of the live capture store.
    pub capture_capacity: usize,
    /// Number of before-side instructions probed for anchors of pure insertions.
    pub probe_window: usize,
    /// Maximum number of matches for which a literal anchor is applied to its
    /// first occurrence as a best guess.
    pub literal_guess_limit: usize,
    /// Overlay block caps.
    pub overlay: OverlayLimits,
    /// Anchor names never rewritten, in addition to the built-in list.
    pub deny_list: Vec<String>,
    /// Owner prefixes classified as internal.
    pub internal_owners: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_capacity: 64,
            probe_window: 3,
            literal_guess_limit: 4,
            overlay: OverlayLimits::default(),
            deny_list: Vec::new(),
            internal_owners: vec!["patchlens".to_owned()],
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Apply `PATCHLENS_*` environment overrides.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(capacity) = parse_env(CAPTURE_CAPACITY_ENV) {
            self.capture_capacity = capacity;
        }
        if let Some(window) = parse_env(PROBE_WINDOW_ENV) {
            self.probe_window = window;
        }
        if let Ok(raw) = env::var(INTERNAL_OWNERS_ENV) {
            self.internal_owners = raw
                .split(',')
                .map(str::trim)
                .filter(|owner| !owner.is_empty())
                .map(str::to_owned)
                .collect();
        }
        self
    }

    /// Check the values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero capture capacity or zero overlay caps.
    pub fn validate(&self) -> Result<()> {
        if self.capture_capacity == 0 {
            return Err(Error::Config("capture_capacity must be at least 1".into()));
        }
        if self.overlay.max_hunks == 0 || self.overlay.max_lines_per_side == 0 {
            return Err(Error::Config("overlay caps must be at least 1".into()));
        }
        if self.overlay.max_line_len < 8 {
            return Err(Error::Config("overlay.max_line_len must be at least 8".into()));
        }
        Ok(())
    }
}

fn parse_env(key: &str) -> Option<usize> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = %raw, error = %err, "ignoring invalid environment override");
            None
        }
    }
}
