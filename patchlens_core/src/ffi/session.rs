use std::sync::Arc;

use parking_lot::RwLock;
use patchlens_source_api::SourceRegistry;
use tracing::{debug, info};

use crate::{
    capture::{CaptureStore, PushOutcome},
    config::EngineConfig,
    correlate::map_instruction_to_source_line,
    diff::snapshot_diff,
    history::{SnapshotHistory, SnapshotQuery},
    reconstruct::{Reconstruction, Reconstructor},
    report::render_snapshot,
    sources::SourceCache,
    DiffLine, ExecutionFrame, OwnerClass, Snapshot,
};

use super::CoreError;

type Result<T> = std::result::Result<T, CoreError>;

/// Host-side snapshot filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFilter {
    /// Keep only this owner class.
    pub owner_class: Option<OwnerClass>,
    /// Case-insensitive free-text search.
    pub search: Option<String>,
}

/// High-level handle exposed to hosts via `UniFFI`.
///
/// The session owns the history, the capture store, the source cache and a
/// reconstructor. Every method takes `&self`; the history sits behind a
/// read/write lock and the other components lock internally.
#[derive(Debug)]
pub struct InspectorSession {
    config: EngineConfig,
    history: RwLock<SnapshotHistory>,
    capture: CaptureStore,
    sources: SourceCache,
    reconstructor: Reconstructor,
}

impl InspectorSession {
    /// Build a session from an explicit configuration and provider registry.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the rewrite
    /// rules fail to compile.
    pub fn new(config: EngineConfig, registry: SourceRegistry) -> crate::Result<Self> {
        config.validate()?;
        let reconstructor = Reconstructor::new(&config)?;
        Ok(Self {
            history: RwLock::new(SnapshotHistory::new(config.internal_owners.clone())),
            capture: CaptureStore::new(config.capture_capacity),
            sources: SourceCache::new(registry),
            reconstructor,
            config,
        })
    }

    /// Configuration the session runs with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record a snapshot and return it as stored (normalized).
    pub fn record_snapshot(&self, snapshot: Snapshot) -> Snapshot {
        let stored = self.history.write().record(snapshot);
        Snapshot::clone(&stored)
    }

    /// Deduplicated snapshots matching `filter`, oldest first.
    pub fn query_snapshots(&self, filter: SnapshotFilter) -> Vec<Snapshot> {
        let mut query = SnapshotQuery::new();
        if let Some(class) = filter.owner_class {
            query = query.owner_class(class);
        }
        if let Some(search) = filter.search.as_deref() {
            query = query.search(search);
        }
        self.history
            .read()
            .query(&query)
            .iter()
            .map(|snapshot| Snapshot::clone(snapshot))
            .collect()
    }

    /// Aligned instruction diff of the latest snapshot for `(owner, method)`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotNotFound`] when nothing was recorded for the key.
    pub fn instruction_diff(&self, owner: String, method: String) -> Result<Vec<DiffLine>> {
        let snapshot = self.latest(&owner, &method)?;
        Ok(snapshot_diff(&snapshot))
    }

    /// Reconstructed source for the latest snapshot of `(owner, method)`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotNotFound`] when nothing was recorded for the key.
    pub fn reconstruct(&self, owner: String, method: String) -> Result<Reconstruction> {
        let snapshot = self.latest(&owner, &method)?;
        let source = self.sources.source(&method);
        Ok(self
            .reconstructor
            .reconstruct_snapshot(&snapshot, source.as_deref()))
    }

    /// Supply decompiled text for `method`, replacing any cached text.
    pub fn provide_source(&self, method: String, text: String) {
        debug!(method = %method, bytes = text.len(), "source provided by host");
        self.sources.insert(&method, text);
    }

    /// Drop cached source for `method`; the next use fetches it again.
    pub fn invalidate_source(&self, method: String) -> bool {
        self.sources.invalidate(&method)
    }

    /// Fetch `method` again from providers that support reloading. Returns
    /// whether source is available afterwards.
    pub fn reload_source(&self, method: String) -> bool {
        self.sources.reload(&method).is_some()
    }

    /// Start live capture for `method`. Returns the previously attached method.
    pub fn attach(&self, method: String) -> Option<String> {
        self.capture.attach(&method)
    }

    /// Stop live capture and discard buffered frames.
    pub fn detach(&self) -> bool {
        self.capture.detach()
    }

    /// Deliver a frame observed for `method`.
    pub fn push_frame(&self, method: String, frame: ExecutionFrame) -> PushOutcome {
        self.capture.push(&method, frame)
    }

    /// Buffered frames, oldest first.
    pub fn recent_frames(&self) -> Vec<ExecutionFrame> {
        self.capture.recent_frames()
    }

    /// Newest buffered frame.
    pub fn latest_frame(&self) -> Option<ExecutionFrame> {
        self.capture.latest_frame()
    }

    /// 1-based source line for `offset` in `method`, `None` when unknown.
    pub fn map_instruction_to_source_line(&self, method: String, offset: u32) -> Option<u32> {
        map_instruction_to_source_line(&self.sources, &method, offset)
    }

    /// Text report for the latest snapshot of `(owner, method)`, including
    /// its reconstruction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotNotFound`] when nothing was recorded for the key.
    pub fn report(&self, owner: String, method: String) -> Result<String> {
        let snapshot = self.latest(&owner, &method)?;
        let source = self.sources.source(&method);
        let reconstruction = self
            .reconstructor
            .reconstruct_snapshot(&snapshot, source.as_deref());
        Ok(render_snapshot(&snapshot, Some(&reconstruction)))
    }

    /// Export the whole history as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if serialization fails.
    pub fn export_history(&self) -> Result<String> {
        self.history.read().to_json().map_err(CoreError::from)
    }

    fn latest(&self, owner: &str, method: &str) -> Result<Arc<Snapshot>> {
        self.history
            .read()
            .latest(owner, method)
            .ok_or(CoreError::SnapshotNotFound)
    }
}

/// Open an inspector session via the `UniFFI` namespace function.
///
/// Loads the JSON config at `config_path` when given, applies environment
/// overrides and registers the default source providers.
///
/// # Errors
///
/// Returns an error when the config cannot be read, parsed or validated.
pub fn open(config_path: Option<String>) -> Result<Arc<InspectorSession>> {
    let config = match config_path.as_deref() {
        Some(path) => EngineConfig::from_json_file(path).map_err(CoreError::from)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();
    let registry = patchlens_sources::default_registry();
    let providers: Vec<&str> = registry.ids().collect();
    info!(
        config = config_path.as_deref().unwrap_or("<default>"),
        providers = ?providers,
        "opened inspector session"
    );
    let session = InspectorSession::new(config, registry).map_err(CoreError::from)?;
    Ok(Arc::new(session))
}
