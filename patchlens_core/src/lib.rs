//! Core library for patchlens' runtime-patch inspection workflow.
//!
//! The crate is layered around five responsibilities:
//! - sequence alignment and hunk extraction over instruction lists
//! - heuristic reconstruction of patched source text
//! - live frame capture and offset-to-line correlation
//! - an append-only snapshot history
//! - a host-facing session exported through `UniFFI`

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Live frame capture ring buffer.
pub mod capture;
/// Engine configuration.
pub mod config;
/// Instruction-offset to source-line correlation.
pub mod correlate;
/// Generic sequence alignment.
pub mod diff;
/// Host bindings.
pub mod ffi;
/// Append-only snapshot history.
pub mod history;
/// Hunk extraction and snapshot normalization.
pub mod hunks;
/// Heuristic source reconstruction.
pub mod reconstruct;
/// Human-readable report rendering.
pub mod report;
mod scan;
/// Caller-owned decompiled-source cache.
pub mod sources;

pub use capture::{CaptureStore, PushOutcome};
pub use config::{EngineConfig, OverlayLimits};
pub use correlate::{map_instruction_to_source_line, LineMap};
pub use diff::{align, diff_lines, snapshot_diff, Step};
pub use ffi::{open, CoreError, InspectorSession, SnapshotFilter, UniFfiTag};
pub use history::{SnapshotHistory, SnapshotQuery};
pub use hunks::{extract_hunks, normalize_snapshot, resolve_hunks, total_stats};
pub use patchlens_api::{
    simple_type_name, DiffLine, DiffLineKind, DiffStats, EditKind, ExecutionFrame, MethodRef,
    OwnerClass, PatchEdit, Snapshot,
};
pub use reconstruct::{
    align_source, Reconstruction, Reconstructor, SourceDiff, SourceDiffRow, SourcePreviewHunk,
    SourceRowKind,
};
pub use sources::SourceCache;

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
///
/// The engine operations themselves never fail; these cover configuration
/// loading and the internal faults the operations catch and degrade on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration value rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
    /// JSON (de)serialization failed.
    #[error("json error: {source}")]
    Json {
        /// Underlying serde error.
        #[from]
        source: serde_json::Error,
    },
    /// A rewrite or rule pattern failed to compile.
    #[error("pattern error: {source}")]
    Pattern {
        /// Underlying regex error.
        #[from]
        source: regex::Error,
    },
}
