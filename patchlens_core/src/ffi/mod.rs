mod error;
mod session;

pub use error::CoreError;
pub use session::{open, InspectorSession, SnapshotFilter};

#[allow(
    clippy::doc_markdown,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::empty_line_after_doc_comments,
    clippy::missing_safety_doc
)]
mod scaffolding {
    use super::{open, CoreError, InspectorSession, SnapshotFilter};
    use crate::{
        DiffLine, DiffLineKind, EditKind, ExecutionFrame, OwnerClass, PatchEdit, PushOutcome,
        Reconstruction, Snapshot,
    };

    uniffi::include_scaffolding!("patchlens_core");
}

pub use scaffolding::*;
