//! Shared patchlens data models consumed by the engine and the source provider crates.
//!
//! The structures in this crate are designed to be:
//! - serializable via `serde` for persistence and transport
//! - restricted to FFI-friendly primitives so the host bindings can reuse them

pub mod diff;
pub mod frame;
pub mod method;
pub mod snapshot;

pub use diff::*;
pub use frame::*;
pub use method::*;
pub use snapshot::*;
