use serde::{Deserialize, Serialize};

/// Capabilities advertised by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderCapabilities {
    /// Whether a second fetch may return different text (e.g. a live
    /// decompiler). Only such providers are asked again on reload.
    pub supports_reload: bool,
    /// Whether returned text is scoped to the single method rather than its
    /// whole type. Method-scoped providers are asked first.
    pub method_scoped: bool,
}

impl ProviderCapabilities {
    /// Construct a new capabilities struct with explicit flags.
    #[must_use]
    pub const fn new(supports_reload: bool, method_scoped: bool) -> Self {
        Self {
            supports_reload,
            method_scoped,
        }
    }
}

/// Summary information about a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    /// Stable identifier for the provider.
    pub id: String,
    /// Human-friendly label for display.
    pub label: String,
    /// Capability flags.
    pub capabilities: ProviderCapabilities,
}

/// Errors surfaced by source providers.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The provider's tool ran but has no source for the method. Callers
    /// treat this like `Ok(None)`; the reason is kept for logging.
    #[error("no source for method: {reason}")]
    NotFound {
        /// Why the tool could not produce source.
        reason: String,
    },
    /// Generic failure surfaced by the provider.
    #[error("{message}")]
    Failure {
        /// Human-readable error message.
        message: String,
    },
}

impl SourceError {
    /// Helper to construct a failure from any displayable message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Convenience result alias for provider operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
