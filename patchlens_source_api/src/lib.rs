mod registry;
mod types;

pub use registry::SourceRegistry;
pub use types::{ProviderCapabilities, ProviderSummary, SourceError, SourceResult};

use patchlens_api::MethodRef;

/// Trait implemented by decompiled-source collaborators.
///
/// Providers are consulted in registration order; the first one returning
/// text wins.
pub trait SourceProvider: Send + Sync {
    /// Stable identifier used for lookup and logging.
    fn id(&self) -> &'static str;

    /// Human-friendly label for UI surfaces.
    fn label(&self) -> &'static str;

    /// Capabilities advertised by the provider.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Fetch the raw decompiled source for a method.
    ///
    /// `Ok(None)` means the provider has nothing for this method, which is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Implementors should surface transport or tool failures.
    fn fetch(&self, method: &MethodRef) -> SourceResult<Option<String>>;
}
