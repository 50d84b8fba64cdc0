mod command;
mod directory;

pub use command::CommandSource;
pub use directory::DirectorySource;

use patchlens_source_api::SourceRegistry;

/// Build a provider registry from the environment.
///
/// `PATCHLENS_SOURCE_DIR` enables the directory provider and
/// `PATCHLENS_DECOMPILER_BIN` enables the decompiler command provider; the
/// directory is consulted first.
#[must_use]
pub fn default_registry() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    if let Some(directory) = DirectorySource::from_env() {
        registry.register(directory);
    }
    if let Some(command) = CommandSource::from_env() {
        registry.register(command);
    }
    registry
}
