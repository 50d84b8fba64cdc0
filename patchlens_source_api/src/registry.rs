//! Registry keeps track of available source providers in priority order.

use std::sync::Arc;

use crate::{ProviderSummary, SourceProvider};

/// In-memory, ordered registry of source providers.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    providers: Vec<Arc<dyn SourceProvider>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. A provider with the same id is replaced in place.
    pub fn register<P>(&mut self, provider: P)
    where
        P: SourceProvider + 'static,
    {
        self.register_arc(Arc::new(provider));
    }

    /// Register an already shared provider.
    pub fn register_arc(&mut self, provider: Arc<dyn SourceProvider>) {
        if let Some(slot) = self
            .providers
            .iter_mut()
            .find(|existing| existing.id() == provider.id())
        {
            *slot = provider;
        } else {
            self.providers.push(provider);
        }
    }

    /// Retrieve a provider by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn SourceProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.id() == id)
            .cloned()
    }

    /// Providers in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceProvider>> + '_ {
        self.providers.iter()
    }

    /// Returns the registered provider identifiers in priority order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.iter().map(|provider| provider.id())
    }

    /// Summaries for all registered providers.
    #[must_use]
    pub fn summaries(&self) -> Vec<ProviderSummary> {
        self.providers
            .iter()
            .map(|provider| ProviderSummary {
                id: provider.id().to_owned(),
                label: provider.label().to_owned(),
                capabilities: provider.capabilities(),
            })
            .collect()
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// `true` when no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.ids().collect();
        f.debug_struct("SourceRegistry").field("providers", &ids).finish()
    }
}
