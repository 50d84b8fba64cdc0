//! Caller-owned cache of decompiled source text.
//!
//! Text is resolved through the registered providers on first use, and both
//! hits and misses are cached until invalidated. Offset line maps are built
//! lazily and stored next to the text they were built from, so a map never
//! outlives its text.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use patchlens_api::MethodRef;
use patchlens_source_api::{ProviderCapabilities, SourceError, SourceRegistry};
use tracing::{debug, warn};

use crate::correlate::LineMap;

#[derive(Debug, Clone, Default)]
struct Entry {
    text: Option<Arc<str>>,
    line_map: Option<Arc<LineMap>>,
}

/// Explicit source cache passed to reconstruction and correlation.
#[derive(Debug, Default)]
pub struct SourceCache {
    registry: SourceRegistry,
    entries: RwLock<HashMap<String, Entry>>,
}

impl SourceCache {
    /// Cache backed by the given providers.
    #[must_use]
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Providers consulted on a cache miss.
    #[must_use]
    pub const fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Source text for `method`, fetching it on first use.
    pub fn source(&self, method: &str) -> Option<Arc<str>> {
        if let Some(entry) = self.entries.read().get(method) {
            debug!(method, hit = entry.text.is_some(), "source cache hit");
            return entry.text.clone();
        }
        let fetched = self.fetch(method, |_| true);
        self.entries
            .write()
            .entry(method.to_owned())
            .or_insert(Entry {
                text: fetched,
                line_map: None,
            })
            .text
            .clone()
    }

    /// Offset line map for `method`; `None` when no source is available.
    ///
    /// The map is only cached if the text it was built from is still the
    /// cached text; otherwise it is rebuilt from the newer text.
    pub fn line_map(&self, method: &str) -> Option<Arc<LineMap>> {
        loop {
            if let Some(map) = self
                .entries
                .read()
                .get(method)
                .and_then(|entry| entry.line_map.clone())
            {
                return Some(map);
            }
            let text = self.source(method)?;
            let map = Arc::new(LineMap::from_source(&text, method));

            let mut entries = self.entries.write();
            match entries.get_mut(method) {
                Some(entry)
                    if entry.text.as_ref().is_some_and(|current| Arc::ptr_eq(current, &text)) =>
                {
                    return Some(Arc::clone(entry.line_map.get_or_insert(map)));
                }
                // text was replaced or dropped while the map was built
                _ => debug!(method, "source changed during line map build, retrying"),
            }
        }
    }

    /// Store text supplied by the host, replacing anything cached.
    pub fn insert(&self, method: &str, text: impl Into<Arc<str>>) {
        self.entries.write().insert(
            method.to_owned(),
            Entry {
                text: Some(text.into()),
                line_map: None,
            },
        );
    }

    /// Forget the cached text and line map for `method`. Returns whether anything was cached.
    pub fn invalidate(&self, method: &str) -> bool {
        self.entries.write().remove(method).is_some()
    }

    /// Fetch `method` again from the providers that support reloading.
    ///
    /// Providers that cannot reload are not asked again. When no reloadable
    /// provider has text, the cached entry is kept.
    pub fn reload(&self, method: &str) -> Option<Arc<str>> {
        match self.fetch(method, |capabilities| capabilities.supports_reload) {
            Some(text) => {
                self.insert(method, Arc::clone(&text));
                Some(text)
            }
            None => {
                debug!(method, "no reloadable provider had source, keeping cached entry");
                self.source(method)
            }
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries, misses included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// First text returned by a provider accepted by `eligible`. Method-scoped
    /// providers are asked before whole-type ones, each group in registration
    /// order.
    fn fetch(
        &self,
        method: &str,
        eligible: impl Fn(ProviderCapabilities) -> bool,
    ) -> Option<Arc<str>> {
        let Some(target) = MethodRef::parse(method) else {
            debug!(method, "method identity not parseable, no source");
            return None;
        };
        let mut providers: Vec<_> = self
            .registry
            .iter()
            .filter(|provider| eligible(provider.capabilities()))
            .collect();
        providers.sort_by_key(|provider| !provider.capabilities().method_scoped);

        for provider in providers {
            match provider.fetch(&target) {
                Ok(Some(text)) => {
                    debug!(method, provider = provider.id(), "source fetched");
                    return Some(Arc::from(text));
                }
                Ok(None) => {}
                Err(SourceError::NotFound { reason }) => {
                    debug!(method, provider = provider.id(), reason = %reason, "provider has no source");
                }
                Err(err) => {
                    warn!(method, provider = provider.id(), error = %err, "source provider failed");
                }
            }
        }
        None
    }
}
