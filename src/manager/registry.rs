//! Provider registry: name -> adapter map, grounded on the teacher's
//! `MetaSearchClient` provider `Vec` (here keyed, to support per-name
//! circuit breakers and selective dispatch by [`crate::domain::SearchQuery::providers`]).

use crate::providers::ProviderAdapter;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Holds every configured [`ProviderAdapter`], keyed by [`ProviderAdapter::name`].
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        self.providers
            .write()
            .unwrap()
            .insert(adapter.name().to_string(), adapter);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.read().unwrap().get(name).cloned()
    }

    /// All enabled adapters, in registration order is not guaranteed (backed
    /// by a `HashMap`); callers needing determinism should sort by name.
    #[must_use]
    pub fn enabled(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.providers
            .read()
            .unwrap()
            .values()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect()
    }

    /// Resolve an explicit subset of requested provider names, skipping
    /// unknown or disabled ones rather than failing the whole query (spec.md
    /// §4.6: unknown names in the requested set are silently dropped, not
    /// rejected — the manager degrades gracefully).
    #[must_use]
    pub fn resolve(&self, names: &[String]) -> Vec<Arc<dyn ProviderAdapter>> {
        let providers = self.providers.read().unwrap();
        names
            .iter()
            .filter_map(|name| providers.get(name))
            .filter(|p| p.is_enabled())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.providers.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SearchQuery;
    use crate::error::Error;
    use crate::providers::ProviderCapabilities;
    use async_trait::async_trait;

    struct Stub(&'static str, bool);

    #[async_trait]
    impl ProviderAdapter for Stub {
        fn name(&self) -> &str {
            self.0
        }
        fn is_enabled(&self) -> bool {
            self.1
        }
        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::default()
        }
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<crate::domain::Paper>, Error> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn resolve_skips_unknown_and_disabled_names() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(Stub("a", true)));
        registry.register(Arc::new(Stub("b", false)));

        let resolved = registry.resolve(&["a".into(), "b".into(), "missing".into()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "a");
    }

    #[test]
    fn enabled_excludes_disabled_providers() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(Stub("a", true)));
        registry.register(Arc::new(Stub("b", false)));
        assert_eq!(registry.enabled().len(), 1);
    }
}
