//! Provider registry for resolving configured ids to adapters.

use std::collections::HashMap;

use modelrelay_types::llm::ProviderId;

use super::box_provider::BoxLlmProvider;

/// Registry of adapters, indexed by provider id.
///
/// Filled once at configuration-load time and handed to the router.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, BoxLlmProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register an adapter under the given id.
    ///
    /// If an adapter with this id already exists, it is replaced.
    pub fn register(&mut self, id: impl Into<ProviderId>, provider: BoxLlmProvider) {
        self.providers.insert(id.into(), provider);
    }

    pub fn get(&self, id: &ProviderId) -> Option<&BoxLlmProvider> {
        self.providers.get(id)
    }

    /// Take an adapter out of the registry.
    pub fn remove(&mut self, id: &ProviderId) -> Option<BoxLlmProvider> {
        self.providers.remove(id)
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<&ProviderId> {
        let mut ids: Vec<_> = self.providers.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
