//! Provider registry: configured provider name → carrier client.

use std::collections::HashMap;
use std::sync::Arc;

use domain::CarrierProvider;

use crate::client::CarrierClient;

/// Maps supported providers to their configured clients.
///
/// A shipping method stores its provider as text; resolution goes through
/// [`CarrierProvider::from_name`] (exact match) and then this registry.
/// An unknown or unregistered provider resolves to `None` — the saga treats
/// that as "no shipping leg possible", never as a hard failure.
#[derive(Clone, Default)]
pub struct CarrierRegistry {
    clients: HashMap<CarrierProvider, Arc<dyn CarrierClient>>,
}

impl CarrierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client for a provider, replacing any previous one.
    pub fn register(&mut self, provider: CarrierProvider, client: Arc<dyn CarrierClient>) {
        self.clients.insert(provider, client);
    }

    /// Builder-style registration.
    pub fn with(mut self, provider: CarrierProvider, client: Arc<dyn CarrierClient>) -> Self {
        self.register(provider, client);
        self
    }

    /// Resolves a provider to its registered client.
    pub fn resolve(&self, provider: CarrierProvider) -> Option<Arc<dyn CarrierClient>> {
        self.clients.get(&provider).cloned()
    }

    /// Resolves a configured provider name to its registered client.
    pub fn resolve_name(&self, name: &str) -> Option<Arc<dyn CarrierClient>> {
        CarrierProvider::from_name(name).and_then(|p| self.resolve(p))
    }

    /// Returns the number of registered providers.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
