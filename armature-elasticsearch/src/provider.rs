//! Token-keyed provider registry.

use crate::error::{ElasticsearchError, Result};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Providers keyed by string token.
///
/// Connections are registered under [`crate::client_token`] and repositories
/// under [`crate::repository_token`]; anything else may share the registry.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        debug!("Creating provider registry");
        Self::default()
    }

    /// Register a provider instance under `token`, replacing any previous one.
    pub fn register<T: Any + Send + Sync>(&self, token: impl Into<String>, instance: T) {
        self.register_arc(token, Arc::new(instance));
    }

    /// Register a shared provider instance under `token`.
    pub fn register_arc<T: Any + Send + Sync>(&self, token: impl Into<String>, instance: Arc<T>) {
        let token = token.into();
        trace!(token = %token, provider = std::any::type_name::<T>(), "Registering provider");

        if self.providers.write().insert(token.clone(), instance).is_some() {
            debug!(token = %token, "Provider replaced");
        } else {
            debug!(token = %token, "Provider registered");
        }
    }

    /// Resolve the provider registered under `token` as a `T`.
    pub fn resolve<T: Any + Send + Sync>(&self, token: &str) -> Result<Arc<T>> {
        let result = self
            .providers
            .read()
            .get(token)
            .and_then(|any| any.clone().downcast::<T>().ok())
            .ok_or_else(|| ElasticsearchError::ProviderNotFound(token.to_string()));

        match &result {
            Ok(_) => trace!(token = %token, "Provider resolved"),
            Err(_) => debug!(
                token = %token,
                provider = std::any::type_name::<T>(),
                "Provider not found"
            ),
        }

        result
    }

    /// Whether anything is registered under `token`.
    pub fn has(&self, token: &str) -> bool {
        self.providers.read().contains_key(token)
    }

    /// Registered tokens, sorted.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.providers.read().keys().cloned().collect();
        tokens.sort();
        tokens
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("tokens", &self.tokens())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeter(&'static str);

    #[test]
    fn test_register_and_resolve() {
        let registry = ProviderRegistry::new();
        registry.register("GREETER", Greeter("hello"));

        assert!(registry.has("GREETER"));
        assert_eq!(*registry.resolve::<Greeter>("GREETER").unwrap(), Greeter("hello"));
    }

    #[test]
    fn test_resolve_with_wrong_type_fails() {
        let registry = ProviderRegistry::new();
        registry.register("GREETER", Greeter("hello"));

        let err = registry.resolve::<String>("GREETER").unwrap_err();
        assert!(matches!(err, ElasticsearchError::ProviderNotFound(token) if token == "GREETER"));
        assert!(registry.resolve::<Greeter>("MISSING").is_err());
    }

    #[test]
    fn test_clones_share_providers() {
        let registry = ProviderRegistry::new();
        let clone = registry.clone();
        clone.register("B", 2_u32);
        clone.register("A", 1_u32);

        assert_eq!(registry.tokens(), vec!["A".to_string(), "B".to_string()]);
    }
}
