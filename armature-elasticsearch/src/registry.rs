//! Named live connections.

use crate::{
    client::OpenSearchConnectionFactory,
    config::{ElasticsearchOptions, normalize_connection_name},
    connection::{ConnectionFactory, SearchConnection},
    error::{ElasticsearchError, Result},
};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of live connections keyed by normalized name.
///
/// Configure it once at startup, look connections up while running and
/// dispose of everything at shutdown.
pub struct ConnectionRegistry {
    factory: Arc<dyn ConnectionFactory>,
    connections: RwLock<HashMap<String, Arc<dyn SearchConnection>>>,
}

impl ConnectionRegistry {
    /// Registry building connections with `factory`.
    pub fn new(factory: impl ConnectionFactory + 'static) -> Self {
        Self::with_factory(Arc::new(factory))
    }

    /// Registry building connections with a shared factory.
    pub fn with_factory(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Registry building [`crate::OpenSearchConnection`]s.
    pub fn opensearch() -> Self {
        Self::new(OpenSearchConnectionFactory)
    }

    /// Open every connection in `options`.
    ///
    /// Returns the normalized names in definition order. A name that is
    /// already registered, or appears twice in `options`, is rejected before
    /// any connection is built.
    pub fn configure(&self, options: &ElasticsearchOptions) -> Result<Vec<String>> {
        let names: Vec<String> = options
            .connections
            .iter()
            .map(|definition| definition.normalized_name())
            .collect();

        {
            let connections = self.connections.read();
            let mut seen = HashSet::new();
            for name in &names {
                if connections.contains_key(name) || !seen.insert(name.as_str()) {
                    return Err(ElasticsearchError::DuplicateConnection(name.clone()));
                }
            }
        }

        let mut built = Vec::with_capacity(names.len());
        for (name, definition) in names.iter().zip(&options.connections) {
            debug!(connection = %name, "Opening connection");
            built.push((name.clone(), self.factory.connect(name, &definition.options)?));
        }

        let mut connections = self.connections.write();
        for (name, connection) in built {
            connections.insert(name, connection);
        }

        info!(connections = ?names, "Connections configured");
        Ok(names)
    }

    /// Register an already open connection.
    pub fn insert(
        &self,
        name: Option<&str>,
        connection: Arc<dyn SearchConnection>,
    ) -> Result<String> {
        let name = normalize_connection_name(name);
        let mut connections = self.connections.write();
        if connections.contains_key(&name) {
            return Err(ElasticsearchError::DuplicateConnection(name));
        }
        connections.insert(name.clone(), connection);
        Ok(name)
    }

    /// Connection registered under `name`; `None` means the default one.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn SearchConnection>> {
        let key = normalize_connection_name(name);
        self.connections.read().get(&key).cloned().ok_or_else(|| {
            ElasticsearchError::ConnectionNotFound(name.unwrap_or(&key).to_string())
        })
    }

    /// Whether a connection is registered under `name`.
    pub fn contains(&self, name: Option<&str>) -> bool {
        self.connections
            .read()
            .contains_key(&normalize_connection_name(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Close every connection concurrently and empty the registry.
    ///
    /// Waits for every close to settle. Failures are logged and reported,
    /// never returned as an error.
    pub async fn dispose_all(&self) -> ShutdownReport {
        let drained: Vec<(String, Arc<dyn SearchConnection>)> =
            self.connections.write().drain().collect();

        let outcomes = join_all(drained.into_iter().map(|(name, connection)| async move {
            let outcome = connection.close().await;
            (name, outcome)
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.closed.push(name),
                Err(err) => {
                    warn!(connection = %name, error = %err, "Failed to close connection");
                    report.failed.push((name, err));
                }
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failed.len(),
            "Connections disposed"
        );
        report
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.names())
            .finish()
    }
}

/// Outcome of disposing of every connection.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Connections closed cleanly.
    pub closed: Vec<String>,
    /// Connections whose close failed.
    pub failed: Vec<(String, ElasticsearchError)>,
}

impl ShutdownReport {
    /// Whether every close succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionDefinition, ConnectionOptions};

    fn failing_factory(_: &str, _: &ConnectionOptions) -> Result<Arc<dyn SearchConnection>> {
        Err(ElasticsearchError::Config("unreachable cluster".into()))
    }

    #[test]
    fn test_duplicate_names_in_one_call_are_rejected_before_connecting() {
        let registry = ConnectionRegistry::new(failing_factory);
        let options = ElasticsearchOptions::new()
            .connection(ConnectionDefinition::named("Main", ConnectionOptions::default()))
            .connection(ConnectionDefinition::named(" main ", ConnectionOptions::default()));

        let err = registry.configure(&options).unwrap_err();
        assert!(matches!(err, ElasticsearchError::DuplicateConnection(name) if name == "main"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_factory_errors_leave_registry_untouched() {
        let registry = ConnectionRegistry::new(failing_factory);
        let err = registry
            .configure(&ElasticsearchOptions::single(ConnectionOptions::default()))
            .unwrap_err();

        assert!(matches!(err, ElasticsearchError::Config(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_reports_requested_name() {
        let registry = ConnectionRegistry::new(failing_factory);

        let err = registry.get(Some("Analytics")).err().unwrap();
        assert!(matches!(err, ElasticsearchError::ConnectionNotFound(name) if name == "Analytics"));

        let err = registry.get(None).err().unwrap();
        assert!(matches!(err, ElasticsearchError::ConnectionNotFound(name) if name == "default"));
    }

    #[test]
    fn test_opensearch_registry_configures_lazily() {
        let registry = ConnectionRegistry::opensearch();
        let names = registry
            .configure(&ElasticsearchOptions::single(ConnectionOptions::new(
                "http://localhost:9200",
            )))
            .unwrap();

        assert_eq!(names, vec!["default".to_string()]);
        assert!(registry.contains(None));
        assert!(registry.get(Some(" DEFAULT ")).is_ok());
    }
}
