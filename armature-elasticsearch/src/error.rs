//! Error types for mapping, repository and connection operations.

use serde_json::Value;
use thiserror::Error;

/// Engine error type reported when an index is created twice.
pub const INDEX_ALREADY_EXISTS: &str = "resource_already_exists_exception";

/// Elasticsearch integration error type.
#[derive(Error, Debug)]
pub enum ElasticsearchError {
    /// The entity has no document declaration, so it has no index.
    #[error("Entity `{entity}` has no document declaration")]
    MissingDocument {
        /// Entity name.
        entity: String,
    },

    /// No connection is registered under the requested name.
    #[error("Connection not configured: {0}")]
    ConnectionNotFound(String),

    /// A connection with the same normalized name is already registered.
    #[error("Connection already configured: {0}")]
    DuplicateConnection(String),

    /// No provider is registered under the requested token.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Invalid connection options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine rejected the request.
    #[error("Elasticsearch responded with {status}: {reason}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// Engine error type, e.g. `index_not_found_exception`.
        error_type: Option<String>,
        /// Engine error reason.
        reason: String,
        /// Raw response body.
        body: Value,
    },

    /// A value could not be projected into a wire document.
    #[error("Projection error: {0}")]
    Projection(String),

    /// A wire document could not be turned back into an entity.
    #[error("Hydration error: {0}")]
    Hydration(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport error from the opensearch crate.
    #[error("Client error: {0}")]
    Client(#[from] opensearch::Error),
}

impl ElasticsearchError {
    /// Build a response error from a status code and an engine error body.
    pub fn from_response(status: u16, body: Value) -> Self {
        let error = &body["error"];
        let error_type = error["type"].as_str().map(str::to_string);
        let reason = error["reason"]
            .as_str()
            .or_else(|| error.as_str())
            .or_else(|| body["result"].as_str())
            .unwrap_or("Unknown error")
            .to_string();

        Self::Response {
            status,
            error_type,
            reason,
            body,
        }
    }

    /// HTTP status of an engine rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the engine reported a missing document or index.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the engine refused to create an index that already exists.
    pub fn is_index_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Response { error_type: Some(kind), .. } if kind == INDEX_ALREADY_EXISTS
        )
    }

    /// Whether this is a configuration error rather than an engine failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingDocument { .. }
                | Self::ConnectionNotFound(_)
                | Self::DuplicateConnection(_)
                | Self::ProviderNotFound(_)
                | Self::Config(_)
        )
    }
}

/// Result type alias for Elasticsearch operations.
pub type Result<T> = std::result::Result<T, ElasticsearchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_response_reads_engine_error() {
        let err = ElasticsearchError::from_response(
            400,
            json!({
                "error": {
                    "type": "resource_already_exists_exception",
                    "reason": "index [products/abc] already exists"
                },
                "status": 400
            }),
        );

        assert!(err.is_index_already_exists());
        assert!(!err.is_not_found());
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_not_found_without_error_object() {
        let err = ElasticsearchError::from_response(
            404,
            json!({ "_index": "products", "_id": "p9", "found": false }),
        );

        assert!(err.is_not_found());
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_kinds() {
        assert!(
            ElasticsearchError::MissingDocument {
                entity: "User".into()
            }
            .is_configuration()
        );
        assert!(ElasticsearchError::ConnectionNotFound("x".into()).is_configuration());
        assert!(!ElasticsearchError::Hydration("bad".into()).is_configuration());
    }
}
