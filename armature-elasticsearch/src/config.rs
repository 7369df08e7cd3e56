//! Connection configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Name used when a connection definition carries none.
pub const DEFAULT_CONNECTION: &str = "default";

/// Normalize a connection name: trimmed, lowercased, blank means default.
pub fn normalize_connection_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_lowercase(),
        _ => DEFAULT_CONNECTION.to_string(),
    }
}

/// Parameters of one live connection.
///
/// The registry never reads these; they are handed to the
/// [`crate::ConnectionFactory`] as given. Keys outside the typed fields are
/// kept in [`ConnectionOptions::params`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Node URL(s).
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,
    /// Basic auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// Request timeout.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Bypass system proxies.
    #[serde(default = "default_disable_proxy")]
    pub disable_proxy: bool,
    /// Any other connection parameter.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn default_urls() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_disable_proxy() -> bool {
    true
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            username: None,
            password: None,
            request_timeout: default_request_timeout(),
            disable_proxy: default_disable_proxy(),
            params: Map::new(),
        }
    }
}

impl ConnectionOptions {
    /// Options for a single node.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Default::default()
        }
    }

    /// Options for a cluster of nodes.
    pub fn cluster(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Default::default()
        }
    }

    /// Load options from environment variables.
    ///
    /// Reads `ELASTICSEARCH_URL`, `ELASTICSEARCH_USERNAME`,
    /// `ELASTICSEARCH_PASSWORD` and `ELASTICSEARCH_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(url) = std::env::var("ELASTICSEARCH_URL") {
            options.urls = url
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let (Ok(username), Ok(password)) = (
            std::env::var("ELASTICSEARCH_USERNAME"),
            std::env::var("ELASTICSEARCH_PASSWORD"),
        ) {
            options = options.with_basic_auth(username, password);
        }

        if let Ok(timeout) = std::env::var("ELASTICSEARCH_REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse()
        {
            options.request_timeout = Duration::from_secs(secs);
        }

        options
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Route requests through system proxies.
    pub fn with_proxy(mut self) -> Self {
        self.disable_proxy = false;
        self
    }

    /// Set an extra connection parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One named connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    /// Connection name; blank or absent means `"default"`.
    #[serde(default)]
    pub name: Option<String>,
    /// Connection parameters.
    #[serde(flatten)]
    pub options: ConnectionOptions,
}

impl ConnectionDefinition {
    /// The default connection.
    pub fn default_connection(options: ConnectionOptions) -> Self {
        Self {
            name: None,
            options,
        }
    }

    /// A named connection.
    pub fn named(name: impl Into<String>, options: ConnectionOptions) -> Self {
        Self {
            name: Some(name.into()),
            options,
        }
    }

    /// Normalized name of this connection.
    pub fn normalized_name(&self) -> String {
        normalize_connection_name(self.name.as_deref())
    }
}

/// Root module options: every connection to open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElasticsearchOptions {
    /// Connection definitions.
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
}

impl ElasticsearchOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single default connection.
    pub fn single(options: ConnectionOptions) -> Self {
        Self::new().connection(ConnectionDefinition::default_connection(options))
    }

    /// Add a connection.
    pub fn connection(mut self, definition: ConnectionDefinition) -> Self {
        self.connections.push(definition);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_connection_name() {
        assert_eq!(normalize_connection_name(None), "default");
        assert_eq!(normalize_connection_name(Some("   ")), "default");
        assert_eq!(normalize_connection_name(Some(" Analytics ")), "analytics");
    }

    #[test]
    fn test_definition_deserializes_with_passthrough_params() {
        let options: ElasticsearchOptions = serde_json::from_value(json!({
            "connections": [
                { "urls": ["http://es-main:9200"] },
                {
                    "name": "Analytics",
                    "urls": ["http://es-analytics:9200"],
                    "username": "elastic",
                    "request_timeout": "5s",
                    "sniff_on_start": true
                }
            ]
        }))
        .unwrap();

        assert_eq!(options.connections.len(), 2);
        assert_eq!(options.connections[0].normalized_name(), "default");

        let analytics = &options.connections[1];
        assert_eq!(analytics.normalized_name(), "analytics");
        assert_eq!(analytics.options.request_timeout, Duration::from_secs(5));
        assert_eq!(analytics.options.params["sniff_on_start"], true);
        assert!(!analytics.options.params.contains_key("name"));
    }

    #[test]
    fn test_builder() {
        let options = ConnectionOptions::new("http://localhost:9201")
            .with_basic_auth("elastic", "changeme")
            .with_request_timeout(Duration::from_secs(3))
            .with_param("compression", true);

        assert_eq!(options.urls, vec!["http://localhost:9201".to_string()]);
        assert_eq!(options.username.as_deref(), Some("elastic"));
        assert_eq!(options.request_timeout, Duration::from_secs(3));
        assert_eq!(options.params["compression"], true);
    }
}
