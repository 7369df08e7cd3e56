//! The boundary to the search engine.
//!
//! Repositories never talk to a client library directly; they issue typed
//! requests through [`SearchConnection`]. [`crate::OpenSearchConnection`] is the
//! production implementation, tests plug in their own.

use crate::{config::ConnectionOptions, error::Result, script::Script};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Refresh directive for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refresh {
    /// Refresh the affected shards immediately.
    True,
    /// Do not refresh (the engine default).
    False,
    /// Wait until the next refresh makes the write visible.
    WaitFor,
}

impl Refresh {
    /// Query-string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::WaitFor => "wait_for",
        }
    }
}

impl From<bool> for Refresh {
    fn from(refresh: bool) -> Self {
        if refresh { Self::True } else { Self::False }
    }
}

/// What to do when a by-query operation hits a version conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conflicts {
    /// Abort the operation.
    Abort,
    /// Skip the conflicting document and continue.
    Proceed,
}

/// Index-creation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexRequest {
    /// Index name.
    pub index: String,
    /// Index settings.
    pub settings: Option<Map<String, Value>>,
    /// Mappings including `properties`.
    pub mappings: Map<String, Value>,
}

impl CreateIndexRequest {
    /// Request body (`settings` and `mappings`).
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        if let Some(settings) = &self.settings {
            body.insert("settings".to_string(), Value::Object(settings.clone()));
        }
        body.insert("mappings".to_string(), Value::Object(self.mappings.clone()));
        Value::Object(body)
    }
}

/// Single-document write.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    /// Target index.
    pub index: String,
    /// Document id; the engine assigns one when absent.
    pub id: Option<String>,
    /// Wire document.
    pub document: Map<String, Value>,
    /// Refresh directive.
    pub refresh: Option<Refresh>,
}

/// Body of a single-document update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateBody {
    /// Merge-patch document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Map<String, Value>>,
    /// Create the document from `doc` when it is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_as_upsert: Option<bool>,
    /// Server-side script mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    /// Document to create when a scripted update finds nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<Map<String, Value>>,
}

impl UpdateBody {
    /// Merge-patch update.
    pub fn doc(doc: Map<String, Value>) -> Self {
        Self {
            doc: Some(doc),
            ..Default::default()
        }
    }

    /// Merge-patch update that creates the document when missing.
    pub fn doc_as_upsert(doc: Map<String, Value>) -> Self {
        Self {
            doc: Some(doc),
            doc_as_upsert: Some(true),
            ..Default::default()
        }
    }

    /// Scripted update.
    pub fn script(script: Script) -> Self {
        Self {
            script: Some(script),
            ..Default::default()
        }
    }

    /// Scripted update with a fallback document.
    pub fn script_with_upsert(script: Script, upsert: Map<String, Value>) -> Self {
        Self {
            script: Some(script),
            upsert: Some(upsert),
            ..Default::default()
        }
    }
}

/// Single-document update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Target index.
    pub index: String,
    /// Document id.
    pub id: String,
    /// Update body.
    pub body: UpdateBody,
    /// Refresh directive.
    pub refresh: Option<Refresh>,
}

/// Batched multi-operation request, already laid out as bulk lines.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    /// Default index of the batch.
    pub index: String,
    /// Action and source lines in submission order.
    pub lines: Vec<Value>,
    /// Refresh directive.
    pub refresh: Option<Refresh>,
}

/// Search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Target index.
    pub index: String,
    /// Search body (`query`, `from`, `size`, `sort`, `aggs`, ...).
    pub body: Value,
    /// Simple query string, sent as the `q` parameter.
    pub q: Option<String>,
}

/// Delete-by-query or update-by-query request.
#[derive(Debug, Clone, PartialEq)]
pub struct ByQueryRequest {
    /// Target index.
    pub index: String,
    /// Request body.
    pub body: Value,
    /// Refresh the index once done.
    pub refresh: Option<bool>,
    /// Version-conflict handling.
    pub conflicts: Option<Conflicts>,
}

impl ByQueryRequest {
    /// Request over `index` with `body`.
    pub fn new(index: impl Into<String>, body: Value) -> Self {
        Self {
            index: index.into(),
            body,
            refresh: None,
            conflicts: None,
        }
    }
}

/// A live handle to one search cluster.
///
/// Every method is a single round trip. Engine rejections come back as
/// [`crate::ElasticsearchError::Response`] with the engine's status; a missing
/// document or index is a `404` like any other rejection.
#[async_trait]
pub trait SearchConnection: Send + Sync {
    /// Create an index.
    async fn create_index(&self, request: CreateIndexRequest) -> Result<Value>;

    /// Delete an index.
    async fn delete_index(&self, index: &str) -> Result<Value>;

    /// Whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Make recent writes to an index visible to search.
    async fn refresh(&self, index: &str) -> Result<Value>;

    /// Write one document.
    async fn index(&self, request: IndexRequest) -> Result<Value>;

    /// Fetch one document.
    async fn get(&self, index: &str, id: &str) -> Result<Value>;

    /// Whether a document exists.
    async fn exists(&self, index: &str, id: &str) -> Result<bool>;

    /// Update one document.
    async fn update(&self, request: UpdateRequest) -> Result<Value>;

    /// Delete one document.
    async fn delete(&self, index: &str, id: &str) -> Result<Value>;

    /// Run a batch of operations.
    async fn bulk(&self, request: BulkRequest) -> Result<Value>;

    /// Fetch several documents by id.
    async fn mget(&self, index: &str, ids: &[String]) -> Result<Value>;

    /// Search an index.
    async fn search(&self, request: SearchRequest) -> Result<Value>;

    /// Count documents, optionally restricted by a query.
    async fn count(&self, index: &str, query: Option<Value>) -> Result<Value>;

    /// Delete every document matching a query.
    async fn delete_by_query(&self, request: ByQueryRequest) -> Result<Value>;

    /// Update every document matching a query.
    async fn update_by_query(&self, request: ByQueryRequest) -> Result<Value>;

    /// Release the connection.
    async fn close(&self) -> Result<()>;
}

/// Builds live connections from connection options.
pub trait ConnectionFactory: Send + Sync {
    /// Connect `name` with `options`.
    fn connect(&self, name: &str, options: &ConnectionOptions) -> Result<Arc<dyn SearchConnection>>;
}

impl<F> ConnectionFactory for F
where
    F: Fn(&str, &ConnectionOptions) -> Result<Arc<dyn SearchConnection>> + Send + Sync,
{
    fn connect(
        &self,
        name: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn SearchConnection>> {
        self(name, options)
    }
}

/// Body of a `count` or by-query request restricted to `query`.
pub(crate) fn query_body(query: Option<Value>) -> Value {
    match query {
        Some(query) => json!({ "query": query }),
        None => json!({}),
    }
}
