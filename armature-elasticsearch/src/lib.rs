//! Declarative document mapping and repositories over Elasticsearch/OpenSearch
//! for the Armature framework.
//!
//! This crate provides:
//! - Per-type document, field and index declarations
//! - Index schema (settings + mappings) compiled from those declarations
//! - A generic [`Repository`] with CRUD, bulk, query and search operations
//! - Named connections with concurrent best-effort shutdown
//! - Provider tokens and module wiring with index auto-creation
//!
//! # Example
//!
//! ```rust,no_run
//! use armature_elasticsearch::prelude::*;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Article {
//!     id: String,
//!     title: String,
//!     tags: Vec<String>,
//! }
//!
//! impl Entity for Article {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     declare::<Article>()
//!         .document(DocumentOptions::new("articles"))
//!         .field("id", FieldOptions::keyword())
//!         .field("title", FieldOptions::text().analyzer("english"))
//!         .field("tags", FieldOptions::keyword());
//!
//!     let connection = OpenSearchConnection::new("default", ConnectionOptions::from_env())?;
//!     let articles = Repository::<Article>::new(Arc::new(connection));
//!     articles.ensure_index().await?;
//!
//!     let article = Article {
//!         id: "a1".to_string(),
//!         title: "Hello search".to_string(),
//!         tags: vec!["tutorial".to_string()],
//!     };
//!     articles.index_one(&article, Some("a1")).await?;
//!     articles.refresh().await?;
//!
//!     let found: Vec<Article> = articles
//!         .search_entities(SearchParams::with_query(Query::matches("title", "hello")))
//!         .await?;
//!     println!("{} hit(s)", found.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bulk;
mod client;
mod config;
mod connection;
mod document;
mod error;
mod lifecycle;
mod mapping;
mod metadata;
mod module;
mod provider;
mod query;
mod registry;
mod repository;
mod schema;
mod script;
mod search;
mod token;

pub use bulk::{BulkIndex, BulkItem, BulkItemError, BulkItemStatus, BulkResponse, BulkUpdate};
pub use client::{OpenSearchConnection, OpenSearchConnectionFactory};
pub use config::{
    ConnectionDefinition, ConnectionOptions, DEFAULT_CONNECTION, ElasticsearchOptions,
    normalize_connection_name,
};
pub use connection::{
    ByQueryRequest, BulkRequest, Conflicts, ConnectionFactory, CreateIndexRequest, IndexRequest,
    Refresh, SearchConnection, SearchRequest, UpdateBody, UpdateRequest,
};
pub use document::{
    DocumentMeta, DocumentWithMeta, Entity, get_path, hydrate, set_path, to_wire_document,
};
pub use error::{ElasticsearchError, INDEX_ALREADY_EXISTS, Result};
pub use lifecycle::{LifecycleResult, OnApplicationShutdown, OnModuleInit};
pub use mapping::{FieldOptions, FieldType};
pub use metadata::{
    Declaration, DocumentOptions, EntityMetadata, FieldMap, IndexOptions, MetadataStore, declare,
};
pub use module::{ElasticsearchModule, FeatureBuilder, ProvisionReport};
pub use provider::ProviderRegistry;
pub use query::{BoolQuery, Query, RangeQuery};
pub use registry::{ConnectionRegistry, ShutdownReport};
pub use repository::{ByQueryOptions, Repository, Source, UpdateByQuery};
pub use schema::{SchemaDescriptor, compile as compile_schema};
pub use script::Script;
pub use search::{
    Aggregation, AggregationResult, SearchHit, SearchParams, SearchResponse, SortOrder,
};
pub use token::{
    CONNECTION_REGISTRY_TOKEN, DEFAULT_CLIENT_TOKEN, client_token, repository_token,
    repository_token_for,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BulkIndex, BulkUpdate, ConnectionOptions, DocumentOptions, ElasticsearchError,
        ElasticsearchModule, ElasticsearchOptions, Entity, FieldOptions, IndexOptions,
        OnApplicationShutdown, OnModuleInit, OpenSearchConnection, Query, Refresh, Repository,
        Script, SearchParams, SortOrder, declare,
    };
}
