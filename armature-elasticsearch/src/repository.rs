//! Generic repository over one entity type and one connection.

use crate::{
    bulk::{BulkIndex, BulkResponse, BulkUpdate, action_line, update_line},
    connection::{
        ByQueryRequest, BulkRequest, Conflicts, IndexRequest, Refresh, SearchConnection,
        UpdateBody, UpdateRequest, query_body,
    },
    document::{DocumentMeta, DocumentWithMeta, Entity, hydrate, to_wire_document},
    error::{ElasticsearchError, Result},
    metadata::MetadataStore,
    query::Query,
    schema::SchemaDescriptor,
    script::Script,
    search::{SearchParams, SearchResponse},
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// A stored document body.
pub type Source = Map<String, Value>;

/// Options of delete-by-query and update-by-query calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByQueryOptions {
    /// Refresh the index once done.
    pub refresh: Option<bool>,
    /// Version-conflict handling.
    pub conflicts: Option<Conflicts>,
}

impl ByQueryOptions {
    /// Refresh the index once done.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Skip documents that changed while the operation ran.
    pub fn proceed_on_conflicts(mut self) -> Self {
        self.conflicts = Some(Conflicts::Proceed);
        self
    }
}

/// A scripted update applied to every document matching a query.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateByQuery {
    /// Documents to update.
    pub query: Query,
    /// Script run on each document.
    pub script: Script,
    /// Refresh and conflict handling.
    pub options: ByQueryOptions,
}

impl UpdateByQuery {
    /// Run `script` on every document matching `query`.
    pub fn new(query: impl Into<Query>, script: Script) -> Self {
        Self {
            query: query.into(),
            script,
            options: ByQueryOptions::default(),
        }
    }

    /// Set refresh and conflict handling.
    pub fn options(mut self, options: ByQueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Data access for the documents of `E`.
///
/// The index and the wire projection come from the metadata store and are
/// derived again on every call, so later declarations take effect at once.
/// Every operation that needs the index fails with
/// [`ElasticsearchError::MissingDocument`] before reaching the connection
/// when `E` has no document declaration.
///
/// Engine failures propagate unchanged except where an operation documents
/// otherwise.
pub struct Repository<E> {
    connection: Arc<dyn SearchConnection>,
    metadata: Arc<MetadataStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            metadata: Arc::clone(&self.metadata),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::entity_name())
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    /// Repository using the global metadata store.
    pub fn new(connection: Arc<dyn SearchConnection>) -> Self {
        Self::with_metadata(connection, MetadataStore::global())
    }

    /// Repository using `metadata`.
    pub fn with_metadata(
        connection: Arc<dyn SearchConnection>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            connection,
            metadata,
            _entity: PhantomData,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<dyn SearchConnection> {
        &self.connection
    }

    /// The metadata store declarations are read from.
    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    /// Current schema of `E`, if declared.
    pub fn schema(&self) -> Option<SchemaDescriptor> {
        self.metadata.compile::<E>()
    }

    /// Index of `E`.
    pub fn index_name(&self) -> Result<String> {
        self.schema()
            .map(|schema| schema.index)
            .ok_or_else(|| ElasticsearchError::MissingDocument {
                entity: E::entity_name().to_string(),
            })
    }

    /// Project `value` into the wire document of `E`.
    pub fn to_wire_document<T: Serialize + ?Sized>(&self, value: &T) -> Result<Source> {
        to_wire_document::<E, T>(&self.metadata, value)
    }

    // =========================================================================
    // Index lifecycle
    // =========================================================================

    /// Whether the index exists; a not-found answer is `false`.
    pub async fn index_exists(&self) -> Result<bool> {
        let index = self.index_name()?;
        match self.connection.index_exists(&index).await {
            Err(err) if err.is_not_found() => Ok(false),
            other => other,
        }
    }

    /// Create the index from the current schema.
    ///
    /// An index that already exists counts as success. Without a document
    /// declaration this does nothing.
    pub async fn ensure_index(&self) -> Result<()> {
        let Some(schema) = self.schema() else {
            trace!(entity = E::entity_name(), "No document declaration, skipping index creation");
            return Ok(());
        };

        debug!(entity = E::entity_name(), index = %schema.index, "Ensuring index");
        match self.connection.create_index(schema.create_index_request()).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_index_already_exists() => {
                trace!(index = %schema.index, "Index already exists");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Delete the index; a missing index counts as success.
    pub async fn delete_index(&self) -> Result<()> {
        let index = self.index_name()?;
        match self.connection.delete_index(&index).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                trace!(index = %index, "Index already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Make recent writes visible to search.
    pub async fn refresh(&self) -> Result<Value> {
        let index = self.index_name()?;
        self.connection.refresh(&index).await
    }

    // =========================================================================
    // Single document
    // =========================================================================

    /// Write `entity`; the engine assigns an id when `id` is `None`.
    pub async fn index_one(&self, entity: &E, id: Option<&str>) -> Result<Value> {
        self.index_one_with_refresh(entity, id, None).await
    }

    /// Write `entity` with a refresh directive.
    pub async fn index_one_with_refresh(
        &self,
        entity: &E,
        id: Option<&str>,
        refresh: Option<Refresh>,
    ) -> Result<Value> {
        let index = self.index_name()?;
        let document = self.to_wire_document(entity)?;
        self.connection
            .index(IndexRequest {
                index,
                id: id.map(str::to_string),
                document,
                refresh,
            })
            .await
    }

    /// Delete document `id`.
    pub async fn delete_by_id(&self, id: &str) -> Result<Value> {
        let index = self.index_name()?;
        self.connection.delete(&index, id).await
    }

    /// Whether document `id` exists; a not-found answer is `false`.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let index = self.index_name()?;
        match self.connection.exists(&index, id).await {
            Err(err) if err.is_not_found() => Ok(false),
            other => other,
        }
    }

    /// Raw get response for document `id`; a missing document is an error.
    pub async fn find_by_id(&self, id: &str) -> Result<Value> {
        let index = self.index_name()?;
        self.connection.get(&index, id).await
    }

    /// Body of document `id`, or `None` when it does not exist.
    pub async fn find_source_by_id(&self, id: &str) -> Result<Option<Source>> {
        if !self.exists(id).await? {
            return Ok(None);
        }
        let response = self.find_by_id(id).await?;
        Ok(response["_source"].as_object().cloned())
    }

    /// Document `id` as an entity, or `None` when it does not exist.
    pub async fn find_entity_by_id(&self, id: &str) -> Result<Option<E>> {
        self.find_source_by_id(id).await?.map(hydrate::<E>).transpose()
    }

    /// Merge `partial` into document `id`.
    ///
    /// `partial` goes through [`Self::to_wire_document`]: `null` fields are
    /// skipped, not cleared. Use a script to remove a field.
    pub async fn update_by_id<P: Serialize + ?Sized>(
        &self,
        id: &str,
        partial: &P,
    ) -> Result<Value> {
        let body = UpdateBody::doc(self.to_wire_document(partial)?);
        self.send_update(id, body, None).await
    }

    /// Merge `partial` into document `id`, creating it from `partial` when missing.
    pub async fn upsert_by_id<P: Serialize + ?Sized>(
        &self,
        id: &str,
        partial: &P,
    ) -> Result<Value> {
        let body = UpdateBody::doc_as_upsert(self.to_wire_document(partial)?);
        self.send_update(id, body, None).await
    }

    /// Run `script` on document `id`.
    pub async fn update_by_id_script(&self, id: &str, script: Script) -> Result<Value> {
        self.send_update(id, UpdateBody::script(script), None).await
    }

    /// Run `script` on document `id`, creating it from `upsert` when missing.
    pub async fn update_by_id_script_with_upsert<U: Serialize + ?Sized>(
        &self,
        id: &str,
        script: Script,
        upsert: &U,
    ) -> Result<Value> {
        let body = UpdateBody::script_with_upsert(script, self.to_wire_document(upsert)?);
        self.send_update(id, body, None).await
    }

    /// [`Self::update_by_id`], then read the document back.
    ///
    /// `refresh` applies to the update only.
    pub async fn update_by_id_and_get_source<P: Serialize + ?Sized>(
        &self,
        id: &str,
        partial: &P,
        refresh: Option<Refresh>,
    ) -> Result<Option<Source>> {
        let body = UpdateBody::doc(self.to_wire_document(partial)?);
        self.send_update(id, body, refresh).await?;
        self.find_source_by_id(id).await
    }

    /// [`Self::upsert_by_id`], then read the document back.
    ///
    /// `refresh` applies to the upsert only.
    pub async fn upsert_by_id_and_get_source<P: Serialize + ?Sized>(
        &self,
        id: &str,
        partial: &P,
        refresh: Option<Refresh>,
    ) -> Result<Option<Source>> {
        let body = UpdateBody::doc_as_upsert(self.to_wire_document(partial)?);
        self.send_update(id, body, refresh).await?;
        self.find_source_by_id(id).await
    }

    /// [`Self::update_by_id_script`], then read the document back.
    ///
    /// `refresh` applies to the update only.
    pub async fn update_by_id_script_and_get_source(
        &self,
        id: &str,
        script: Script,
        refresh: Option<Refresh>,
    ) -> Result<Option<Source>> {
        self.send_update(id, UpdateBody::script(script), refresh).await?;
        self.find_source_by_id(id).await
    }

    async fn send_update(
        &self,
        id: &str,
        body: UpdateBody,
        refresh: Option<Refresh>,
    ) -> Result<Value> {
        let index = self.index_name()?;
        self.connection
            .update(UpdateRequest {
                index,
                id: id.to_string(),
                body,
                refresh,
            })
            .await
    }

    // =========================================================================
    // Bulk
    // =========================================================================

    /// Index every item in one batch.
    pub async fn bulk_index(&self, items: &[BulkIndex<'_, E>]) -> Result<BulkResponse> {
        if items.is_empty() {
            return Ok(BulkResponse::empty());
        }

        let index = self.index_name()?;
        let mut lines = Vec::with_capacity(items.len() * 2);
        for item in items {
            lines.push(action_line("index", &index, item.id));
            lines.push(Value::Object(self.to_wire_document(item.doc)?));
        }
        self.send_bulk(index, lines).await
    }

    /// Delete every id in one batch.
    pub async fn bulk_delete_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<BulkResponse> {
        if ids.is_empty() {
            return Ok(BulkResponse::empty());
        }

        let index = self.index_name()?;
        let lines = ids
            .iter()
            .map(|id| action_line("delete", &index, Some(id.as_ref())))
            .collect();
        self.send_bulk(index, lines).await
    }

    /// Apply every partial update in one batch.
    pub async fn bulk_update_by_ids<P: Serialize>(
        &self,
        items: &[BulkUpdate<'_, P>],
    ) -> Result<BulkResponse> {
        if items.is_empty() {
            return Ok(BulkResponse::empty());
        }

        let index = self.index_name()?;
        let mut lines = Vec::with_capacity(items.len() * 2);
        for item in items {
            lines.push(action_line("update", &index, Some(item.id)));
            lines.push(update_line(self.to_wire_document(item.doc)?, item.upsert));
        }
        self.send_bulk(index, lines).await
    }

    async fn send_bulk(&self, index: String, lines: Vec<Value>) -> Result<BulkResponse> {
        debug!(entity = E::entity_name(), index = %index, lines = lines.len(), "Bulk request");
        let raw = self
            .connection
            .bulk(BulkRequest {
                index,
                lines,
                refresh: None,
            })
            .await?;
        Ok(BulkResponse::from_value(raw))
    }

    /// Bodies of several documents, aligned with `ids`.
    ///
    /// A slot is `None` when its document was not found.
    pub async fn mget_sources<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Option<Source>>> {
        let index = self.index_name()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
        let response = self.connection.mget(&index, &ids).await?;

        let mut found: HashMap<&str, &Source> = HashMap::new();
        for doc in response["docs"].as_array().into_iter().flatten() {
            if !doc["found"].as_bool().unwrap_or(false) {
                continue;
            }
            if let (Some(id), Some(source)) = (doc["_id"].as_str(), doc["_source"].as_object()) {
                found.insert(id, source);
            }
        }

        Ok(ids
            .iter()
            .map(|id| found.get(id.as_str()).map(|source| (*source).clone()))
            .collect())
    }

    // =========================================================================
    // Query-based
    // =========================================================================

    /// Number of documents, optionally restricted by `query`.
    ///
    /// A response without a numeric `count` is a serialization error.
    pub async fn count(&self, query: Option<Query>) -> Result<u64> {
        let index = self.index_name()?;
        let response = self
            .connection
            .count(&index, query.map(|query| query.to_value()))
            .await?;
        Ok(serde_json::from_value(response.get("count").cloned().unwrap_or_default())?)
    }

    /// Delete every document matching `query`.
    pub async fn delete_by_query(&self, query: Query, options: ByQueryOptions) -> Result<Value> {
        let index = self.index_name()?;
        let request = by_query_request(index, query_body(Some(query.to_value())), options);
        self.connection.delete_by_query(request).await
    }

    /// Update-by-query with a caller-built body.
    pub async fn update_by_query_raw(&self, body: Value, options: ByQueryOptions) -> Result<Value> {
        let index = self.index_name()?;
        self.connection
            .update_by_query(by_query_request(index, body, options))
            .await
    }

    /// Run a script on every document matching a query.
    pub async fn update_by_query_script(&self, update: UpdateByQuery) -> Result<Value> {
        let body = json!({
            "query": update.query.to_value(),
            "script": serde_json::to_value(&update.script)?,
        });
        self.update_by_query_raw(body, update.options).await
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Full search response.
    pub async fn search(&self, params: SearchParams) -> Result<SearchResponse> {
        let index = self.index_name()?;
        debug!(entity = E::entity_name(), index = %index, "Searching");
        let raw = self.connection.search(params.to_request(index)).await?;
        Ok(SearchResponse::from_value(&raw))
    }

    /// Bodies of the hits; hits without a body are dropped.
    pub async fn search_sources(&self, params: SearchParams) -> Result<Vec<Source>> {
        let response = self.search(params).await?;
        Ok(response.hits.into_iter().filter_map(|hit| hit.source).collect())
    }

    /// Ids of the hits; empty ids are dropped.
    pub async fn search_ids(&self, params: SearchParams) -> Result<Vec<String>> {
        let response = self.search(params).await?;
        Ok(response
            .hits
            .into_iter()
            .map(|hit| hit.id)
            .filter(|id| !id.is_empty())
            .collect())
    }

    /// Body of the first hit.
    pub async fn search_first_source(&self, params: SearchParams) -> Result<Option<Source>> {
        Ok(self.search_sources(params.size(1)).await?.into_iter().next())
    }

    /// Bodies of the hits with their id, index and score.
    pub async fn search_sources_with_meta(
        &self,
        params: SearchParams,
    ) -> Result<Vec<DocumentWithMeta<Source>>> {
        let response = self.search(params).await?;
        Ok(response
            .hits
            .into_iter()
            .filter_map(|hit| {
                hit.source.map(|doc| DocumentWithMeta {
                    doc,
                    meta: DocumentMeta {
                        id: hit.id,
                        index: hit.index,
                        score: hit.score,
                    },
                })
            })
            .collect())
    }

    /// Body of the first hit with its id, index and score.
    pub async fn search_first_source_with_meta(
        &self,
        params: SearchParams,
    ) -> Result<Option<DocumentWithMeta<Source>>> {
        Ok(self
            .search_sources_with_meta(params.size(1))
            .await?
            .into_iter()
            .next())
    }

    /// Hits as entities.
    pub async fn search_entities(&self, params: SearchParams) -> Result<Vec<E>> {
        self.search_sources(params)
            .await?
            .into_iter()
            .map(hydrate::<E>)
            .collect()
    }

    /// First hit as an entity.
    pub async fn search_first_entity(&self, params: SearchParams) -> Result<Option<E>> {
        self.search_first_source(params).await?.map(hydrate::<E>).transpose()
    }
}

fn by_query_request(index: String, body: Value, options: ByQueryOptions) -> ByQueryRequest {
    ByQueryRequest {
        refresh: options.refresh,
        conflicts: options.conflicts,
        ..ByQueryRequest::new(index, body)
    }
}
