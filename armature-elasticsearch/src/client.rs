//! `opensearch`-backed connection.

use crate::{
    config::ConnectionOptions,
    connection::{
        ByQueryRequest, BulkRequest, Conflicts, ConnectionFactory, CreateIndexRequest,
        IndexRequest, Refresh, SearchConnection, SearchRequest, UpdateRequest, query_body,
    },
    error::{ElasticsearchError, Result},
};
use async_trait::async_trait;
use opensearch::{
    BulkParts, CountParts, DeleteByQueryParts, DeleteParts, ExistsParts, GetParts, IndexParts,
    MgetParts, OpenSearch, SearchParts, UpdateByQueryParts, UpdateParts,
    auth::Credentials,
    http::{
        StatusCode, Url,
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesRefreshParts},
    params,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A live connection backed by the `opensearch` client.
#[derive(Clone)]
pub struct OpenSearchConnection {
    name: String,
    client: Arc<OpenSearch>,
    options: Arc<ConnectionOptions>,
}

impl OpenSearchConnection {
    /// Build a connection from options.
    ///
    /// Requests go to the first configured URL.
    pub fn new(name: impl Into<String>, options: ConnectionOptions) -> Result<Self> {
        let name = name.into();
        info!(connection = %name, urls = ?options.urls, "Initializing search connection");

        let url = options
            .urls
            .first()
            .ok_or_else(|| ElasticsearchError::Config(format!("connection `{name}` has no URL")))?;
        if options.urls.len() > 1 {
            warn!(connection = %name, "Multiple URLs configured, only the first is used");
        }

        let url = Url::parse(url)
            .map_err(|e| ElasticsearchError::Config(format!("invalid URL `{url}`: {e}")))?;

        let mut builder = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .timeout(options.request_timeout);

        if options.disable_proxy {
            builder = builder.disable_proxy();
        }

        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
        }

        let transport = builder
            .build()
            .map_err(|e| ElasticsearchError::Config(e.to_string()))?;

        debug!(connection = %name, "Search connection initialized");

        Ok(Self {
            name,
            client: Arc::new(OpenSearch::new(transport)),
            options: Arc::new(options),
        })
    }

    /// Connection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// Options the connection was built from.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }
}

impl std::fmt::Debug for OpenSearchConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchConnection")
            .field("name", &self.name)
            .field("urls", &self.options.urls)
            .finish()
    }
}

/// Read a response body, turning non-success statuses into errors.
async fn read_response(response: Response) -> Result<Value> {
    let status = response.status_code();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if status.is_success() {
        Ok(body)
    } else {
        Err(ElasticsearchError::from_response(status.as_u16(), body))
    }
}

/// Read the status of a HEAD request.
fn read_presence(response: &Response) -> Result<bool> {
    let status = response.status_code();
    if status.is_success() {
        Ok(true)
    } else if status == StatusCode::NOT_FOUND {
        Ok(false)
    } else {
        Err(ElasticsearchError::from_response(status.as_u16(), Value::Null))
    }
}

fn to_refresh(refresh: Refresh) -> params::Refresh {
    match refresh {
        Refresh::True => params::Refresh::True,
        Refresh::False => params::Refresh::False,
        Refresh::WaitFor => params::Refresh::WaitFor,
    }
}

fn to_conflicts(conflicts: Conflicts) -> params::Conflicts {
    match conflicts {
        Conflicts::Abort => params::Conflicts::Abort,
        Conflicts::Proceed => params::Conflicts::Proceed,
    }
}

#[async_trait]
impl SearchConnection for OpenSearchConnection {
    async fn create_index(&self, request: CreateIndexRequest) -> Result<Value> {
        debug!(index = %request.index, "Creating index");
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&request.index))
            .body(request.body())
            .send()
            .await?;
        read_response(response).await
    }

    async fn delete_index(&self, index: &str) -> Result<Value> {
        debug!(index = %index, "Deleting index");
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await?;
        read_response(response).await
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;
        read_presence(&response)
    }

    async fn refresh(&self, index: &str) -> Result<Value> {
        debug!(index = %index, "Refreshing index");
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await?;
        read_response(response).await
    }

    async fn index(&self, request: IndexRequest) -> Result<Value> {
        debug!(index = %request.index, id = ?request.id, "Indexing document");
        let parts = match request.id.as_deref() {
            Some(id) => IndexParts::IndexId(&request.index, id),
            None => IndexParts::Index(&request.index),
        };
        let mut call = self.client.index(parts).body(&request.document);
        if let Some(refresh) = request.refresh {
            call = call.refresh(to_refresh(refresh));
        }
        read_response(call.send().await?).await
    }

    async fn get(&self, index: &str, id: &str) -> Result<Value> {
        let response = self.client.get(GetParts::IndexId(index, id)).send().await?;
        read_response(response).await
    }

    async fn exists(&self, index: &str, id: &str) -> Result<bool> {
        let response = self
            .client
            .exists(ExistsParts::IndexId(index, id))
            .send()
            .await?;
        read_presence(&response)
    }

    async fn update(&self, request: UpdateRequest) -> Result<Value> {
        debug!(index = %request.index, id = %request.id, "Updating document");
        let mut call = self
            .client
            .update(UpdateParts::IndexId(&request.index, &request.id))
            .body(&request.body);
        if let Some(refresh) = request.refresh {
            call = call.refresh(to_refresh(refresh));
        }
        read_response(call.send().await?).await
    }

    async fn delete(&self, index: &str, id: &str) -> Result<Value> {
        debug!(index = %index, id = %id, "Deleting document");
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .send()
            .await?;
        read_response(response).await
    }

    async fn bulk(&self, request: BulkRequest) -> Result<Value> {
        debug!(index = %request.index, lines = request.lines.len(), "Sending bulk batch");
        let body: Vec<JsonBody<Value>> = request.lines.into_iter().map(Into::into).collect();
        let mut call = self
            .client
            .bulk(BulkParts::Index(&request.index))
            .body(body);
        if let Some(refresh) = request.refresh {
            call = call.refresh(to_refresh(refresh));
        }
        read_response(call.send().await?).await
    }

    async fn mget(&self, index: &str, ids: &[String]) -> Result<Value> {
        let response = self
            .client
            .mget(MgetParts::Index(index))
            .body(json!({ "ids": ids }))
            .send()
            .await?;
        read_response(response).await
    }

    async fn search(&self, request: SearchRequest) -> Result<Value> {
        debug!(index = %request.index, "Searching");
        let indices = [request.index.as_str()];
        let mut call = self
            .client
            .search(SearchParts::Index(&indices))
            .body(&request.body);
        if let Some(q) = request.q.as_deref() {
            call = call.q(q);
        }
        read_response(call.send().await?).await
    }

    async fn count(&self, index: &str, query: Option<Value>) -> Result<Value> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .body(query_body(query))
            .send()
            .await?;
        read_response(response).await
    }

    async fn delete_by_query(&self, request: ByQueryRequest) -> Result<Value> {
        debug!(index = %request.index, "Deleting by query");
        let indices = [request.index.as_str()];
        let mut call = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&indices))
            .body(&request.body);
        if let Some(refresh) = request.refresh {
            call = call.refresh(refresh);
        }
        if let Some(conflicts) = request.conflicts {
            call = call.conflicts(to_conflicts(conflicts));
        }
        read_response(call.send().await?).await
    }

    async fn update_by_query(&self, request: ByQueryRequest) -> Result<Value> {
        debug!(index = %request.index, "Updating by query");
        let indices = [request.index.as_str()];
        let mut call = self
            .client
            .update_by_query(UpdateByQueryParts::Index(&indices))
            .body(&request.body);
        if let Some(refresh) = request.refresh {
            call = call.refresh(refresh);
        }
        if let Some(conflicts) = request.conflicts {
            call = call.conflicts(to_conflicts(conflicts));
        }
        read_response(call.send().await?).await
    }

    async fn close(&self) -> Result<()> {
        // The transport holds no session; dropping the last handle releases it.
        debug!(connection = %self.name, "Closing search connection");
        Ok(())
    }
}

/// Factory building [`OpenSearchConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSearchConnectionFactory;

impl ConnectionFactory for OpenSearchConnectionFactory {
    fn connect(
        &self,
        name: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn SearchConnection>> {
        Ok(Arc::new(OpenSearchConnection::new(name, options.clone())?))
    }
}
