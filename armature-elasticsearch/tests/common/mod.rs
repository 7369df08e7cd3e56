//! In-memory search connection for integration tests.

#![allow(dead_code)]

use armature_elasticsearch::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type Documents = BTreeMap<String, Map<String, Value>>;

/// Send crate logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fake cluster that keeps documents in memory and logs every call.
#[derive(Default)]
pub struct MockConnection {
    indices: Mutex<HashMap<String, Documents>>,
    created: Mutex<Vec<CreateIndexRequest>>,
    by_query: Mutex<Vec<ByQueryRequest>>,
    searches: Mutex<Vec<SearchRequest>>,
    bulks: Mutex<Vec<BulkRequest>>,
    updates: Mutex<Vec<UpdateRequest>>,
    calls: Mutex<Vec<String>>,
    failing_indices: Mutex<HashSet<String>>,
    extra_hits: Mutex<Vec<Value>>,
    count_response: Mutex<Option<Value>>,
    fail_close: bool,
    next_id: AtomicU64,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A connection whose `close` fails.
    pub fn failing_close() -> Arc<Self> {
        Arc::new(Self {
            fail_close: true,
            ..Default::default()
        })
    }

    /// Make creating `index` fail with a server error.
    pub fn fail_create(&self, index: &str) {
        self.failing_indices.lock().insert(index.to_string());
    }

    /// Append a raw hit to every search response.
    pub fn push_hit(&self, hit: Value) {
        self.extra_hits.lock().push(hit);
    }

    /// Answer `count` with `response` instead of the stored document count.
    pub fn respond_to_count(&self, response: Value) {
        *self.count_response.lock() = Some(response);
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == operation).count()
    }

    pub fn created_indices(&self) -> Vec<CreateIndexRequest> {
        self.created.lock().clone()
    }

    pub fn by_query_requests(&self) -> Vec<ByQueryRequest> {
        self.by_query.lock().clone()
    }

    pub fn search_requests(&self) -> Vec<SearchRequest> {
        self.searches.lock().clone()
    }

    pub fn bulk_requests(&self) -> Vec<BulkRequest> {
        self.bulks.lock().clone()
    }

    pub fn update_requests(&self) -> Vec<UpdateRequest> {
        self.updates.lock().clone()
    }

    /// Stored document, bypassing the connection interface.
    pub fn stored(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        self.indices.lock().get(index).and_then(|docs| docs.get(id).cloned())
    }

    /// Store a document directly.
    pub fn seed(&self, index: &str, id: &str, doc: Value) {
        let doc = doc.as_object().cloned().unwrap_or_default();
        self.indices
            .lock()
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), doc);
    }

    fn record(&self, operation: &str) {
        self.calls.lock().push(operation.to_string());
    }

    fn generate_id(&self) -> String {
        format!("auto-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn write(&self, index: &str, id: String, doc: Map<String, Value>) -> &'static str {
        let mut indices = self.indices.lock();
        let docs = indices.entry(index.to_string()).or_default();
        match docs.insert(id, doc) {
            Some(_) => "updated",
            None => "created",
        }
    }

    fn apply_update(&self, index: &str, id: &str, body: &Value) -> Result<&'static str> {
        let mut indices = self.indices.lock();
        let docs = indices.entry(index.to_string()).or_default();

        match docs.get_mut(id) {
            Some(existing) => {
                if let Some(patch) = body["doc"].as_object() {
                    merge(existing, patch);
                }
                Ok("updated")
            }
            None => {
                let fallback = if body["doc_as_upsert"].as_bool().unwrap_or(false) {
                    body["doc"].as_object().cloned()
                } else {
                    body["upsert"].as_object().cloned()
                };
                match fallback {
                    Some(doc) => {
                        docs.insert(id.to_string(), doc);
                        Ok("created")
                    }
                    None => Err(ElasticsearchError::from_response(
                        404,
                        json!({
                            "error": {
                                "type": "document_missing_exception",
                                "reason": format!("[{id}]: document missing")
                            },
                            "status": 404
                        }),
                    )),
                }
            }
        }
    }
}

fn merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(patch)) => merge(existing, patch),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn index_not_found(index: &str) -> ElasticsearchError {
    ElasticsearchError::from_response(
        404,
        json!({
            "error": {
                "type": "index_not_found_exception",
                "reason": format!("no such index [{index}]")
            },
            "status": 404
        }),
    )
}

#[async_trait]
impl SearchConnection for MockConnection {
    async fn create_index(&self, request: CreateIndexRequest) -> Result<Value> {
        self.record("create_index");
        if self.failing_indices.lock().contains(&request.index) {
            return Err(ElasticsearchError::from_response(
                500,
                json!({ "error": { "type": "internal_error", "reason": "boom" } }),
            ));
        }

        let mut indices = self.indices.lock();
        if indices.contains_key(&request.index) {
            return Err(ElasticsearchError::from_response(
                400,
                json!({
                    "error": {
                        "type": INDEX_ALREADY_EXISTS,
                        "reason": format!("index [{}] already exists", request.index)
                    },
                    "status": 400
                }),
            ));
        }
        indices.insert(request.index.clone(), Documents::new());
        drop(indices);

        let index = request.index.clone();
        self.created.lock().push(request);
        Ok(json!({ "acknowledged": true, "index": index }))
    }

    async fn delete_index(&self, index: &str) -> Result<Value> {
        self.record("delete_index");
        match self.indices.lock().remove(index) {
            Some(_) => Ok(json!({ "acknowledged": true })),
            None => Err(index_not_found(index)),
        }
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.record("index_exists");
        Ok(self.indices.lock().contains_key(index))
    }

    async fn refresh(&self, _index: &str) -> Result<Value> {
        self.record("refresh");
        Ok(json!({ "_shards": { "failed": 0 } }))
    }

    async fn index(&self, request: IndexRequest) -> Result<Value> {
        self.record("index");
        let id = request.id.clone().unwrap_or_else(|| self.generate_id());
        let result = self.write(&request.index, id.clone(), request.document);
        Ok(json!({ "_index": request.index, "_id": id, "result": result }))
    }

    async fn get(&self, index: &str, id: &str) -> Result<Value> {
        self.record("get");
        match self.stored(index, id) {
            Some(source) => Ok(json!({
                "_index": index,
                "_id": id,
                "found": true,
                "_source": source
            })),
            None => Err(ElasticsearchError::from_response(
                404,
                json!({ "_index": index, "_id": id, "found": false }),
            )),
        }
    }

    async fn exists(&self, index: &str, id: &str) -> Result<bool> {
        self.record("exists");
        Ok(self.stored(index, id).is_some())
    }

    async fn update(&self, request: UpdateRequest) -> Result<Value> {
        self.record("update");
        let body = serde_json::to_value(&request.body)?;
        let result = self.apply_update(&request.index, &request.id, &body)?;
        let response = json!({ "_index": request.index, "_id": request.id, "result": result });
        self.updates.lock().push(request);
        Ok(response)
    }

    async fn delete(&self, index: &str, id: &str) -> Result<Value> {
        self.record("delete");
        let removed = self
            .indices
            .lock()
            .get_mut(index)
            .and_then(|docs| docs.remove(id));
        match removed {
            Some(_) => Ok(json!({ "_index": index, "_id": id, "result": "deleted" })),
            None => Err(ElasticsearchError::from_response(
                404,
                json!({ "_index": index, "_id": id, "result": "not_found" }),
            )),
        }
    }

    async fn bulk(&self, request: BulkRequest) -> Result<Value> {
        self.record("bulk");
        let mut items = Vec::new();
        let mut errors = false;
        let mut lines = request.lines.iter();

        while let Some(action) = lines.next() {
            let Some((kind, meta)) = action.as_object().and_then(|map| map.iter().next()) else {
                continue;
            };
            let index = meta["_index"].as_str().unwrap_or(&request.index).to_string();
            let id = meta["_id"].as_str().map(str::to_string);

            let (id, status, result, error) = match kind.as_str() {
                "index" | "create" => {
                    let doc = lines.next().and_then(Value::as_object).cloned().unwrap_or_default();
                    let id = id.unwrap_or_else(|| self.generate_id());
                    let result = self.write(&index, id.clone(), doc);
                    let status = if result == "created" { 201 } else { 200 };
                    (id, status, result, None)
                }
                "update" => {
                    let body = lines.next().cloned().unwrap_or(Value::Null);
                    let id = id.unwrap_or_default();
                    match self.apply_update(&index, &id, &body) {
                        Ok(result) => (id, 200, result, None),
                        Err(err) => {
                            errors = true;
                            let error = json!({
                                "type": "document_missing_exception",
                                "reason": err.to_string()
                            });
                            (id, 404, "not_found", Some(error))
                        }
                    }
                }
                _ => {
                    let id = id.unwrap_or_default();
                    let removed = self
                        .indices
                        .lock()
                        .get_mut(&index)
                        .and_then(|docs| docs.remove(&id));
                    match removed {
                        Some(_) => (id, 200, "deleted", None),
                        None => (id, 404, "not_found", None),
                    }
                }
            };

            let mut status_body = json!({
                "_index": index,
                "_id": id,
                "result": result,
                "status": status
            });
            if let Some(error) = error {
                status_body["error"] = error;
            }
            items.push(json!({ kind.as_str(): status_body }));
        }

        self.bulks.lock().push(request);
        Ok(json!({ "took": 1, "errors": errors, "items": items }))
    }

    async fn mget(&self, index: &str, ids: &[String]) -> Result<Value> {
        self.record("mget");
        // Answers in reverse order; callers have to align by id.
        let docs: Vec<Value> = ids
            .iter()
            .rev()
            .map(|id| match self.stored(index, id) {
                Some(source) => {
                    json!({ "_index": index, "_id": id, "found": true, "_source": source })
                }
                None => json!({ "_index": index, "_id": id, "found": false }),
            })
            .collect();
        Ok(json!({ "docs": docs }))
    }

    async fn search(&self, request: SearchRequest) -> Result<Value> {
        self.record("search");
        let docs = self
            .indices
            .lock()
            .get(&request.index)
            .cloned()
            .ok_or_else(|| index_not_found(&request.index))?;

        let from = request.body["from"].as_u64().unwrap_or(0) as usize;
        let size = request.body["size"].as_u64().unwrap_or(10) as usize;
        let sorted = request.body.get("sort").is_some();
        let score = if sorted { Value::Null } else { json!(1.0) };

        let mut hits: Vec<Value> = docs
            .iter()
            .skip(from)
            .take(size)
            .map(|(id, source)| {
                json!({ "_index": request.index, "_id": id, "_score": score, "_source": source })
            })
            .collect();
        hits.extend(self.extra_hits.lock().iter().cloned());

        let response = json!({
            "took": 1,
            "timed_out": false,
            "hits": {
                "total": { "value": docs.len(), "relation": "eq" },
                "max_score": score,
                "hits": hits
            }
        });
        self.searches.lock().push(request);
        Ok(response)
    }

    async fn count(&self, index: &str, _query: Option<Value>) -> Result<Value> {
        self.record("count");
        if let Some(response) = self.count_response.lock().clone() {
            return Ok(response);
        }
        let count = self.indices.lock().get(index).map(BTreeMap::len).unwrap_or(0);
        Ok(json!({ "count": count }))
    }

    async fn delete_by_query(&self, request: ByQueryRequest) -> Result<Value> {
        self.record("delete_by_query");
        self.by_query.lock().push(request);
        Ok(json!({ "deleted": 0 }))
    }

    async fn update_by_query(&self, request: ByQueryRequest) -> Result<Value> {
        self.record("update_by_query");
        self.by_query.lock().push(request);
        Ok(json!({ "updated": 0 }))
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        if self.fail_close {
            return Err(ElasticsearchError::Config("close failed".to_string()));
        }
        Ok(())
    }
}

/// Factory handing out mock connections and remembering them by name.
#[derive(Clone, Default)]
pub struct MockFactory {
    connections: Arc<Mutex<HashMap<String, Arc<MockConnection>>>>,
    failing_close: Arc<Mutex<HashSet<String>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections named `name` fail to close.
    pub fn fail_close_for(self, name: &str) -> Self {
        self.failing_close.lock().insert(name.to_string());
        self
    }

    /// The mock built for `name`.
    pub fn connection(&self, name: &str) -> Arc<MockConnection> {
        self.connections
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no connection built for {name}"))
    }

    pub fn built(&self) -> usize {
        self.connections.lock().len()
    }
}

impl ConnectionFactory for MockFactory {
    fn connect(
        &self,
        name: &str,
        _options: &ConnectionOptions,
    ) -> Result<Arc<dyn SearchConnection>> {
        let connection = if self.failing_close.lock().contains(name) {
            MockConnection::failing_close()
        } else {
            MockConnection::new()
        };
        self.connections
            .lock()
            .insert(name.to_string(), Arc::clone(&connection));
        Ok(connection)
    }
}
