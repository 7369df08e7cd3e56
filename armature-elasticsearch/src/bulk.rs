//! Bulk batch items and responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// One document to index in a bulk batch.
#[derive(Debug, Clone, Copy)]
pub struct BulkIndex<'a, E> {
    /// Document id; the engine assigns one when absent.
    pub id: Option<&'a str>,
    /// The entity to write.
    pub doc: &'a E,
}

impl<'a, E> BulkIndex<'a, E> {
    /// Index `doc` under `id`.
    pub fn new(id: &'a str, doc: &'a E) -> Self {
        Self { id: Some(id), doc }
    }

    /// Index `doc` under an engine-assigned id.
    pub fn auto_id(doc: &'a E) -> Self {
        Self { id: None, doc }
    }
}

/// One partial update in a bulk batch.
#[derive(Debug, Clone, Copy)]
pub struct BulkUpdate<'a, P: ?Sized> {
    /// Document id.
    pub id: &'a str,
    /// Partial document, projected like a full entity.
    pub doc: &'a P,
    /// Create the document from `doc` when it is missing.
    pub upsert: bool,
}

impl<'a, P: ?Sized> BulkUpdate<'a, P> {
    /// Merge `doc` into document `id`.
    pub fn new(id: &'a str, doc: &'a P) -> Self {
        Self {
            id,
            doc,
            upsert: false,
        }
    }

    /// Merge `doc` into document `id`, creating it when missing.
    pub fn upsert(id: &'a str, doc: &'a P) -> Self {
        Self {
            id,
            doc,
            upsert: true,
        }
    }
}

/// Action line of a bulk operation.
pub(crate) fn action_line(action: &str, index: &str, id: Option<&str>) -> Value {
    let mut meta = Map::new();
    meta.insert("_index".to_string(), json!(index));
    if let Some(id) = id {
        meta.insert("_id".to_string(), json!(id));
    }
    json!({ action: meta })
}

/// Source line of a bulk update.
pub(crate) fn update_line(doc: Map<String, Value>, upsert: bool) -> Value {
    if upsert {
        json!({ "doc": doc, "doc_as_upsert": true })
    } else {
        json!({ "doc": doc })
    }
}

/// Response of a bulk batch.
///
/// Per-item failures are reported here, never as an error of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkResponse {
    /// Time taken in milliseconds.
    pub took: u64,
    /// Whether any item failed.
    pub errors: bool,
    /// Per-item results in submission order.
    pub items: Vec<BulkItem>,
    /// The response body as returned by the engine.
    pub raw: Value,
}

impl BulkResponse {
    /// Response of a batch that was never sent.
    pub fn empty() -> Self {
        Self {
            took: 0,
            errors: false,
            items: Vec::new(),
            raw: json!({ "took": 0, "errors": false, "items": [] }),
        }
    }

    /// Parse a raw bulk response body.
    ///
    /// An item that cannot be read is kept in place as [`BulkItem::Unknown`].
    pub fn from_value(raw: Value) -> Self {
        let items = raw["items"]
            .as_array()
            .map(|items| items.iter().map(BulkItem::from_value).collect())
            .unwrap_or_default();

        Self {
            took: raw["took"].as_u64().unwrap_or(0),
            errors: raw["errors"].as_bool().unwrap_or(false),
            items,
            raw,
        }
    }

    /// Items that did not succeed, including unreadable ones.
    pub fn failed_items(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|item| !item.is_success())
    }
}

/// Result of one bulk item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItem {
    /// Index result.
    Index(BulkItemStatus),
    /// Create result.
    Create(BulkItemStatus),
    /// Update result.
    Update(BulkItemStatus),
    /// Delete result.
    Delete(BulkItemStatus),
    /// An item the engine sent in a shape this crate cannot read.
    #[serde(skip)]
    Unknown(Value),
}

impl BulkItem {
    fn from_value(item: &Value) -> Self {
        serde_json::from_value(item.clone()).unwrap_or_else(|_| Self::Unknown(item.clone()))
    }

    /// Status of the item, whatever the action; `None` for unknown items.
    pub fn status(&self) -> Option<&BulkItemStatus> {
        match self {
            Self::Index(status)
            | Self::Create(status)
            | Self::Update(status)
            | Self::Delete(status) => Some(status),
            Self::Unknown(_) => None,
        }
    }

    /// Whether the item succeeded; unknown items never do.
    pub fn is_success(&self) -> bool {
        self.status().is_some_and(BulkItemStatus::is_success)
    }
}

/// Status of a bulk item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemStatus {
    /// Index name.
    #[serde(rename = "_index", default)]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Outcome (`created`, `updated`, `deleted`, `not_found`, ...).
    #[serde(default)]
    pub result: Option<String>,
    /// HTTP status of the item.
    pub status: u16,
    /// Failure details.
    #[serde(default)]
    pub error: Option<BulkItemError>,
}

impl BulkItemStatus {
    /// Whether the item succeeded.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure details of a bulk item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error reason.
    #[serde(default)]
    pub reason: String,
}
