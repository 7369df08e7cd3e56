//! Schema compilation from declarations.

use crate::{
    connection::CreateIndexRequest,
    metadata::{FieldMap, MetadataStore},
};
use serde_json::{Map, Value};
use std::any::type_name;
use tracing::trace;

/// Canonical schema of one entity type, derived from its declarations.
///
/// Never cached: compile again to see later declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    /// Index name.
    pub index: String,
    /// Legacy mapping type.
    pub doc_type: Option<String>,
    /// Index settings.
    pub settings: Option<Map<String, Value>>,
    /// Mappings, always carrying a `properties` object built from the fields.
    pub mappings: Map<String, Value>,
    /// Field declarations the `properties` were built from.
    pub fields: FieldMap,
}

impl SchemaDescriptor {
    /// The mapped `properties` object.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.mappings.get("properties").and_then(Value::as_object)
    }

    /// Index-creation payload for this schema.
    pub fn create_index_request(&self) -> CreateIndexRequest {
        CreateIndexRequest {
            index: self.index.clone(),
            settings: self.settings.clone(),
            mappings: self.mappings.clone(),
        }
    }
}

/// Compile the schema of `E` from `store`.
///
/// Returns `None` when `E` has no document declaration; such types opt out of
/// schema management.
pub fn compile<E: 'static>(store: &MetadataStore) -> Option<SchemaDescriptor> {
    let metadata = store.metadata::<E>()?;
    let document = metadata.document?;
    let fields = metadata.fields.unwrap_or_default();

    let mut mappings = document.mappings.unwrap_or_default();
    let properties: Map<String, Value> = fields
        .iter()
        .map(|(name, options)| (name.clone(), options.to_value()))
        .collect();
    mappings.insert("properties".to_string(), Value::Object(properties));

    let settings = metadata
        .index
        .and_then(|index| index.settings)
        .or(document.settings);

    trace!(
        entity = type_name::<E>(),
        index = %document.index,
        fields = fields.len(),
        "Compiled schema"
    );

    Some(SchemaDescriptor {
        index: document.index,
        doc_type: document.doc_type,
        settings,
        mappings,
        fields,
    })
}

impl MetadataStore {
    /// Compile the schema of `E`; see [`compile`].
    pub fn compile<E: 'static>(&self) -> Option<SchemaDescriptor> {
        compile::<E>(self)
    }
}
