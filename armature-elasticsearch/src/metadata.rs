//! Per-type declaration registry.
//!
//! Entity types declare their index, fields and index settings once, when the
//! application sets up its types. The store only keeps those declarations;
//! [`MetadataStore::compile`] turns them into a schema on demand.
//!
//! ```
//! use armature_elasticsearch::{DocumentOptions, FieldOptions, MetadataStore};
//!
//! struct Product;
//!
//! let store = MetadataStore::new();
//! store
//!     .declare::<Product>()
//!     .document(DocumentOptions::new("products"))
//!     .field("id", FieldOptions::keyword())
//!     .field("name", FieldOptions::text());
//!
//! assert_eq!(store.document::<Product>().unwrap().index, "products");
//! assert_eq!(store.fields::<Product>().unwrap().len(), 2);
//! ```

use crate::mapping::FieldOptions;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{trace, warn};

static GLOBAL: Lazy<Arc<MetadataStore>> = Lazy::new(|| Arc::new(MetadataStore::new()));

/// Field declarations of one type, keyed by property name.
pub type FieldMap = BTreeMap<String, FieldOptions>;

/// Document-level declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentOptions {
    /// Index name.
    pub index: String,
    /// Index settings.
    pub settings: Option<Map<String, Value>>,
    /// Top-level mapping keys (`dynamic`, `_source`, ...).
    pub mappings: Option<Map<String, Value>>,
    /// Legacy mapping type.
    pub doc_type: Option<String>,
}

impl DocumentOptions {
    /// Declare the index a type is stored in.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            ..Default::default()
        }
    }

    /// Set index settings.
    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = Some(object_or_empty("settings", settings));
        self
    }

    /// Set top-level mapping keys.
    ///
    /// A `properties` key here is replaced by the field declarations.
    pub fn mappings(mut self, mappings: Value) -> Self {
        self.mappings = Some(object_or_empty("mappings", mappings));
        self
    }

    /// Set the legacy mapping type.
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }
}

/// Index-level declaration, independent of the document declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    /// Index name.
    pub name: String,
    /// Index settings; these win over the document declaration's settings.
    pub settings: Option<Map<String, Value>>,
}

impl IndexOptions {
    /// Declare index options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: None,
        }
    }

    /// Set index settings.
    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = Some(object_or_empty("settings", settings));
        self
    }
}

fn object_or_empty(what: &str, value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            warn!(kind = what, value = %other, "Ignoring non-object declaration value");
            Map::new()
        }
    }
}

/// All declarations attached to one type.
#[derive(Debug, Clone, Default)]
pub struct EntityMetadata {
    /// Document declaration.
    pub document: Option<DocumentOptions>,
    /// Field declarations.
    pub fields: Option<FieldMap>,
    /// Index declaration.
    pub index: Option<IndexOptions>,
}

/// Process-wide registry of declarations keyed by Rust type.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: RwLock<HashMap<TypeId, EntityMetadata>>,
}

impl MetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The store shared by the whole process.
    pub fn global() -> Arc<MetadataStore> {
        GLOBAL.clone()
    }

    /// Start a fluent declaration for `E`.
    pub fn declare<E: 'static>(&self) -> Declaration<'_, E> {
        Declaration {
            store: self,
            _entity: PhantomData,
        }
    }

    /// Attach (or replace) the document declaration of `E`.
    pub fn set_document<E: 'static>(&self, options: DocumentOptions) {
        trace!(entity = type_name::<E>(), index = %options.index, "Declaring document");
        self.entries
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .document = Some(options);
    }

    /// Declare one field of `E`, replacing any earlier options for it.
    pub fn set_field<E: 'static>(&self, property: impl Into<String>, options: FieldOptions) {
        let property = property.into();
        trace!(entity = type_name::<E>(), field = %property, "Declaring field");
        self.entries
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .fields
            .get_or_insert_with(FieldMap::new)
            .insert(property, options);
    }

    /// Attach (or replace) the index declaration of `E`.
    pub fn set_index<E: 'static>(&self, options: IndexOptions) {
        trace!(entity = type_name::<E>(), index = %options.name, "Declaring index");
        self.entries
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .index = Some(options);
    }

    /// Document declaration of `E`.
    pub fn document<E: 'static>(&self) -> Option<DocumentOptions> {
        self.read::<E, _>(|meta| meta.document.clone())
    }

    /// Field declarations of `E`.
    pub fn fields<E: 'static>(&self) -> Option<FieldMap> {
        self.read::<E, _>(|meta| meta.fields.clone())
    }

    /// Index declaration of `E`.
    pub fn index<E: 'static>(&self) -> Option<IndexOptions> {
        self.read::<E, _>(|meta| meta.index.clone())
    }

    /// Snapshot of every declaration of `E`.
    pub fn metadata<E: 'static>(&self) -> Option<EntityMetadata> {
        self.read::<E, _>(|meta| Some(meta.clone()))
    }

    fn read<E: 'static, T>(&self, f: impl FnOnce(&EntityMetadata) -> Option<T>) -> Option<T> {
        self.entries.read().get(&TypeId::of::<E>()).and_then(f)
    }
}

/// Fluent declaration for one type.
pub struct Declaration<'a, E> {
    store: &'a MetadataStore,
    _entity: PhantomData<fn() -> E>,
}

impl<E: 'static> Declaration<'_, E> {
    /// Declare the document.
    pub fn document(self, options: DocumentOptions) -> Self {
        self.store.set_document::<E>(options);
        self
    }

    /// Declare a field.
    pub fn field(self, property: impl Into<String>, options: impl Into<FieldOptions>) -> Self {
        self.store.set_field::<E>(property, options.into());
        self
    }

    /// Declare index options.
    pub fn index(self, options: IndexOptions) -> Self {
        self.store.set_index::<E>(options);
        self
    }
}

/// Start a fluent declaration for `E` in the global store.
pub fn declare<E: 'static>() -> Declaration<'static, E> {
    Declaration {
        store: &**GLOBAL,
        _entity: PhantomData,
    }
}
