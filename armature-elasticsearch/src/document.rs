//! Entity trait and the entity/wire-document projection.

use crate::{
    error::{ElasticsearchError, Result},
    metadata::MetadataStore,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::any::type_name;
use tracing::trace;

/// A type stored as documents in an index.
///
/// The index, fields and settings come from the declarations registered in a
/// [`MetadataStore`], not from this trait.
///
/// # Example
///
/// ```rust
/// use armature_elasticsearch::{DocumentOptions, Entity, FieldOptions, declare};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// #[serde(default)]
/// struct Product {
///     id: String,
///     name: String,
///     price: Option<f64>,
/// }
///
/// impl Entity for Product {}
///
/// declare::<Product>()
///     .document(DocumentOptions::new("products"))
///     .field("id", FieldOptions::keyword())
///     .field("name", FieldOptions::text())
///     .field("price", FieldOptions::double());
///
/// assert_eq!(Product::entity_name(), "Product");
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name used in provider tokens; defaults to the unqualified type name.
    fn entity_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Build an entity from a stored document body.
    ///
    /// The default deserializes with serde. Override it when the type has to
    /// go through its own constructor.
    fn from_source(source: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(source))
            .map_err(|e| ElasticsearchError::Hydration(e.to_string()))
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

/// Project `value` into the wire document of `E`.
///
/// `value` may be an entity or any partial of one. When `E` declares no
/// fields the serialized object is returned whole. Otherwise only declared
/// fields are copied, each read from and written to its dotted path; fields
/// that are absent or `null` are left out, so a partial cannot clear a field
/// by setting it to `null`.
pub fn to_wire_document<E, T>(store: &MetadataStore, value: &T) -> Result<Map<String, Value>>
where
    E: 'static,
    T: Serialize + ?Sized,
{
    let source = match serde_json::to_value(value)? {
        Value::Object(map) => map,
        other => {
            return Err(ElasticsearchError::Projection(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            )));
        }
    };

    let fields = match store.fields::<E>() {
        Some(fields) if !fields.is_empty() => fields,
        _ => return Ok(source),
    };

    let mut document = Map::new();
    for name in fields.keys() {
        match get_path(&source, name) {
            Some(Value::Null) => {
                trace!(entity = type_name::<E>(), field = %name, "Dropping null field");
            }
            Some(value) => set_path(&mut document, name, value.clone()),
            None => {}
        }
    }

    Ok(document)
}

/// Build an `E` from a stored document body.
pub fn hydrate<E: Entity>(source: Map<String, Value>) -> Result<E> {
    E::from_source(source)
}

/// Read the value at a dotted path.
pub fn get_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects.
///
/// Intermediate values that are not objects are replaced.
pub fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let mut child = match map.remove(head) {
                Some(Value::Object(child)) => child,
                _ => Map::new(),
            };
            set_path(&mut child, rest, value);
            map.insert(head.to_string(), Value::Object(child));
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Metadata of a document returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    /// Document ID.
    pub id: String,
    /// Index name.
    pub index: String,
    /// Relevance score; `None` when the engine did not score the hit.
    pub score: Option<f64>,
}

/// A document body with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWithMeta<T> {
    /// The document body.
    pub doc: T,
    /// Document metadata.
    pub meta: DocumentMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentOptions, FieldOptions};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Account {
        id: String,
        name: Option<String>,
        secret: Option<String>,
    }

    impl Entity for Account {}

    #[derive(Debug, Serialize, Deserialize)]
    struct Loose {
        a: i32,
        b: i32,
    }

    impl Entity for Loose {}

    mod generic {
        pub struct Wrapper<T>(pub T);
    }

    fn account_store() -> MetadataStore {
        let store = MetadataStore::new();
        store
            .declare::<Account>()
            .document(DocumentOptions::new("accounts"))
            .field("id", FieldOptions::keyword())
            .field("name", FieldOptions::text());
        store
    }

    #[test]
    fn test_entity_name() {
        assert_eq!(Account::entity_name(), "Account");
        assert_eq!(
            short_type_name(std::any::type_name::<generic::Wrapper<Account>>()),
            "Wrapper"
        );
    }

    #[test]
    fn test_projection_drops_undeclared_fields() {
        let account = Account {
            id: "a1".into(),
            name: Some("Ada".into()),
            secret: Some("hunter2".into()),
        };

        let document = to_wire_document::<Account, _>(&account_store(), &account).unwrap();
        assert_eq!(Value::Object(document), json!({ "id": "a1", "name": "Ada" }));
    }

    #[test]
    fn test_projection_omits_missing_fields() {
        let account = Account {
            id: "a2".into(),
            ..Default::default()
        };

        let document = to_wire_document::<Account, _>(&account_store(), &account).unwrap();
        assert_eq!(Value::Object(document), json!({ "id": "a2" }));
    }

    #[test]
    fn test_projection_without_fields_passes_everything() {
        let store = MetadataStore::new();
        let document = to_wire_document::<Loose, _>(&store, &Loose { a: 1, b: 2 }).unwrap();
        assert_eq!(Value::Object(document), json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn test_projection_of_partial_values() {
        let partial = json!({ "name": "Grace", "secret": "nope" });
        let document = to_wire_document::<Account, _>(&account_store(), &partial).unwrap();
        assert_eq!(Value::Object(document), json!({ "name": "Grace" }));
    }

    #[test]
    fn test_projection_follows_dotted_paths() {
        let store = MetadataStore::new();
        store.set_field::<Account>("address.city", FieldOptions::keyword());

        let value = json!({ "address": { "city": "Oslo", "street": "Main" }, "other": 1 });
        let document = to_wire_document::<Account, _>(&store, &value).unwrap();
        assert_eq!(Value::Object(document), json!({ "address": { "city": "Oslo" } }));
    }

    #[test]
    fn test_projection_rejects_non_objects() {
        let err = to_wire_document::<Account, _>(&account_store(), &42).unwrap_err();
        assert!(matches!(err, ElasticsearchError::Projection(_)));
    }

    #[test]
    fn test_hydrate() {
        let source = json!({ "id": "a3", "name": "Linus", "extra": true });
        let account: Account = hydrate(source.as_object().unwrap().clone()).unwrap();
        assert_eq!(account.id, "a3");
        assert_eq!(account.name.as_deref(), Some("Linus"));

        let err = hydrate::<Loose>(Map::new()).unwrap_err();
        assert!(matches!(err, ElasticsearchError::Hydration(_)));
    }

    #[test]
    fn test_paths() {
        let mut map = Map::new();
        set_path(&mut map, "a.b.c", json!(1));
        set_path(&mut map, "a.d", json!(2));
        assert_eq!(Value::Object(map.clone()), json!({ "a": { "b": { "c": 1 }, "d": 2 } }));
        assert_eq!(get_path(&map, "a.b.c"), Some(&json!(1)));
        assert_eq!(get_path(&map, "a.x"), None);
        assert_eq!(get_path(&map, "a.d.e"), None);
    }
}
