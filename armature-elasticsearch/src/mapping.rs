//! Field mapping vocabulary used by field declarations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Engine field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Full-text searchable field.
    Text,
    /// Exact match keyword field.
    Keyword,
    /// 64-bit integer.
    Long,
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    Short,
    /// 8-bit integer.
    Byte,
    /// Double precision float.
    Double,
    /// Single precision float.
    Float,
    /// Scaled float.
    ScaledFloat,
    /// Boolean.
    Boolean,
    /// Date.
    Date,
    /// Binary data.
    Binary,
    /// IP address.
    Ip,
    /// Completion suggester.
    Completion,
    /// Geo point.
    GeoPoint,
    /// Geo shape.
    GeoShape,
    /// Nested object.
    Nested,
    /// Object.
    Object,
    /// Flattened.
    Flattened,
    /// Search-as-you-type.
    SearchAsYouType,
    /// Dense vector.
    DenseVector,
}

impl FieldType {
    /// Engine name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Keyword => "keyword",
            Self::Long => "long",
            Self::Integer => "integer",
            Self::Short => "short",
            Self::Byte => "byte",
            Self::Double => "double",
            Self::Float => "float",
            Self::ScaledFloat => "scaled_float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Ip => "ip",
            Self::Completion => "completion",
            Self::GeoPoint => "geo_point",
            Self::GeoShape => "geo_shape",
            Self::Nested => "nested",
            Self::Object => "object",
            Self::Flattened => "flattened",
            Self::SearchAsYouType => "search_as_you_type",
            Self::DenseVector => "dense_vector",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options attached to one declared field.
///
/// This is the engine's own field mapping object (`type`, `analyzer`,
/// `properties`, `fields`, ...). The typed constructors cover the common
/// cases; [`FieldOptions::option`] and [`FieldOptions::raw`] accept anything
/// else verbatim.
///
/// ```
/// use armature_elasticsearch::{FieldOptions, FieldType};
///
/// let title = FieldOptions::text()
///     .analyzer("english")
///     .multi_field("raw", FieldOptions::keyword());
///
/// assert_eq!(title.field_type(), Some("text"));
/// assert_eq!(title.to_value()["fields"]["raw"]["type"], "keyword");
/// # let _ = FieldType::Text;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldOptions(Map<String, Value>);

impl FieldOptions {
    /// Options for a field of the given type.
    pub fn new(field_type: FieldType) -> Self {
        Self::default().option("type", field_type.as_str())
    }

    /// Options taken verbatim from a JSON object.
    ///
    /// Non-object values yield empty options.
    pub fn raw(options: Value) -> Self {
        match options {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Text field.
    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    /// Keyword field.
    pub fn keyword() -> Self {
        Self::new(FieldType::Keyword)
    }

    /// Long field.
    pub fn long() -> Self {
        Self::new(FieldType::Long)
    }

    /// Integer field.
    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    /// Double field.
    pub fn double() -> Self {
        Self::new(FieldType::Double)
    }

    /// Float field.
    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    /// Boolean field.
    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    /// Date field.
    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    /// Object field.
    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    /// Nested field.
    pub fn nested() -> Self {
        Self::new(FieldType::Nested)
    }

    /// Set an arbitrary option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set the analyzer.
    pub fn analyzer(self, analyzer: impl Into<String>) -> Self {
        self.option("analyzer", analyzer.into())
    }

    /// Set the search analyzer.
    pub fn search_analyzer(self, analyzer: impl Into<String>) -> Self {
        self.option("search_analyzer", analyzer.into())
    }

    /// Set the date format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.option("format", format.into())
    }

    /// Whether the field is indexed.
    pub fn index(self, enabled: bool) -> Self {
        self.option("index", enabled)
    }

    /// Add a sub-property (object and nested fields).
    pub fn property(mut self, name: impl Into<String>, field: FieldOptions) -> Self {
        self.insert_child("properties", name.into(), field);
        self
    }

    /// Add a multi-field, e.g. a `keyword` companion of a `text` field.
    pub fn multi_field(mut self, name: impl Into<String>, field: FieldOptions) -> Self {
        self.insert_child("fields", name.into(), field);
        self
    }

    /// The declared `type`, if any.
    pub fn field_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Borrow the options as a JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Options as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Consume into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn insert_child(&mut self, key: &str, name: String, field: FieldOptions) {
        let mut children = match self.0.remove(key) {
            Some(Value::Object(children)) => children,
            _ => Map::new(),
        };
        children.insert(name, field.into_value());
        self.0.insert(key.to_string(), Value::Object(children));
    }
}

impl From<FieldType> for FieldOptions {
    fn from(field_type: FieldType) -> Self {
        Self::new(field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_constructors() {
        assert_eq!(FieldOptions::keyword().to_value(), json!({ "type": "keyword" }));
        assert_eq!(FieldOptions::double().field_type(), Some("double"));
        assert_eq!(FieldType::SearchAsYouType.to_string(), "search_as_you_type");
    }

    #[test]
    fn test_nested_properties() {
        let address = FieldOptions::object()
            .property("city", FieldOptions::keyword())
            .property("zip", FieldOptions::keyword().index(false));

        assert_eq!(
            address.to_value(),
            json!({
                "type": "object",
                "properties": {
                    "city": { "type": "keyword" },
                    "zip": { "type": "keyword", "index": false }
                }
            })
        );
    }

    #[test]
    fn test_raw_options_pass_through() {
        let field = FieldOptions::raw(json!({ "type": "dense_vector", "dims": 384 }));
        assert_eq!(field.as_map()["dims"], 384);
        assert_eq!(FieldOptions::raw(json!("nope")), FieldOptions::default());
    }
}
