//! Server-side script payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A script mutation, sent to the engine unmodified.
///
/// ```
/// use armature_elasticsearch::Script;
///
/// let script = Script::new("ctx._source.stock -= params.qty")
///     .lang("painless")
///     .param("qty", 2);
///
/// assert_eq!(
///     serde_json::to_value(&script).unwrap(),
///     serde_json::json!({
///         "source": "ctx._source.stock -= params.qty",
///         "lang": "painless",
///         "params": { "qty": 2 }
///     })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Script source.
    pub source: String,
    /// Script language; the engine default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Named parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl Script {
    /// Script with the given source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            lang: None,
            params: None,
        }
    }

    /// Set the language tag.
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Add a named parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replace all parameters.
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }
}
