//! Query tree used by search, count and by-query operations.
//!
//! Common query shapes are typed; [`Query::Raw`] carries anything else to the
//! engine unchanged.
//!
//! ```
//! use armature_elasticsearch::Query;
//! use serde_json::json;
//!
//! let query = Query::bool()
//!     .must(Query::matches("name", "widget"))
//!     .filter(Query::range("price").gte(5).lt(20))
//!     .must_not(Query::term("status", "retired"))
//!     .build();
//!
//! assert_eq!(query.to_value()["bool"]["filter"][0]["range"]["price"]["gte"], json!(5));
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// A query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Match every document.
    MatchAll,
    /// Full-text match on one field.
    Match {
        /// Field name.
        field: String,
        /// Query text.
        query: String,
        /// `and` / `or`.
        operator: Option<String>,
    },
    /// Full-text match across several fields.
    MultiMatch {
        /// Field names.
        fields: Vec<String>,
        /// Query text.
        query: String,
    },
    /// Exact value.
    Term {
        /// Field name.
        field: String,
        /// Value.
        value: Value,
    },
    /// Any of several exact values.
    Terms {
        /// Field name.
        field: String,
        /// Values.
        values: Vec<Value>,
    },
    /// Documents with the given ids.
    Ids(Vec<String>),
    /// Numeric or date range.
    Range(RangeQuery),
    /// Field prefix.
    Prefix {
        /// Field name.
        field: String,
        /// Prefix.
        value: String,
    },
    /// Wildcard pattern.
    Wildcard {
        /// Field name.
        field: String,
        /// Pattern.
        value: String,
    },
    /// Field has a value.
    Exists(String),
    /// Lucene query string.
    QueryString {
        /// Query text.
        query: String,
        /// Default field.
        default_field: Option<String>,
    },
    /// Boolean combination.
    Bool(BoolQuery),
    /// Query over a nested field.
    Nested {
        /// Nested path.
        path: String,
        /// Inner query.
        query: Box<Query>,
    },
    /// Raw query JSON.
    Raw(Value),
}

impl Query {
    /// Match every document.
    pub fn match_all() -> Self {
        Self::MatchAll
    }

    /// Full-text match.
    pub fn matches(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Match {
            field: field.into(),
            query: query.into(),
            operator: None,
        }
    }

    /// Full-text match requiring every term.
    pub fn matches_all_terms(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Match {
            field: field.into(),
            query: query.into(),
            operator: Some("and".to_string()),
        }
    }

    /// Full-text match across fields.
    pub fn multi_match<I, S>(fields: I, query: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MultiMatch {
            fields: fields.into_iter().map(Into::into).collect(),
            query: query.into(),
        }
    }

    /// Exact value.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Any of several exact values.
    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Documents with the given ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Start a range query.
    pub fn range(field: impl Into<String>) -> RangeQuery {
        RangeQuery::new(field)
    }

    /// Field prefix.
    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Prefix {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Wildcard pattern.
    pub fn wildcard(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Wildcard {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field has a value.
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists(field.into())
    }

    /// Lucene query string.
    pub fn query_string(query: impl Into<String>) -> Self {
        Self::QueryString {
            query: query.into(),
            default_field: None,
        }
    }

    /// Start a bool query.
    pub fn bool() -> BoolQuery {
        BoolQuery::default()
    }

    /// Query over a nested field.
    pub fn nested(path: impl Into<String>, query: Query) -> Self {
        Self::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// Raw query JSON.
    pub fn raw(query: Value) -> Self {
        Self::Raw(query)
    }

    /// Engine JSON for this query.
    pub fn to_value(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Match {
                field,
                query,
                operator: None,
            } => json!({ "match": { field: query } }),
            Self::Match {
                field,
                query,
                operator: Some(operator),
            } => json!({ "match": { field: { "query": query, "operator": operator } } }),
            Self::MultiMatch { fields, query } => {
                json!({ "multi_match": { "query": query, "fields": fields } })
            }
            Self::Term { field, value } => json!({ "term": { field: value } }),
            Self::Terms { field, values } => json!({ "terms": { field: values } }),
            Self::Ids(ids) => json!({ "ids": { "values": ids } }),
            Self::Range(range) => range.to_value(),
            Self::Prefix { field, value } => json!({ "prefix": { field: value } }),
            Self::Wildcard { field, value } => json!({ "wildcard": { field: value } }),
            Self::Exists(field) => json!({ "exists": { "field": field } }),
            Self::QueryString {
                query,
                default_field,
            } => {
                let mut body = json!({ "query": query });
                if let Some(field) = default_field {
                    body["default_field"] = json!(field);
                }
                json!({ "query_string": body })
            }
            Self::Bool(bool_query) => bool_query.to_value(),
            Self::Nested { path, query } => {
                json!({ "nested": { "path": path, "query": query.to_value() } })
            }
            Self::Raw(value) => value.clone(),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<Value> for Query {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

/// Range query; bounds are inclusive (`gte`, `lte`) or exclusive (`gt`, `lt`).
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    field: String,
    bounds: Map<String, Value>,
}

impl RangeQuery {
    /// Range over `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            bounds: Map::new(),
        }
    }

    /// Greater than.
    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.bound("gt", value.into())
    }

    /// Greater than or equal.
    pub fn gte(self, value: impl Into<Value>) -> Self {
        self.bound("gte", value.into())
    }

    /// Less than.
    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.bound("lt", value.into())
    }

    /// Less than or equal.
    pub fn lte(self, value: impl Into<Value>) -> Self {
        self.bound("lte", value.into())
    }

    /// Date format of the bounds.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.bound("format", Value::String(format.into()))
    }

    fn bound(mut self, key: &str, value: Value) -> Self {
        self.bounds.insert(key.to_string(), value);
        self
    }

    fn to_value(&self) -> Value {
        json!({ "range": { &self.field: self.bounds } })
    }
}

impl From<RangeQuery> for Query {
    fn from(range: RangeQuery) -> Self {
        Self::Range(range)
    }
}

/// Boolean combination of queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    must: Vec<Query>,
    should: Vec<Query>,
    must_not: Vec<Query>,
    filter: Vec<Query>,
    minimum_should_match: Option<u32>,
}

impl BoolQuery {
    /// Clause that must match and scores.
    pub fn must(mut self, query: impl Into<Query>) -> Self {
        self.must.push(query.into());
        self
    }

    /// Clause that should match.
    pub fn should(mut self, query: impl Into<Query>) -> Self {
        self.should.push(query.into());
        self
    }

    /// Clause that must not match.
    pub fn must_not(mut self, query: impl Into<Query>) -> Self {
        self.must_not.push(query.into());
        self
    }

    /// Clause that must match without scoring.
    pub fn filter(mut self, query: impl Into<Query>) -> Self {
        self.filter.push(query.into());
        self
    }

    /// How many `should` clauses must match.
    pub fn minimum_should_match(mut self, count: u32) -> Self {
        self.minimum_should_match = Some(count);
        self
    }

    /// Finish the bool query.
    pub fn build(self) -> Query {
        Query::Bool(self)
    }

    fn to_value(&self) -> Value {
        let mut clauses = Map::new();
        for (name, queries) in [
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
            ("filter", &self.filter),
        ] {
            if !queries.is_empty() {
                clauses.insert(
                    name.to_string(),
                    Value::Array(queries.iter().map(Query::to_value).collect()),
                );
            }
        }
        if let Some(count) = self.minimum_should_match {
            clauses.insert("minimum_should_match".to_string(), json!(count));
        }
        json!({ "bool": clauses })
    }
}

impl From<BoolQuery> for Query {
    fn from(bool_query: BoolQuery) -> Self {
        Self::Bool(bool_query)
    }
}
