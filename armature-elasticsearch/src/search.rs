//! Search parameters and typed search responses.

use crate::{connection::SearchRequest, error::Result, query::Query};
use serde_json::{Map, Value, json};

/// Parameters of a search.
///
/// Either a structured [`Query`] or a simple query string (`q`) selects the
/// documents; both may be omitted to match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    query: Option<Query>,
    q: Option<String>,
    from: Option<u64>,
    size: Option<u64>,
    sort: Vec<Value>,
    aggregations: Map<String, Value>,
    track_total_hits: Option<bool>,
}

impl SearchParams {
    /// Empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters with a structured query.
    pub fn with_query(query: impl Into<Query>) -> Self {
        Self::new().query(query)
    }

    /// Set the structured query.
    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set a simple query string.
    pub fn q(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    /// Pagination offset.
    pub fn from(mut self, from: u64) -> Self {
        self.from = Some(from);
        self
    }

    /// Maximum number of hits.
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sort on a field.
    pub fn sort_by(self, field: impl Into<String>, order: SortOrder) -> Self {
        let field: String = field.into();
        self.sort(json!({ field: { "order": order.as_str() } }))
    }

    /// Sort by relevance.
    pub fn sort_by_score(self, order: SortOrder) -> Self {
        self.sort_by("_score", order)
    }

    /// Append a raw sort clause.
    pub fn sort(mut self, clause: Value) -> Self {
        match clause {
            Value::Array(clauses) => self.sort.extend(clauses),
            clause => self.sort.push(clause),
        }
        self
    }

    /// Add a named aggregation.
    pub fn aggregation(mut self, name: impl Into<String>, aggregation: Aggregation) -> Self {
        self.aggregations.insert(name.into(), aggregation.to_value());
        self
    }

    /// Add a raw named aggregation.
    pub fn raw_aggregation(mut self, name: impl Into<String>, aggregation: Value) -> Self {
        self.aggregations.insert(name.into(), aggregation);
        self
    }

    /// Count every hit instead of stopping at the engine's default cap.
    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    /// Requested size, if any.
    pub fn requested_size(&self) -> Option<u64> {
        self.size
    }

    /// Search body (`query`, `from`, `size`, `sort`, `aggs`, `track_total_hits`).
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();

        if let Some(query) = &self.query {
            body.insert("query".to_string(), query.to_value());
        }
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        if !self.sort.is_empty() {
            body.insert("sort".to_string(), Value::Array(self.sort.clone()));
        }
        if !self.aggregations.is_empty() {
            body.insert("aggs".to_string(), Value::Object(self.aggregations.clone()));
        }
        if let Some(track) = self.track_total_hits {
            body.insert("track_total_hits".to_string(), json!(track));
        }

        Value::Object(body)
    }

    /// Request against `index`.
    pub fn to_request(&self, index: impl Into<String>) -> SearchRequest {
        SearchRequest {
            index: index.into(),
            body: self.to_body(),
            q: self.q.clone(),
        }
    }
}

impl From<Query> for SearchParams {
    fn from(query: Query) -> Self {
        Self::with_query(query)
    }
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Aggregation definitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Terms aggregation.
    Terms {
        /// Field to bucket on.
        field: String,
        /// Maximum number of buckets.
        size: Option<u64>,
    },
    /// Date histogram aggregation.
    DateHistogram {
        /// Date field.
        field: String,
        /// Calendar interval (`day`, `month`, ...).
        calendar_interval: String,
    },
    /// Average.
    Avg(String),
    /// Sum.
    Sum(String),
    /// Minimum.
    Min(String),
    /// Maximum.
    Max(String),
    /// Unique value count.
    Cardinality(String),
}

impl Aggregation {
    /// Terms aggregation.
    pub fn terms(field: impl Into<String>) -> Self {
        Self::Terms {
            field: field.into(),
            size: None,
        }
    }

    /// Terms aggregation with a bucket cap.
    pub fn terms_with_size(field: impl Into<String>, size: u64) -> Self {
        Self::Terms {
            field: field.into(),
            size: Some(size),
        }
    }

    /// Date histogram aggregation.
    pub fn date_histogram(field: impl Into<String>, calendar_interval: impl Into<String>) -> Self {
        Self::DateHistogram {
            field: field.into(),
            calendar_interval: calendar_interval.into(),
        }
    }

    /// Average.
    pub fn avg(field: impl Into<String>) -> Self {
        Self::Avg(field.into())
    }

    /// Sum.
    pub fn sum(field: impl Into<String>) -> Self {
        Self::Sum(field.into())
    }

    /// Engine JSON for this aggregation.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Terms { field, size } => {
                let mut terms = json!({ "field": field });
                if let Some(size) = size {
                    terms["size"] = json!(size);
                }
                json!({ "terms": terms })
            }
            Self::DateHistogram {
                field,
                calendar_interval,
            } => json!({
                "date_histogram": { "field": field, "calendar_interval": calendar_interval }
            }),
            Self::Avg(field) => json!({ "avg": { "field": field } }),
            Self::Sum(field) => json!({ "sum": { "field": field } }),
            Self::Min(field) => json!({ "min": { "field": field } }),
            Self::Max(field) => json!({ "max": { "field": field } }),
            Self::Cardinality(field) => json!({ "cardinality": { "field": field } }),
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<T> {
    /// Document ID; empty when the engine sent none.
    pub id: String,
    /// Index the hit came from.
    pub index: String,
    /// Relevance score; `None` when the engine did not score the hit.
    pub score: Option<f64>,
    /// Document body; `None` when the hit carried no source.
    pub source: Option<T>,
}

/// A parsed search response.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse<T = Map<String, Value>> {
    /// Time taken in milliseconds.
    pub took: u64,
    /// Whether the search timed out.
    pub timed_out: bool,
    /// Total matching documents.
    pub total: u64,
    /// `eq` or `gte`.
    pub total_relation: String,
    /// Highest score among the hits.
    pub max_score: Option<f64>,
    /// Hits in engine order.
    pub hits: Vec<SearchHit<T>>,
    /// Aggregation results, when requested.
    pub aggregations: Option<Map<String, Value>>,
}

impl SearchResponse {
    /// Parse a raw search response body.
    ///
    /// Missing parts default to empty; a hit whose `_source` is absent or not
    /// an object has no source.
    pub fn from_value(value: &Value) -> Self {
        let hits_section = &value["hits"];

        // Older engines report the total as a bare number.
        let (total, total_relation) = match &hits_section["total"] {
            Value::Number(n) => (n.as_u64().unwrap_or(0), "eq".to_string()),
            total => (
                total["value"].as_u64().unwrap_or(0),
                total["relation"].as_str().unwrap_or("eq").to_string(),
            ),
        };

        let hits = hits_section["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .map(|hit| SearchHit {
                        id: hit["_id"].as_str().unwrap_or_default().to_string(),
                        index: hit["_index"].as_str().unwrap_or_default().to_string(),
                        score: hit["_score"].as_f64(),
                        source: hit["_source"].as_object().cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            took: value["took"].as_u64().unwrap_or(0),
            timed_out: value["timed_out"].as_bool().unwrap_or(false),
            total,
            total_relation,
            max_score: hits_section["max_score"].as_f64(),
            hits,
            aggregations: value["aggregations"].as_object().cloned(),
        }
    }
}

impl<T> SearchResponse<T> {
    /// Convert every hit source, keeping the rest of the response.
    pub fn try_map<U, F>(self, mut f: F) -> Result<SearchResponse<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        let hits = self
            .hits
            .into_iter()
            .map(|hit| {
                Ok(SearchHit {
                    id: hit.id,
                    index: hit.index,
                    score: hit.score,
                    source: hit.source.map(&mut f).transpose()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResponse {
            took: self.took,
            timed_out: self.timed_out,
            total: self.total,
            total_relation: self.total_relation,
            max_score: self.max_score,
            hits,
            aggregations: self.aggregations,
        })
    }

    /// Named aggregation result.
    pub fn aggregation(&self, name: &str) -> Option<AggregationResult<'_>> {
        self.aggregations
            .as_ref()
            .and_then(|aggregations| aggregations.get(name))
            .map(AggregationResult)
    }
}

/// View over one aggregation result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationResult<'a>(pub &'a Value);

impl AggregationResult<'_> {
    /// Metric value (avg, sum, min, max, cardinality).
    pub fn metric_value(&self) -> Option<f64> {
        self.0["value"].as_f64()
    }

    /// Buckets of a bucket aggregation.
    pub fn buckets(&self) -> &[Value] {
        self.0["buckets"].as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_contains_only_given_parameters() {
        let params = SearchParams::with_query(Query::term("status", "active"))
            .from(20)
            .size(10)
            .sort_by("created_at", SortOrder::Desc)
            .aggregation("by_tag", Aggregation::terms_with_size("tag", 5))
            .track_total_hits(true);

        assert_eq!(
            params.to_body(),
            json!({
                "query": { "term": { "status": "active" } },
                "from": 20,
                "size": 10,
                "sort": [{ "created_at": { "order": "desc" } }],
                "aggs": { "by_tag": { "terms": { "field": "tag", "size": 5 } } },
                "track_total_hits": true
            })
        );
        assert_eq!(SearchParams::new().to_body(), json!({}));
    }

    #[test]
    fn test_query_string_goes_to_request() {
        let request = SearchParams::new().q("name:widget").to_request("products");
        assert_eq!(request.index, "products");
        assert_eq!(request.q.as_deref(), Some("name:widget"));
        assert_eq!(request.body, json!({}));
    }

    #[test]
    fn test_raw_sort_arrays_are_flattened() {
        let params = SearchParams::new().sort(json!(["_doc", { "price": "asc" }]));
        assert_eq!(params.to_body()["sort"], json!(["_doc", { "price": "asc" }]));
    }

    #[test]
    fn test_parse_response() {
        let raw = json!({
            "took": 4,
            "timed_out": false,
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "max_score": 1.5,
                "hits": [
                    {
                        "_id": "p1",
                        "_index": "products",
                        "_score": 1.5,
                        "_source": { "name": "a" }
                    },
                    { "_id": "p2", "_index": "products", "_score": null }
                ]
            },
            "aggregations": { "avg_price": { "value": 12.5 } }
        });

        let response = SearchResponse::from_value(&raw);
        assert_eq!(response.took, 4);
        assert_eq!(response.total, 2);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].score, Some(1.5));
        assert_eq!(response.hits[1].score, None);
        assert!(response.hits[1].source.is_none());
        assert_eq!(
            response.aggregation("avg_price").and_then(|a| a.metric_value()),
            Some(12.5)
        );
    }

    #[test]
    fn test_parse_numeric_total() {
        let response = SearchResponse::from_value(&json!({ "hits": { "total": 7, "hits": [] } }));
        assert_eq!(response.total, 7);
        assert_eq!(response.total_relation, "eq");
        assert!(response.hits.is_empty());
    }

    #[test]
    fn test_try_map() {
        let raw = json!({
            "hits": { "hits": [{ "_id": "p1", "_source": { "n": 3 } }] }
        });
        let mapped = SearchResponse::from_value(&raw)
            .try_map(|source| Ok(source["n"].as_u64().unwrap_or(0)))
            .unwrap();
        assert_eq!(mapped.hits[0].source, Some(3));
    }
}
