//! Request DTOs for the search and suggestion surface.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FalxError, Result};

/// Page size applied when a search request does not specify `size`.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Virtual sort field resolving to the relevance score.
pub const SCORE_FIELD: &str = "_score";

/// Body of a search request.
///
/// `query` and `filter` stay untyped JSON here; the normalizer turns them into
/// plans. `fields` restricts which fields bare-string queries search in and
/// accepts `name^boost` weighting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<Value>,
    pub filter: Option<Value>,
    pub sort: Option<Value>,
    pub fields: Option<Vec<String>>,
    pub size: Option<usize>,
    pub from: Option<usize>,
    pub highlight: Option<HighlightRequest>,
    pub facets: Option<BTreeMap<String, FacetSpec>>,
}

impl SearchRequest {
    /// Effective page size.
    pub fn page_size(&self) -> usize {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Effective result offset.
    pub fn offset(&self) -> usize {
        self.from.unwrap_or(0)
    }
}

/// Highlighting parameters.
///
/// Fragment size and count are request inputs rather than engine constants so
/// callers control snippet shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HighlightRequest {
    /// Fields to produce highlighted fragments for. Empty means every field
    /// the query matched in.
    pub fields: Vec<String>,
    #[serde(alias = "pre_tag")]
    pub pre_tag: String,
    #[serde(alias = "post_tag")]
    pub post_tag: String,
    #[serde(alias = "fragment_size")]
    pub fragment_size: usize,
    #[serde(alias = "number_of_fragments")]
    pub number_of_fragments: usize,
}

impl Default for HighlightRequest {
    fn default() -> Self {
        HighlightRequest {
            fields: Vec::new(),
            pre_tag: "<em>".to_string(),
            post_tag: "</em>".to_string(),
            fragment_size: 150,
            number_of_fragments: 3,
        }
    }
}

/// A single facet definition, keyed by facet name in the request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetSpec {
    Terms(TermsFacet),
    Range(RangeFacet),
    Histogram(HistogramFacet),
    DateHistogram(DateHistogramFacet),
}

impl FacetSpec {
    /// The field this facet aggregates over.
    pub fn field(&self) -> &str {
        match self {
            FacetSpec::Terms(f) => &f.field,
            FacetSpec::Range(f) => &f.field,
            FacetSpec::Histogram(f) => &f.field,
            FacetSpec::DateHistogram(f) => &f.field,
        }
    }
}

/// Top-N distinct values of a field.
#[derive(Debug, Clone, Deserialize)]
pub struct TermsFacet {
    pub field: String,
    #[serde(default = "default_terms_size")]
    pub size: usize,
}

fn default_terms_size() -> usize {
    10
}

/// Counts per caller-defined value range.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeFacet {
    pub field: String,
    pub ranges: Vec<FacetRange>,
}

/// One bucket of a range facet. `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Deserialize)]
pub struct FacetRange {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub from: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
}

impl FacetRange {
    /// Bucket label: the explicit key, or a `from-to` form with `*` for an
    /// open end.
    pub fn label(&self) -> String {
        if let Some(key) = &self.key {
            return key.clone();
        }
        let from = self
            .from
            .map_or_else(|| "*".to_string(), |v| v.to_string());
        let to = self.to.map_or_else(|| "*".to_string(), |v| v.to_string());
        format!("{from}-{to}")
    }

    /// Check whether a numeric value falls in this bucket.
    pub fn contains(&self, value: f64) -> bool {
        if let Some(from) = self.from
            && value < from
        {
            return false;
        }
        if let Some(to) = self.to
            && value >= to
        {
            return false;
        }
        true
    }
}

/// Fixed-interval numeric buckets.
#[derive(Debug, Clone, Deserialize)]
pub struct HistogramFacet {
    pub field: String,
    pub interval: f64,
}

/// Calendar-interval buckets over an RFC 3339 date field.
#[derive(Debug, Clone, Deserialize)]
pub struct DateHistogramFacet {
    pub field: String,
    /// One of `hour`, `day`, `week`, `month`, `year`.
    #[serde(default = "default_date_interval")]
    pub interval: String,
}

fn default_date_interval() -> String {
    "day".to_string()
}

/// Body of a suggestion request.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRequest {
    pub text: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub size: Option<usize>,
}

/// A resolved sort directive. Listed order is priority order; later entries
/// break ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub ascending: bool,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, ascending: bool) -> Self {
        SortSpec {
            field: field.into(),
            ascending,
        }
    }

    /// Parse the request's `sort` value.
    ///
    /// Accepts a string (`"title"`, `"title:desc"`), an object
    /// (`{"title": "desc"}`, `{"title": {"order": "desc"}}`), or an array of
    /// either. `_score` defaults to descending, plain fields to ascending.
    pub fn parse(value: &Value) -> Result<Vec<SortSpec>> {
        match value {
            Value::Array(entries) => entries.iter().map(Self::parse_single).collect(),
            other => Ok(vec![Self::parse_single(other)?]),
        }
    }

    fn parse_single(value: &Value) -> Result<SortSpec> {
        match value {
            Value::String(raw) => Self::parse_string(raw),
            Value::Object(map) => {
                let mut entries = map.iter();
                let Some((field, order)) = entries.next() else {
                    return Err(FalxError::validation("sort entry must not be empty"));
                };
                if entries.next().is_some() {
                    return Err(FalxError::validation(
                        "sort entry must name exactly one field",
                    ));
                }
                let order = match order {
                    Value::String(s) => s.clone(),
                    Value::Object(inner) => match inner.get("order") {
                        Some(Value::String(s)) => s.clone(),
                        Some(_) => {
                            return Err(FalxError::validation("sort order must be a string"));
                        }
                        None => default_order(field),
                    },
                    _ => return Err(FalxError::validation("sort order must be a string")),
                };
                Self::with_order(field, &order)
            }
            _ => Err(FalxError::validation(
                "sort must be a string, object, or array",
            )),
        }
    }

    fn parse_string(raw: &str) -> Result<SortSpec> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FalxError::validation("sort field must not be empty"));
        }
        match raw.split_once(':') {
            Some((field, order)) => Self::with_order(field.trim(), order.trim()),
            None => Self::with_order(raw, &default_order(raw)),
        }
    }

    fn with_order(field: &str, order: &str) -> Result<SortSpec> {
        if field.is_empty() {
            return Err(FalxError::validation("sort field must not be empty"));
        }
        let ascending = match order {
            "asc" => true,
            "desc" => false,
            other => {
                return Err(FalxError::validation(format!(
                    "invalid sort order '{other}' (expected 'asc' or 'desc')"
                )));
            }
        };
        Ok(SortSpec::new(field, ascending))
    }
}

fn default_order(field: &str) -> String {
    if field == SCORE_FIELD { "desc" } else { "asc" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_request_deserialization() {
        let body = json!({
            "query": {"match": {"field": "title", "value": "wireless"}},
            "filter": {"term": {"field": "status", "value": "active"}},
            "size": 20,
            "from": 40,
            "fields": ["title^2", "description"],
            "highlight": {"fields": ["title"], "preTag": "<b>", "postTag": "</b>"},
            "facets": {"by_category": {"terms": {"field": "category", "size": 5}}}
        });
        let request: SearchRequest = serde_json::from_value(body).unwrap();

        assert!(request.query.is_some());
        assert!(request.filter.is_some());
        assert_eq!(request.page_size(), 20);
        assert_eq!(request.offset(), 40);
        assert_eq!(request.fields.as_deref().unwrap().len(), 2);

        let highlight = request.highlight.unwrap();
        assert_eq!(highlight.pre_tag, "<b>");
        assert_eq!(highlight.post_tag, "</b>");
        assert_eq!(highlight.fragment_size, 150);

        let facets = request.facets.unwrap();
        match facets.get("by_category").unwrap() {
            FacetSpec::Terms(f) => {
                assert_eq!(f.field, "category");
                assert_eq!(f.size, 5);
            }
            other => panic!("expected terms facet, got {other:?}"),
        }
    }

    #[test]
    fn test_search_request_defaults() {
        let request: SearchRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(request.offset(), 0);
        assert!(request.query.is_none());
        assert!(request.highlight.is_none());
    }

    #[test]
    fn test_highlight_snake_case_aliases() {
        let highlight: HighlightRequest = serde_json::from_value(json!({
            "fields": ["body"],
            "pre_tag": "[",
            "post_tag": "]",
            "fragment_size": 80,
            "number_of_fragments": 1
        }))
        .unwrap();
        assert_eq!(highlight.pre_tag, "[");
        assert_eq!(highlight.fragment_size, 80);
        assert_eq!(highlight.number_of_fragments, 1);
    }

    #[test]
    fn test_facet_spec_variants() {
        let spec: FacetSpec = serde_json::from_value(json!({
            "range": {"field": "price", "ranges": [
                {"to": 50.0},
                {"from": 50.0, "to": 100.0, "key": "mid"},
                {"from": 100.0}
            ]}
        }))
        .unwrap();
        let FacetSpec::Range(range) = &spec else {
            panic!("expected range facet");
        };
        assert_eq!(spec.field(), "price");
        assert_eq!(range.ranges[0].label(), "*-50");
        assert_eq!(range.ranges[1].label(), "mid");
        assert_eq!(range.ranges[2].label(), "100-*");
        assert!(range.ranges[1].contains(50.0));
        assert!(!range.ranges[1].contains(100.0));

        let spec: FacetSpec = serde_json::from_value(json!({
            "date_histogram": {"field": "created_at"}
        }))
        .unwrap();
        let FacetSpec::DateHistogram(hist) = spec else {
            panic!("expected date histogram facet");
        };
        assert_eq!(hist.interval, "day");

        let result: std::result::Result<FacetSpec, _> =
            serde_json::from_value(json!({"cardinality": {"field": "x"}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_sort_spec_strings() {
        assert_eq!(
            SortSpec::parse(&json!("title")).unwrap(),
            vec![SortSpec::new("title", true)]
        );
        assert_eq!(
            SortSpec::parse(&json!("price:desc")).unwrap(),
            vec![SortSpec::new("price", false)]
        );
        assert_eq!(
            SortSpec::parse(&json!("_score")).unwrap(),
            vec![SortSpec::new("_score", false)]
        );
    }

    #[test]
    fn test_sort_spec_objects_and_arrays() {
        let specs = SortSpec::parse(&json!([
            {"price": {"order": "desc"}},
            {"title": "asc"},
            "_score"
        ]))
        .unwrap();
        assert_eq!(
            specs,
            vec![
                SortSpec::new("price", false),
                SortSpec::new("title", true),
                SortSpec::new("_score", false),
            ]
        );
    }

    #[test]
    fn test_sort_spec_rejects_invalid_order() {
        assert!(SortSpec::parse(&json!("price:down")).is_err());
        assert!(SortSpec::parse(&json!({"price": "up"})).is_err());
        assert!(SortSpec::parse(&json!(42)).is_err());
        assert!(SortSpec::parse(&json!({"a": "asc", "b": "desc"})).is_err());
    }
}
