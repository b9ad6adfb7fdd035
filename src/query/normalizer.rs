//! Query DTO normalization.
//!
//! Rewrites the JSON `query`/`filter` bodies of a request into a
//! [`QueryPlan`]. The normalizer is where auto-detection happens: a `match`
//! whose value is empty or `"*"` becomes match-all, and a `match` value
//! containing unescaped `*` or `?` becomes a wildcard plan on the same field.
//! Both object and flat wildcard syntaxes collapse into one internal shape.

use serde_json::{Map, Value};

use crate::analysis::{Analyzer, StandardAnalyzer, scalar_text};
use crate::dictionary::{WildcardPattern, contains_wildcard};
use crate::error::{FalxError, Result};
use crate::query::plan::{ALL_FIELD, BoolPlan, QueryPlan, RangeBounds};

/// Rewrites request DTOs into query plans.
#[derive(Debug)]
pub struct QueryNormalizer {
    analyzer: StandardAnalyzer,
}

impl QueryNormalizer {
    pub fn new() -> Result<Self> {
        Ok(QueryNormalizer {
            analyzer: StandardAnalyzer::new()?,
        })
    }

    /// Analyzed token texts for a piece of query text.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        self.analyzer
            .analyze(text)
            .into_iter()
            .map(|token| token.text)
            .collect()
    }

    /// Normalize a request's query value. Absent and `null` queries browse
    /// the whole index.
    pub fn normalize(&self, query: Option<&Value>) -> Result<QueryPlan> {
        self.normalize_with_fields(query, None)
    }

    /// Normalize with an optional field whitelist for bare-string queries.
    ///
    /// `default_fields` accepts `name^boost` entries; it only affects string
    /// queries, which would otherwise search the virtual `_all` field.
    pub fn normalize_with_fields(
        &self,
        query: Option<&Value>,
        default_fields: Option<&[String]>,
    ) -> Result<QueryPlan> {
        match query {
            None | Some(Value::Null) => Ok(QueryPlan::MatchAll { boost: 1.0 }),
            Some(Value::String(text)) => self.text_query(text, default_fields),
            Some(value @ Value::Object(_)) => self.normalize_clause(value),
            Some(other) => Err(FalxError::validation(format!(
                "query must be an object or string, got {}",
                kind_name(other)
            ))),
        }
    }

    /// A bare string query: sugar for a match across all fields, decomposed
    /// into an OR of per-term clauses.
    fn text_query(&self, text: &str, default_fields: Option<&[String]>) -> Result<QueryPlan> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(QueryPlan::MatchAll { boost: 1.0 });
        }

        let fields = match default_fields {
            Some(names) if !names.is_empty() => Some(parse_weighted_fields(names.iter())?),
            _ => None,
        };

        if contains_wildcard(trimmed) {
            let pattern = WildcardPattern::compile(&trimmed.to_lowercase())?;
            let targets = match &fields {
                Some(weighted) => weighted.clone(),
                None => vec![(ALL_FIELD.to_string(), 1.0)],
            };
            let should = targets
                .into_iter()
                .map(|(field, boost)| QueryPlan::Wildcard {
                    field,
                    pattern: pattern.clone(),
                    boost,
                })
                .collect::<Vec<_>>();
            return Ok(or_of(should));
        }

        let terms = self.tokens(trimmed);
        if terms.is_empty() {
            return Ok(QueryPlan::MatchAll { boost: 1.0 });
        }

        if let Some(fields) = fields {
            return Ok(QueryPlan::MultiMatch {
                fields,
                terms,
                boost: 1.0,
            });
        }

        let should = terms
            .into_iter()
            .map(|value| QueryPlan::Term {
                field: ALL_FIELD.to_string(),
                value,
                boost: 1.0,
            })
            .collect::<Vec<_>>();
        Ok(or_of(should))
    }

    fn normalize_clause(&self, value: &Value) -> Result<QueryPlan> {
        let map = value
            .as_object()
            .ok_or_else(|| FalxError::validation("query clause must be a JSON object"))?;
        if map.is_empty() {
            // Browsing clients send `{}`; treat it like an absent query.
            return Ok(QueryPlan::MatchAll { boost: 1.0 });
        }
        let (kind, body) = single_entry(map)?;
        match kind.as_str() {
            "match_all" => match_all_clause(body),
            "match" => self.match_clause(body),
            "term" => term_clause(body),
            "wildcard" => wildcard_clause(body),
            "range" => range_clause(body),
            "multi_match" => self.multi_match_clause(body),
            "bool" => self.bool_clause(body),
            other => Err(FalxError::validation(format!(
                "unknown query clause '{other}'"
            ))),
        }
    }

    fn match_clause(&self, body: &Value) -> Result<QueryPlan> {
        let map = object_body(body, "match")?;
        let outer_boost = boost_of(map)?;
        let target = field_value_target(map, "match")?;
        let text = scalar_text(target.value).ok_or_else(|| {
            FalxError::validation("match value must be a string, number, or boolean")
        })?;
        let boost = target.boost.or(outer_boost).unwrap_or(1.0);
        self.match_text(target.field, &text, boost)
    }

    /// The auto-detection state machine for match values.
    fn match_text(&self, field: String, text: &str, boost: f32) -> Result<QueryPlan> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(QueryPlan::MatchAll { boost });
        }
        if contains_wildcard(trimmed) {
            let pattern = WildcardPattern::compile(&trimmed.to_lowercase())?;
            return Ok(QueryPlan::Wildcard {
                field,
                pattern,
                boost,
            });
        }
        let mut terms = self.tokens(trimmed);
        if terms.is_empty() {
            // Punctuation-only input analyzes to nothing.
            return Ok(QueryPlan::MatchAll { boost });
        }
        if terms.len() == 1 {
            return Ok(QueryPlan::Term {
                field,
                value: terms.remove(0),
                boost,
            });
        }
        let should = terms
            .into_iter()
            .map(|value| QueryPlan::Term {
                field: field.clone(),
                value,
                boost: 1.0,
            })
            .collect();
        Ok(QueryPlan::Bool(BoolPlan {
            should,
            minimum_should_match: 1,
            boost,
            ..BoolPlan::default()
        }))
    }

    fn multi_match_clause(&self, body: &Value) -> Result<QueryPlan> {
        let map = object_body(body, "multi_match")?;
        let boost = boost_of(map)?.unwrap_or(1.0);

        let query = match map.get("query") {
            Some(value) => scalar_text(value)
                .ok_or_else(|| FalxError::validation("multi_match query must be a scalar"))?,
            None => return Err(FalxError::validation("multi_match requires a 'query' value")),
        };
        let names = map
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| FalxError::validation("multi_match requires a 'fields' array"))?;
        if names.is_empty() {
            return Err(FalxError::validation(
                "multi_match requires at least one field",
            ));
        }
        let names = names
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| FalxError::validation("multi_match fields must be strings"))
            })
            .collect::<Result<Vec<_>>>()?;
        let fields = parse_weighted_fields(names.into_iter())?;

        let trimmed = query.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(QueryPlan::MatchAll { boost });
        }
        if contains_wildcard(trimmed) {
            // Field boosts multiply with the clause boost.
            let pattern = WildcardPattern::compile(&trimmed.to_lowercase())?;
            let should = fields
                .into_iter()
                .map(|(field, field_boost)| QueryPlan::Wildcard {
                    field,
                    pattern: pattern.clone(),
                    boost: boost * field_boost,
                })
                .collect::<Vec<_>>();
            return Ok(or_of(should));
        }
        let terms = self.tokens(trimmed);
        if terms.is_empty() {
            return Ok(QueryPlan::MatchAll { boost });
        }
        Ok(QueryPlan::MultiMatch {
            fields,
            terms,
            boost,
        })
    }

    fn bool_clause(&self, body: &Value) -> Result<QueryPlan> {
        let map = object_body(body, "bool")?;
        let mut plan = BoolPlan {
            boost: boost_of(map)?.unwrap_or(1.0),
            ..BoolPlan::default()
        };
        let mut explicit_minimum = None;

        for (key, value) in map {
            match key.as_str() {
                "must" => plan.must = self.clause_list(value)?,
                "should" => plan.should = self.clause_list(value)?,
                "must_not" => plan.must_not = self.clause_list(value)?,
                "filter" => plan.filter = self.clause_list(value)?,
                "minimum_should_match" => {
                    let n = value.as_u64().ok_or_else(|| {
                        FalxError::validation(
                            "minimum_should_match must be a non-negative integer",
                        )
                    })?;
                    explicit_minimum = Some(n as usize);
                }
                "boost" => {}
                other => {
                    return Err(FalxError::validation(format!(
                        "unknown bool clause '{other}'"
                    )));
                }
            }
        }

        if plan.must.is_empty()
            && plan.should.is_empty()
            && plan.must_not.is_empty()
            && plan.filter.is_empty()
        {
            // An empty compound selects nothing rather than failing.
            return Ok(QueryPlan::MatchNone);
        }

        plan.minimum_should_match = match explicit_minimum {
            Some(n) => n,
            // Pure-should compounds need at least one clause to hit.
            None if plan.must.is_empty() && plan.filter.is_empty() && !plan.should.is_empty() => 1,
            None => 0,
        };
        Ok(QueryPlan::Bool(plan))
    }

    fn clause_list(&self, value: &Value) -> Result<Vec<QueryPlan>> {
        match value {
            Value::Array(clauses) => clauses
                .iter()
                .map(|clause| self.clause_entry(clause))
                .collect(),
            other => Ok(vec![self.clause_entry(other)?]),
        }
    }

    fn clause_entry(&self, value: &Value) -> Result<QueryPlan> {
        match value {
            Value::String(text) => self.text_query(text, None),
            Value::Object(_) => self.normalize_clause(value),
            other => Err(FalxError::validation(format!(
                "bool sub-clause must be an object or string, got {}",
                kind_name(other)
            ))),
        }
    }
}

/// OR composition: a single clause stays bare, several become a should-group.
fn or_of(mut clauses: Vec<QueryPlan>) -> QueryPlan {
    if clauses.len() == 1 {
        return clauses.remove(0);
    }
    QueryPlan::Bool(BoolPlan {
        should: clauses,
        minimum_should_match: 1,
        boost: 1.0,
        ..BoolPlan::default()
    })
}

fn match_all_clause(body: &Value) -> Result<QueryPlan> {
    let boost = match body {
        Value::Null => 1.0,
        Value::Object(map) => boost_of(map)?.unwrap_or(1.0),
        _ => return Err(FalxError::validation("match_all body must be an object")),
    };
    Ok(QueryPlan::MatchAll { boost })
}

fn term_clause(body: &Value) -> Result<QueryPlan> {
    let map = object_body(body, "term")?;
    let outer_boost = boost_of(map)?;
    let target = field_value_target(map, "term")?;
    let text = scalar_text(target.value)
        .ok_or_else(|| FalxError::validation("term value must be a string, number, or boolean"))?;
    let value = text.trim().to_lowercase();
    if value.is_empty() {
        return Err(FalxError::validation("term value must not be empty"));
    }
    Ok(QueryPlan::Term {
        field: target.field,
        value,
        boost: target.boost.or(outer_boost).unwrap_or(1.0),
    })
}

fn wildcard_clause(body: &Value) -> Result<QueryPlan> {
    let map = object_body(body, "wildcard")?;
    let outer_boost = boost_of(map)?;
    let target = field_value_target(map, "wildcard")?;
    let text = scalar_text(target.value)
        .ok_or_else(|| FalxError::validation("wildcard pattern must be a string"))?;
    let raw = text.trim().to_lowercase();
    if raw.is_empty() {
        return Err(FalxError::validation("wildcard pattern must not be empty"));
    }
    let boost = target.boost.or(outer_boost).unwrap_or(1.0);
    if !contains_wildcard(&raw) {
        // No metacharacters left after unescaping: an exact lookup is cheaper
        // than a compiled pattern.
        return Ok(QueryPlan::Term {
            field: target.field,
            value: raw.replace("\\*", "*").replace("\\?", "?"),
            boost,
        });
    }
    Ok(QueryPlan::Wildcard {
        field: target.field,
        pattern: WildcardPattern::compile(&raw)?,
        boost,
    })
}

fn range_clause(body: &Value) -> Result<QueryPlan> {
    let map = object_body(body, "range")?;
    let outer_boost = boost_of(map)?;

    // Flat syntax carries the field name and bounds in one object.
    if map.contains_key("field") {
        let field = map
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| FalxError::validation("range field must be a string"))?
            .to_string();
        let bounds = parse_bounds(map, &["field", "boost"])?;
        return Ok(QueryPlan::Range {
            field,
            bounds,
            boost: outer_boost.unwrap_or(1.0),
        });
    }

    let (field, inner) = single_non_boost_entry(map, "range")?;
    let inner_map = inner
        .as_object()
        .ok_or_else(|| FalxError::validation("range bounds must be an object"))?;
    let bounds = parse_bounds(inner_map, &["boost"])?;
    let boost = boost_of(inner_map)?.or(outer_boost).unwrap_or(1.0);
    Ok(QueryPlan::Range {
        field: field.clone(),
        bounds,
        boost,
    })
}

fn parse_bounds(map: &Map<String, Value>, skip: &[&str]) -> Result<RangeBounds> {
    let mut bounds = RangeBounds::default();
    for (key, value) in map {
        if skip.contains(&key.as_str()) {
            continue;
        }
        let slot = match key.as_str() {
            "gt" => &mut bounds.gt,
            "gte" => &mut bounds.gte,
            "lt" => &mut bounds.lt,
            "lte" => &mut bounds.lte,
            other => {
                return Err(FalxError::validation(format!(
                    "unknown range bound '{other}' (expected gt, gte, lt, lte)"
                )));
            }
        };
        if !matches!(value, Value::Number(_) | Value::String(_)) {
            return Err(FalxError::validation(format!(
                "range bound '{key}' must be a number or string"
            )));
        }
        *slot = Some(value.clone());
    }
    if bounds.is_empty() {
        return Err(FalxError::validation(
            "range requires at least one of gt, gte, lt, lte",
        ));
    }
    Ok(bounds)
}

/// A `(field, value, boost)` triple extracted from a leaf clause body.
struct ClauseTarget<'a> {
    field: String,
    value: &'a Value,
    boost: Option<f32>,
}

/// Resolve the two accepted leaf-clause syntaxes into one shape:
/// flat (`{"field": ..., "value": ...}`) and keyed
/// (`{"title": {"value": ..., "boost": ...}}` or `{"title": "..."}`).
fn field_value_target<'a>(map: &'a Map<String, Value>, clause: &str) -> Result<ClauseTarget<'a>> {
    if let Some(value) = map.get("value") {
        for key in map.keys() {
            if !matches!(key.as_str(), "field" | "value" | "boost") {
                return Err(FalxError::validation(format!(
                    "unknown {clause} parameter '{key}'"
                )));
            }
        }
        let field = match map.get("field") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => {
                return Err(FalxError::validation(format!(
                    "{clause} field must be a string"
                )));
            }
            None => ALL_FIELD.to_string(),
        };
        return Ok(ClauseTarget {
            field,
            value,
            boost: None,
        });
    }

    let (field, body) = single_non_boost_entry(map, clause)?;
    match body {
        Value::Object(inner) => {
            let value = inner.get("value").ok_or_else(|| {
                FalxError::validation(format!("{clause} clause for '{field}' requires a 'value'"))
            })?;
            Ok(ClauseTarget {
                field: field.clone(),
                value,
                boost: boost_of(inner)?,
            })
        }
        scalar => Ok(ClauseTarget {
            field: field.clone(),
            value: scalar,
            boost: None,
        }),
    }
}

fn single_entry(map: &Map<String, Value>) -> Result<(&String, &Value)> {
    let mut entries = map.iter();
    let Some(first) = entries.next() else {
        return Err(FalxError::validation("query clause is empty"));
    };
    if entries.next().is_some() {
        return Err(FalxError::validation(
            "query clause must contain exactly one clause type",
        ));
    }
    Ok(first)
}

fn single_non_boost_entry<'a>(
    map: &'a Map<String, Value>,
    clause: &str,
) -> Result<(&'a String, &'a Value)> {
    let mut entries = map.iter().filter(|(key, _)| key.as_str() != "boost");
    let Some(first) = entries.next() else {
        return Err(FalxError::validation(format!(
            "{clause} clause requires a field"
        )));
    };
    if entries.next().is_some() {
        return Err(FalxError::validation(format!(
            "{clause} clause must name exactly one field"
        )));
    }
    Ok(first)
}

fn object_body<'a>(body: &'a Value, clause: &str) -> Result<&'a Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| FalxError::validation(format!("{clause} body must be an object")))
}

fn boost_of(map: &Map<String, Value>) -> Result<Option<f32>> {
    match map.get("boost") {
        None => Ok(None),
        Some(value) => {
            let boost = value
                .as_f64()
                .ok_or_else(|| FalxError::validation("boost must be a number"))?;
            if boost < 0.0 {
                return Err(FalxError::validation("boost must not be negative"));
            }
            Ok(Some(boost as f32))
        }
    }
}

fn parse_weighted_fields<'a, I, S>(names: I) -> Result<Vec<(String, f32)>>
where
    I: Iterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    names
        .map(|name| {
            let name = name.as_ref().trim();
            let (field, boost) = match name.split_once('^') {
                Some((field, weight)) => {
                    let boost: f32 = weight.trim().parse().map_err(|_| {
                        FalxError::validation(format!("invalid field boost in '{name}'"))
                    })?;
                    if boost < 0.0 {
                        return Err(FalxError::validation("field boost must not be negative"));
                    }
                    (field.trim(), boost)
                }
                None => (name, 1.0),
            };
            if field.is_empty() {
                return Err(FalxError::validation("field name must not be empty"));
            }
            Ok((field.to_string(), boost))
        })
        .collect()
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> QueryNormalizer {
        QueryNormalizer::new().unwrap()
    }

    fn normalize(value: Value) -> QueryPlan {
        normalizer().normalize(Some(&value)).unwrap()
    }

    #[test]
    fn test_absent_and_null_queries_match_all() {
        let n = normalizer();
        assert!(matches!(
            n.normalize(None).unwrap(),
            QueryPlan::MatchAll { .. }
        ));
        assert!(matches!(
            n.normalize(Some(&Value::Null)).unwrap(),
            QueryPlan::MatchAll { .. }
        ));
        assert!(matches!(normalize(json!({})), QueryPlan::MatchAll { .. }));
    }

    #[test]
    fn test_match_all_detection_is_uniform() {
        // All three spellings must produce the same plan shape.
        for query in [
            json!({"match_all": {}}),
            json!({"match": {"value": "*"}}),
            json!({"match": {"value": ""}}),
        ] {
            assert!(
                matches!(normalize(query.clone()), QueryPlan::MatchAll { .. }),
                "expected match-all for {query}"
            );
        }
    }

    #[test]
    fn test_match_all_boost() {
        let plan = normalize(json!({"match_all": {"boost": 2.5}}));
        let QueryPlan::MatchAll { boost } = plan else {
            panic!("expected match-all");
        };
        assert_eq!(boost, 2.5);
    }

    #[test]
    fn test_match_single_term() {
        let plan = normalize(json!({"match": {"field": "title", "value": "Wireless"}}));
        let QueryPlan::Term { field, value, .. } = plan else {
            panic!("expected term plan");
        };
        assert_eq!(field, "title");
        assert_eq!(value, "wireless");
    }

    #[test]
    fn test_match_multiple_terms_becomes_or() {
        let plan = normalize(json!({"match": {"field": "title", "value": "Art Gallery"}}));
        let QueryPlan::Bool(bool_plan) = plan else {
            panic!("expected bool plan");
        };
        assert_eq!(bool_plan.should.len(), 2);
        assert_eq!(bool_plan.minimum_should_match, 1);
        assert!(bool_plan.must.is_empty());
    }

    #[test]
    fn test_match_wildcard_autodetection() {
        let plan = normalize(json!({"match": {"field": "title", "value": "smart*"}}));
        let QueryPlan::Wildcard { field, pattern, .. } = plan else {
            panic!("expected wildcard plan");
        };
        assert_eq!(field, "title");
        assert_eq!(pattern.prefix(), "smart");
        assert!(!pattern.is_expensive());

        let plan = normalize(json!({"match": {"field": "title", "value": "s??rt"}}));
        assert!(matches!(plan, QueryPlan::Wildcard { .. }));
    }

    #[test]
    fn test_match_shorthand_field_key() {
        let plan = normalize(json!({"match": {"title": "Hello"}}));
        let QueryPlan::Term { field, value, .. } = plan else {
            panic!("expected term plan");
        };
        assert_eq!(field, "title");
        assert_eq!(value, "hello");
    }

    #[test]
    fn test_match_without_field_targets_all() {
        let plan = normalize(json!({"match": {"value": "lamp"}}));
        let QueryPlan::Term { field, .. } = plan else {
            panic!("expected term plan");
        };
        assert_eq!(field, ALL_FIELD);
    }

    #[test]
    fn test_term_clause_syntaxes() {
        let flat = normalize(json!({"term": {"field": "status", "value": "Active"}}));
        let keyed = normalize(json!({"term": {"status": {"value": "Active", "boost": 3.0}}}));

        let QueryPlan::Term { field, value, boost } = flat else {
            panic!("expected term plan");
        };
        assert_eq!((field.as_str(), value.as_str(), boost), ("status", "active", 1.0));

        let QueryPlan::Term { field, value, boost } = keyed else {
            panic!("expected term plan");
        };
        assert_eq!((field.as_str(), value.as_str(), boost), ("status", "active", 3.0));
    }

    #[test]
    fn test_term_accepts_numbers() {
        let plan = normalize(json!({"term": {"field": "year", "value": 2021}}));
        let QueryPlan::Term { value, .. } = plan else {
            panic!("expected term plan");
        };
        assert_eq!(value, "2021");
    }

    #[test]
    fn test_wildcard_syntaxes_are_equivalent() {
        let object = normalize(json!({"wildcard": {"title": {"value": "Smart*", "boost": 2.0}}}));
        let flat = normalize(json!({"wildcard": {"field": "title", "value": "Smart*", "boost": 2.0}}));
        let shorthand = normalize(json!({"wildcard": {"title": "Smart*"}}));

        for plan in [&object, &flat] {
            let QueryPlan::Wildcard { field, pattern, boost } = plan else {
                panic!("expected wildcard plan");
            };
            assert_eq!(field, "title");
            assert_eq!(pattern.pattern(), "smart*");
            assert_eq!(*boost, 2.0);
        }
        let QueryPlan::Wildcard { boost, .. } = shorthand else {
            panic!("expected wildcard plan");
        };
        assert_eq!(boost, 1.0);
    }

    #[test]
    fn test_wildcard_without_metacharacters_becomes_term() {
        let plan = normalize(json!({"wildcard": {"field": "title", "value": "exact"}}));
        let QueryPlan::Term { value, .. } = plan else {
            panic!("expected term plan");
        };
        assert_eq!(value, "exact");
    }

    #[test]
    fn test_range_clause_nested_and_flat() {
        let nested = normalize(json!({"range": {"price": {"gte": 10, "lt": 20}}}));
        let flat = normalize(json!({"range": {"field": "price", "gte": 10, "lt": 20}}));

        for plan in [nested, flat] {
            let QueryPlan::Range { field, bounds, .. } = plan else {
                panic!("expected range plan");
            };
            assert_eq!(field, "price");
            assert_eq!(bounds.gte, Some(json!(10)));
            assert_eq!(bounds.lt, Some(json!(20)));
            assert!(bounds.gt.is_none());
        }
    }

    #[test]
    fn test_range_rejects_bad_bounds() {
        let n = normalizer();
        assert!(n.normalize(Some(&json!({"range": {"price": {}}}))).is_err());
        assert!(
            n.normalize(Some(&json!({"range": {"price": {"between": 5}}})))
                .is_err()
        );
        assert!(
            n.normalize(Some(&json!({"range": {"price": {"gte": [1, 2]}}})))
                .is_err()
        );
    }

    #[test]
    fn test_multi_match() {
        let plan = normalize(json!({
            "multi_match": {"query": "Wireless Audio", "fields": ["title^2", "description"]}
        }));
        let QueryPlan::MultiMatch { fields, terms, .. } = plan else {
            panic!("expected multi-match plan");
        };
        assert_eq!(fields, vec![("title".to_string(), 2.0), ("description".to_string(), 1.0)]);
        assert_eq!(terms, vec!["wireless", "audio"]);
    }

    #[test]
    fn test_multi_match_validation() {
        let n = normalizer();
        assert!(n.normalize(Some(&json!({"multi_match": {"query": "x"}}))).is_err());
        assert!(
            n.normalize(Some(&json!({"multi_match": {"query": "x", "fields": []}})))
                .is_err()
        );
        assert!(
            n.normalize(Some(&json!({"multi_match": {"query": "x", "fields": ["title^fast"]}})))
                .is_err()
        );
    }

    #[test]
    fn test_bool_compound() {
        let plan = normalize(json!({
            "bool": {
                "must": [{"match": {"field": "title", "value": "phone"}}],
                "filter": {"term": {"field": "status", "value": "active"}},
                "must_not": [{"term": {"field": "category", "value": "refurbished"}}],
                "should": [
                    {"match": {"field": "description", "value": "wireless"}},
                    {"range": {"price": {"lt": 100}}}
                ],
                "minimum_should_match": 1
            }
        }));
        let QueryPlan::Bool(bool_plan) = plan else {
            panic!("expected bool plan");
        };
        assert_eq!(bool_plan.must.len(), 1);
        assert_eq!(bool_plan.filter.len(), 1);
        assert_eq!(bool_plan.must_not.len(), 1);
        assert_eq!(bool_plan.should.len(), 2);
        assert_eq!(bool_plan.minimum_should_match, 1);
    }

    #[test]
    fn test_bool_minimum_should_match_defaults() {
        let pure_should = normalize(json!({
            "bool": {"should": [{"term": {"a": "x"}}, {"term": {"a": "y"}}]}
        }));
        let QueryPlan::Bool(plan) = pure_should else {
            panic!("expected bool plan");
        };
        assert_eq!(plan.minimum_should_match, 1);

        let with_must = normalize(json!({
            "bool": {
                "must": [{"term": {"a": "x"}}],
                "should": [{"term": {"a": "y"}}]
            }
        }));
        let QueryPlan::Bool(plan) = with_must else {
            panic!("expected bool plan");
        };
        assert_eq!(plan.minimum_should_match, 0);
    }

    #[test]
    fn test_empty_bool_matches_none() {
        assert!(matches!(normalize(json!({"bool": {}})), QueryPlan::MatchNone));
        assert!(matches!(
            normalize(json!({"bool": {"must": [], "should": []}})),
            QueryPlan::MatchNone
        ));
    }

    #[test]
    fn test_unknown_clause_is_rejected() {
        let n = normalizer();
        let err = n
            .normalize(Some(&json!({"regexp": {"title": "a.*"}})))
            .unwrap_err();
        assert_eq!(err.http_status(), 400);

        let err = n
            .normalize(Some(&json!({
                "match": {"field": "a", "value": "b"},
                "term": {"field": "c", "value": "d"}
            })))
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_query_must_be_object_or_string() {
        let n = normalizer();
        assert!(n.normalize(Some(&json!(42))).is_err());
        assert!(n.normalize(Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn test_bare_string_query() {
        let plan = normalize(json!("Art Gallery"));
        let QueryPlan::Bool(bool_plan) = plan else {
            panic!("expected bool plan");
        };
        assert_eq!(bool_plan.should.len(), 2);
        assert_eq!(bool_plan.minimum_should_match, 1);
        for clause in &bool_plan.should {
            let QueryPlan::Term { field, .. } = clause else {
                panic!("expected term clause");
            };
            assert_eq!(field, ALL_FIELD);
        }

        assert!(matches!(normalize(json!("*")), QueryPlan::MatchAll { .. }));
        assert!(matches!(normalize(json!("")), QueryPlan::MatchAll { .. }));
    }

    #[test]
    fn test_bare_string_with_default_fields() {
        let n = normalizer();
        let fields = vec!["title^2".to_string(), "description".to_string()];
        let plan = n
            .normalize_with_fields(Some(&json!("wireless charger")), Some(&fields))
            .unwrap();
        let QueryPlan::MultiMatch { fields, terms, .. } = plan else {
            panic!("expected multi-match plan");
        };
        assert_eq!(fields[0], ("title".to_string(), 2.0));
        assert_eq!(terms, vec!["wireless", "charger"]);
    }

    #[test]
    fn test_bare_string_wildcard() {
        let plan = normalize(json!("smart*"));
        let QueryPlan::Wildcard { field, pattern, .. } = plan else {
            panic!("expected wildcard plan");
        };
        assert_eq!(field, ALL_FIELD);
        assert_eq!(pattern.prefix(), "smart");
    }

    #[test]
    fn test_boost_validation() {
        let n = normalizer();
        assert!(
            n.normalize(Some(&json!({"match_all": {"boost": "high"}})))
                .is_err()
        );
        assert!(
            n.normalize(Some(&json!({"match_all": {"boost": -1.0}})))
                .is_err()
        );
    }
}
