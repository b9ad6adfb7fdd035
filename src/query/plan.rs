//! Normalized query plans.
//!
//! A [`QueryPlan`] is the tagged-union output of normalization: every request
//! shape collapses into one of these variants, and the executor walks the tree
//! without knowing what the original DTO looked like.

use std::cmp::Ordering;

use serde_json::Value;

use crate::analysis::{flatten_source, lookup_path, scalar_text};
use crate::dictionary::WildcardPattern;

/// Virtual field name meaning "every indexed field".
pub const ALL_FIELD: &str = "_all";

/// A normalized query, ready for execution.
#[derive(Debug, Clone)]
pub enum QueryPlan {
    /// Matches every live document in the index.
    MatchAll { boost: f32 },
    /// Matches nothing. Produced by empty boolean compounds.
    MatchNone,
    /// Exact term match on one field (or [`ALL_FIELD`]).
    Term {
        field: String,
        value: String,
        boost: f32,
    },
    /// Compiled wildcard pattern match against a field's terms.
    Wildcard {
        field: String,
        pattern: WildcardPattern,
        boost: f32,
    },
    /// Field value comparison against numeric or string bounds.
    Range {
        field: String,
        bounds: RangeBounds,
        boost: f32,
    },
    /// Analyzed terms matched across several weighted fields, OR semantics.
    MultiMatch {
        fields: Vec<(String, f32)>,
        terms: Vec<String>,
        boost: f32,
    },
    /// Boolean compound of sub-plans.
    Bool(BoolPlan),
}

/// Clause lists of a boolean compound.
///
/// `must` and `should` contribute to scoring; `filter` and `must_not` only
/// restrict the candidate set.
#[derive(Debug, Clone, Default)]
pub struct BoolPlan {
    pub must: Vec<QueryPlan>,
    pub should: Vec<QueryPlan>,
    pub must_not: Vec<QueryPlan>,
    pub filter: Vec<QueryPlan>,
    pub minimum_should_match: usize,
    pub boost: f32,
}

/// Bounds of a range clause. `gt`/`gte` are lower bounds, `lt`/`lte` upper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeBounds {
    /// True when no bound is set.
    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    /// Check a document value against every configured bound.
    ///
    /// Values that cannot be compared with a bound (mixed scalar kinds) do
    /// not satisfy it.
    pub fn contains(&self, value: &Value) -> bool {
        if let Some(bound) = &self.gt
            && compare_values(value, bound) != Some(Ordering::Greater)
        {
            return false;
        }
        if let Some(bound) = &self.gte
            && !matches!(
                compare_values(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            )
        {
            return false;
        }
        if let Some(bound) = &self.lt
            && compare_values(value, bound) != Some(Ordering::Less)
        {
            return false;
        }
        if let Some(bound) = &self.lte
            && !matches!(
                compare_values(value, bound),
                Some(Ordering::Less | Ordering::Equal)
            )
        {
            return false;
        }
        true
    }
}

/// Compare two JSON scalars for range and sort evaluation.
///
/// Numbers (including numeric strings) compare numerically; otherwise strings
/// compare lexicographically and booleans as false < true. Incomparable kinds
/// return `None`.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A term-level match criterion extracted from a plan, used for highlighting.
#[derive(Debug, Clone)]
pub enum TermSelector {
    Exact(String),
    Pattern(WildcardPattern),
}

impl TermSelector {
    /// Check a single analyzed token against this selector.
    pub fn matches(&self, token: &str) -> bool {
        match self {
            TermSelector::Exact(term) => token == term,
            TermSelector::Pattern(pattern) => pattern.matches(token),
        }
    }
}

impl QueryPlan {
    /// The boost carried by this plan node.
    pub fn boost(&self) -> f32 {
        match self {
            QueryPlan::MatchAll { boost }
            | QueryPlan::Term { boost, .. }
            | QueryPlan::Wildcard { boost, .. }
            | QueryPlan::Range { boost, .. }
            | QueryPlan::MultiMatch { boost, .. } => *boost,
            QueryPlan::Bool(plan) => plan.boost,
            QueryPlan::MatchNone => 0.0,
        }
    }

    /// Evaluate this plan directly against a document source.
    ///
    /// Used by delete-by-query and listing filters, which must see the
    /// document store's current state rather than an index snapshot.
    /// `analyze` turns raw field text into the same tokens indexing produced.
    pub fn matches_source(&self, source: &Value, analyze: &dyn Fn(&str) -> Vec<String>) -> bool {
        match self {
            QueryPlan::MatchAll { .. } => true,
            QueryPlan::MatchNone => false,
            QueryPlan::Term { field, value, .. } => {
                field_texts(source, field)
                    .iter()
                    .any(|text| analyze(text).iter().any(|token| token == value))
            }
            QueryPlan::Wildcard { field, pattern, .. } => field_texts(source, field)
                .iter()
                .any(|text| analyze(text).iter().any(|token| pattern.matches(token))),
            QueryPlan::Range { field, bounds, .. } => {
                lookup_path(source, field).iter().any(|v| bounds.contains(v))
            }
            QueryPlan::MultiMatch { fields, terms, .. } => fields.iter().any(|(field, _)| {
                field_texts(source, field).iter().any(|text| {
                    let tokens = analyze(text);
                    terms.iter().any(|term| tokens.contains(term))
                })
            }),
            QueryPlan::Bool(plan) => {
                if !plan.must.iter().all(|c| c.matches_source(source, analyze)) {
                    return false;
                }
                if !plan
                    .filter
                    .iter()
                    .all(|c| c.matches_source(source, analyze))
                {
                    return false;
                }
                if plan
                    .must_not
                    .iter()
                    .any(|c| c.matches_source(source, analyze))
                {
                    return false;
                }
                if plan.should.is_empty() {
                    return true;
                }
                let matched = plan
                    .should
                    .iter()
                    .filter(|c| c.matches_source(source, analyze))
                    .count();
                matched >= plan.minimum_should_match
            }
        }
    }

    /// Field/term pairs that contribute to scoring.
    ///
    /// The highlighter wraps occurrences of these in result fragments. Filter
    /// and must-not branches are excluded since they never score.
    pub fn scoring_terms(&self) -> Vec<(String, TermSelector)> {
        let mut out = Vec::new();
        self.collect_scoring_terms(&mut out);
        out
    }

    fn collect_scoring_terms(&self, out: &mut Vec<(String, TermSelector)>) {
        match self {
            QueryPlan::MatchAll { .. } | QueryPlan::MatchNone | QueryPlan::Range { .. } => {}
            QueryPlan::Term { field, value, .. } => {
                out.push((field.clone(), TermSelector::Exact(value.clone())));
            }
            QueryPlan::Wildcard { field, pattern, .. } => {
                out.push((field.clone(), TermSelector::Pattern(pattern.clone())));
            }
            QueryPlan::MultiMatch { fields, terms, .. } => {
                for (field, _) in fields {
                    for term in terms {
                        out.push((field.clone(), TermSelector::Exact(term.clone())));
                    }
                }
            }
            QueryPlan::Bool(plan) => {
                for clause in plan.must.iter().chain(plan.should.iter()) {
                    clause.collect_scoring_terms(out);
                }
            }
        }
    }
}

/// Text values of a field path, or of every field for [`ALL_FIELD`].
fn field_texts(source: &Value, field: &str) -> Vec<String> {
    if field == ALL_FIELD {
        return flatten_source(source)
            .into_iter()
            .map(|(_, text)| text)
            .collect();
    }
    lookup_path(source, field)
        .iter()
        .filter_map(|v| scalar_text(v))
        .collect()
}
