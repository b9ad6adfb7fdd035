//! Facet aggregation over a query's matching document set.
//!
//! Facets always run over the full post-filter match set, independent of
//! pagination, so bucket counts stay stable as the client pages through.

use std::collections::BTreeMap;

use ahash::AHashMap;
use chrono::{DateTime, Datelike, Days, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::analysis::lookup_path;
use crate::docstore::DocumentStore;
use crate::error::{FalxError, Result};
use crate::query::dto::{
    DateHistogramFacet, FacetSpec, HistogramFacet, RangeFacet, TermsFacet,
};

/// One aggregation bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetBucket {
    pub key: String,
    pub count: u64,
}

/// All buckets of one named facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetResult {
    pub buckets: Vec<FacetBucket>,
}

/// Compute every requested facet over the matching ordinals.
pub fn compute_facets(
    specs: &BTreeMap<String, FacetSpec>,
    ordinals: &[u32],
    documents: &DocumentStore,
) -> Result<BTreeMap<String, FacetResult>> {
    let mut results = BTreeMap::new();
    for (name, spec) in specs {
        let result = match spec {
            FacetSpec::Terms(facet) => terms_facet(facet, ordinals, documents),
            FacetSpec::Range(facet) => range_facet(facet, ordinals, documents),
            FacetSpec::Histogram(facet) => histogram_facet(facet, ordinals, documents)?,
            FacetSpec::DateHistogram(facet) => date_histogram_facet(facet, ordinals, documents)?,
        };
        results.insert(name.clone(), result);
    }
    Ok(results)
}

fn field_values<'a>(
    documents: &'a DocumentStore,
    ordinal: u32,
    field: &str,
) -> Vec<&'a Value> {
    documents
        .source_of(ordinal)
        .map(|source| lookup_path(source, field))
        .unwrap_or_default()
}

/// Top distinct raw values by document count. A document contributes at most
/// once per value even when the field repeats it.
fn terms_facet(facet: &TermsFacet, ordinals: &[u32], documents: &DocumentStore) -> FacetResult {
    let mut counts: AHashMap<String, u64> = AHashMap::new();
    for &ordinal in ordinals {
        let mut seen: Vec<String> = Vec::new();
        for value in field_values(documents, ordinal, &facet.field) {
            let Some(key) = facet_key(value) else {
                continue;
            };
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        for key in seen {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    let mut buckets: Vec<FacetBucket> = counts
        .into_iter()
        .map(|(key, count)| FacetBucket { key, count })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(facet.size);
    FacetResult { buckets }
}

fn facet_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Buckets in the caller's listed order; `from` inclusive, `to` exclusive.
fn range_facet(facet: &RangeFacet, ordinals: &[u32], documents: &DocumentStore) -> FacetResult {
    let mut counts = vec![0u64; facet.ranges.len()];
    for &ordinal in ordinals {
        let numbers: Vec<f64> = field_values(documents, ordinal, &facet.field)
            .iter()
            .filter_map(|v| numeric_value(v))
            .collect();
        for (slot, range) in facet.ranges.iter().enumerate() {
            if numbers.iter().any(|&n| range.contains(n)) {
                counts[slot] += 1;
            }
        }
    }
    let buckets = facet
        .ranges
        .iter()
        .zip(counts)
        .map(|(range, count)| FacetBucket {
            key: range.label(),
            count,
        })
        .collect();
    FacetResult { buckets }
}

fn histogram_facet(
    facet: &HistogramFacet,
    ordinals: &[u32],
    documents: &DocumentStore,
) -> Result<FacetResult> {
    if facet.interval <= 0.0 {
        return Err(FalxError::validation(
            "histogram interval must be positive",
        ));
    }
    let mut counts: AHashMap<i64, u64> = AHashMap::new();
    for &ordinal in ordinals {
        let mut slots: Vec<i64> = field_values(documents, ordinal, &facet.field)
            .iter()
            .filter_map(|v| numeric_value(v))
            .map(|n| (n / facet.interval).floor() as i64)
            .collect();
        slots.sort_unstable();
        slots.dedup();
        for slot in slots {
            *counts.entry(slot).or_insert(0) += 1;
        }
    }

    let mut slots: Vec<i64> = counts.keys().copied().collect();
    slots.sort_unstable();
    let buckets = slots
        .into_iter()
        .map(|slot| {
            let lower = slot as f64 * facet.interval;
            FacetBucket {
                key: number_label(lower),
                count: counts[&slot],
            }
        })
        .collect();
    Ok(FacetResult { buckets })
}

fn date_histogram_facet(
    facet: &DateHistogramFacet,
    ordinals: &[u32],
    documents: &DocumentStore,
) -> Result<FacetResult> {
    let interval = DateInterval::parse(&facet.interval)?;
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for &ordinal in ordinals {
        let mut keys: Vec<String> = field_values(documents, ordinal, &facet.field)
            .iter()
            .filter_map(|v| parse_date(v))
            .map(|dt| interval.bucket(dt))
            .collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    let buckets = counts
        .into_iter()
        .map(|(key, count)| FacetBucket { key, count })
        .collect();
    Ok(FacetResult { buckets })
}

#[derive(Debug, Clone, Copy)]
enum DateInterval {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl DateInterval {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "hour" => Ok(DateInterval::Hour),
            "day" => Ok(DateInterval::Day),
            "week" => Ok(DateInterval::Week),
            "month" => Ok(DateInterval::Month),
            "year" => Ok(DateInterval::Year),
            other => Err(FalxError::validation(format!(
                "unknown date histogram interval '{other}' (expected hour, day, week, month, or year)"
            ))),
        }
    }

    /// Truncate a timestamp to its bucket label. Weeks start on Monday.
    fn bucket(self, dt: DateTime<Utc>) -> String {
        match self {
            DateInterval::Hour => dt.format("%Y-%m-%dT%H:00:00Z").to_string(),
            DateInterval::Day => dt.format("%Y-%m-%d").to_string(),
            DateInterval::Week => {
                let days_back = u64::from(dt.weekday().num_days_from_monday());
                let monday = dt.date_naive() - Days::new(days_back);
                monday.format("%Y-%m-%d").to_string()
            }
            DateInterval::Month => dt.format("%Y-%m").to_string(),
            DateInterval::Year => dt.format("%Y").to_string(),
        }
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|ndt| ndt.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn number_label(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
