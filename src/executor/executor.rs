//! Plan evaluation and result assembly.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use serde_json::Value;

use crate::analysis::{Analyzer, flatten_source, lookup_path};
use crate::dictionary::{ScanCache, TermDictionary, WildcardPattern};
use crate::docstore::DocumentStore;
use crate::error::{FalxError, Result};
use crate::executor::facet::{FacetResult, compute_facets};
use crate::executor::highlight::Highlighter;
use crate::executor::pagination::Pagination;
use crate::executor::scorer::BM25Scorer;
use crate::query::dto::{SCORE_FIELD, SearchRequest, SortSpec};
use crate::query::plan::{ALL_FIELD, BoolPlan, QueryPlan, compare_values};

/// One scored result document.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub source: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<BTreeMap<String, Vec<String>>>,
}

/// Everything a search produced before envelope assembly.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub total: usize,
    pub hits: Vec<SearchHit>,
    pub pagination: Pagination,
    pub facets: Option<BTreeMap<String, FacetResult>>,
}

/// Executes query plans against one index's dictionary and document store.
///
/// The executor is strictly read-only; it borrows the index state for the
/// duration of one request and never mutates it.
pub struct QueryExecutor<'a> {
    dictionary: &'a TermDictionary,
    documents: &'a DocumentStore,
    cache: &'a ScanCache,
    deadline: Option<Instant>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(
        dictionary: &'a TermDictionary,
        documents: &'a DocumentStore,
        cache: &'a ScanCache,
    ) -> Self {
        QueryExecutor {
            dictionary,
            documents,
            cache,
            deadline: None,
        }
    }

    /// Abort evaluation with a timeout error once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run a full search: evaluate, filter, rank, facet, paginate, highlight.
    pub fn search(
        &self,
        plan: &QueryPlan,
        filter: Option<&QueryPlan>,
        request: &SearchRequest,
        analyzer: &dyn Analyzer,
    ) -> Result<SearchOutcome> {
        let size = request.page_size();
        if size == 0 {
            return Err(FalxError::validation("size must be greater than zero"));
        }
        let from = request.offset();

        let mut scored = self.evaluate(plan)?;
        if let Some(filter_plan) = filter {
            let allowed = self.matching_set(filter_plan)?;
            scored.retain(|ordinal, _| allowed.contains(ordinal));
        }

        let sort_specs = match &request.sort {
            Some(value) => SortSpec::parse(value)?,
            None => Vec::new(),
        };
        let mut ranked: Vec<(u32, f32)> = scored.into_iter().collect();
        self.rank(&mut ranked, &sort_specs);

        let total = ranked.len();
        let pagination = Pagination::compute(total, size, from);

        // Facets cover the whole match set, not the returned page.
        let facets = match &request.facets {
            Some(specs) if !specs.is_empty() => {
                let ordinals: Vec<u32> = ranked.iter().map(|(ordinal, _)| *ordinal).collect();
                Some(compute_facets(specs, &ordinals, self.documents)?)
            }
            _ => None,
        };

        let highlighter = request
            .highlight
            .as_ref()
            .map(|spec| Highlighter::new(spec, plan));

        let mut hits = Vec::with_capacity(size.min(total.saturating_sub(from)));
        for &(ordinal, score) in ranked.iter().skip(from).take(size) {
            let Some(stored) = self.documents.stored(ordinal) else {
                continue;
            };
            let highlight = highlighter
                .as_ref()
                .and_then(|h| h.highlight(&stored.source, analyzer));
            hits.push(SearchHit {
                id: stored.id,
                score,
                source: stored.source,
                highlight,
            });
        }

        Ok(SearchOutcome {
            total,
            hits,
            pagination,
            facets,
        })
    }

    /// Number of documents a plan matches, without assembling hits.
    pub fn count(&self, plan: &QueryPlan) -> Result<usize> {
        Ok(self.evaluate(plan)?.len())
    }

    fn check_deadline(&self) -> Result<()> {
        if let Some(deadline) = self.deadline
            && Instant::now() > deadline
        {
            return Err(FalxError::timeout("search exceeded its execution deadline"));
        }
        Ok(())
    }

    /// Evaluate a plan into `ordinal -> score`.
    fn evaluate(&self, plan: &QueryPlan) -> Result<AHashMap<u32, f32>> {
        self.check_deadline()?;
        match plan {
            QueryPlan::MatchAll { boost } => Ok(self
                .documents
                .iter_live()
                .map(|(ordinal, _, _)| (ordinal, *boost))
                .collect()),
            QueryPlan::MatchNone => Ok(AHashMap::new()),
            QueryPlan::Term {
                field,
                value,
                boost,
            } => {
                let mut scored = AHashMap::new();
                for field in self.expand_field(field) {
                    self.score_term(&field, value, *boost, &mut scored);
                }
                Ok(scored)
            }
            QueryPlan::Wildcard {
                field,
                pattern,
                boost,
            } => {
                let mut scored = AHashMap::new();
                for field in self.expand_field(field) {
                    for term in self.scan_terms(&field, pattern) {
                        self.check_deadline()?;
                        self.score_term(&field, &term, *boost, &mut scored);
                    }
                }
                Ok(scored)
            }
            QueryPlan::Range {
                field,
                bounds,
                boost,
            } => {
                let mut scored = AHashMap::new();
                for (ordinal, _, source) in self.documents.iter_live() {
                    let matched = if field == ALL_FIELD {
                        flatten_source(source)
                            .into_iter()
                            .any(|(_, text)| bounds.contains(&Value::String(text)))
                    } else {
                        lookup_path(source, field)
                            .iter()
                            .any(|value| bounds.contains(value))
                    };
                    if matched {
                        scored.insert(ordinal, *boost);
                    }
                }
                Ok(scored)
            }
            QueryPlan::MultiMatch {
                fields,
                terms,
                boost,
            } => {
                // Best-field semantics: each document keeps its strongest
                // single-field score rather than the sum across fields.
                let mut scored: AHashMap<u32, f32> = AHashMap::new();
                for (field, field_boost) in fields {
                    let mut field_scores = AHashMap::new();
                    for term in terms {
                        self.score_term(field, term, boost * field_boost, &mut field_scores);
                    }
                    for (ordinal, score) in field_scores {
                        let best = scored.entry(ordinal).or_insert(0.0);
                        if score > *best {
                            *best = score;
                        }
                    }
                }
                Ok(scored)
            }
            QueryPlan::Bool(bool_plan) => self.evaluate_bool(bool_plan),
        }
    }

    fn evaluate_bool(&self, plan: &BoolPlan) -> Result<AHashMap<u32, f32>> {
        // Positive base: intersection of must (scoring) and filter
        // (non-scoring) clauses.
        let mut candidates: Option<AHashMap<u32, f32>> = None;

        for clause in &plan.must {
            let scored = self.evaluate(clause)?;
            candidates = Some(match candidates {
                None => scored,
                Some(mut current) => {
                    current.retain(|ordinal, _| scored.contains_key(ordinal));
                    for (ordinal, score) in scored {
                        if let Some(total) = current.get_mut(&ordinal) {
                            *total += score;
                        }
                    }
                    current
                }
            });
        }
        for clause in &plan.filter {
            let allowed = self.matching_set(clause)?;
            candidates = Some(match candidates {
                None => allowed.into_iter().map(|ordinal| (ordinal, 0.0)).collect(),
                Some(mut current) => {
                    current.retain(|ordinal, _| allowed.contains(ordinal));
                    current
                }
            });
        }

        let mut result = match candidates {
            Some(candidates) if !plan.should.is_empty() => {
                let should_hits = self.evaluate_should(&plan.should)?;
                let mut result = AHashMap::with_capacity(candidates.len());
                for (ordinal, base) in candidates {
                    let (matched, extra) = should_hits.get(&ordinal).copied().unwrap_or((0, 0.0));
                    if matched >= plan.minimum_should_match {
                        result.insert(ordinal, base + extra);
                    }
                }
                result
            }
            Some(candidates) => candidates,
            None if !plan.should.is_empty() => {
                let minimum = plan.minimum_should_match.max(1);
                self.evaluate_should(&plan.should)?
                    .into_iter()
                    .filter(|(_, (matched, _))| *matched >= minimum)
                    .map(|(ordinal, (_, score))| (ordinal, score))
                    .collect()
            }
            // Pure must_not: every live document matches until negated.
            None => self
                .documents
                .iter_live()
                .map(|(ordinal, _, _)| (ordinal, 0.0))
                .collect(),
        };

        for clause in &plan.must_not {
            let excluded = self.matching_set(clause)?;
            result.retain(|ordinal, _| !excluded.contains(ordinal));
        }

        if plan.boost != 1.0 {
            for score in result.values_mut() {
                *score *= plan.boost;
            }
        }
        Ok(result)
    }

    /// Per-ordinal `(matched clause count, score sum)` over should clauses.
    fn evaluate_should(&self, clauses: &[QueryPlan]) -> Result<AHashMap<u32, (usize, f32)>> {
        let mut hits: AHashMap<u32, (usize, f32)> = AHashMap::new();
        for clause in clauses {
            for (ordinal, score) in self.evaluate(clause)? {
                let entry = hits.entry(ordinal).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += score;
            }
        }
        Ok(hits)
    }

    fn matching_set(&self, plan: &QueryPlan) -> Result<AHashSet<u32>> {
        Ok(self.evaluate(plan)?.into_keys().collect())
    }

    fn expand_field(&self, field: &str) -> Vec<String> {
        if field == ALL_FIELD {
            self.dictionary.fields()
        } else {
            vec![field.to_string()]
        }
    }

    /// Accumulate BM25 contributions of one `(field, term)` leaf.
    fn score_term(&self, field: &str, term: &str, boost: f32, scored: &mut AHashMap<u32, f32>) {
        let Some(postings) = self.dictionary.lookup(field, term) else {
            return;
        };
        let avg_length = self
            .dictionary
            .field_stats(field)
            .map(|stats| stats.avg_length())
            .unwrap_or(0.0);
        let scorer = BM25Scorer::new(
            postings.doc_frequency(),
            avg_length,
            self.documents.live_count() as u64,
            boost,
        );
        for posting in postings.iter() {
            if !self.documents.is_live(posting.ordinal) {
                continue;
            }
            let field_length = self.dictionary.field_length(posting.ordinal, field);
            *scored.entry(posting.ordinal).or_insert(0.0) +=
                scorer.score(posting.frequency, field_length);
        }
    }

    /// Wildcard term scans go through the per-index cache, keyed by field and
    /// pattern and invalidated by dictionary generation.
    fn scan_terms(&self, field: &str, pattern: &WildcardPattern) -> Vec<String> {
        let key = ScanCache::scan_key(field, pattern.pattern());
        let generation = self.dictionary.generation();
        if let Some(terms) = self.cache.get(&key, generation) {
            return terms;
        }
        let terms = self.dictionary.scan_wildcard(field, pattern);
        self.cache.put(key, terms.clone(), generation);
        terms
    }

    fn rank(&self, ranked: &mut [(u32, f32)], specs: &[SortSpec]) {
        ranked.sort_by(|a, b| {
            for spec in specs {
                let ord = if spec.field == SCORE_FIELD {
                    let ord = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
                    if spec.ascending { ord } else { ord.reverse() }
                } else {
                    self.compare_field(a.0, b.0, &spec.field, spec.ascending)
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
    }

    /// Field comparison for sorting. Documents missing the field sort last
    /// in both directions.
    fn compare_field(&self, a: u32, b: u32, field: &str, ascending: bool) -> Ordering {
        let value_a = self.sort_value(a, field);
        let value_b = self.sort_value(b, field);
        match (value_a, value_b) {
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
                if ascending { ord } else { ord.reverse() }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn sort_value(&self, ordinal: u32, field: &str) -> Option<&Value> {
        self.documents
            .source_of(ordinal)
            .and_then(|source| lookup_path(source, field).into_iter().next())
    }
}
