//! Prefix term suggestions.

use ahash::AHashMap;
use serde::Serialize;

use crate::dictionary::TermDictionary;
use crate::error::{FalxError, Result};
use crate::query::dto::SuggestRequest;

const DEFAULT_SUGGEST_SIZE: usize = 5;

/// One completion candidate.
///
/// `freq` is the number of documents containing the term; `score` is the
/// frequency relative to the best candidate, so the top suggestion is 1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub text: String,
    pub score: f32,
    pub freq: u64,
}

/// Suggest indexed terms completing the request's prefix.
///
/// Without a `field` the scan covers every field, summing document
/// frequencies for terms that appear in several.
pub fn suggest_terms(
    dictionary: &TermDictionary,
    request: &SuggestRequest,
) -> Result<Vec<Suggestion>> {
    let prefix = request.text.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(FalxError::validation("suggest text must not be empty"));
    }
    let size = request.size.unwrap_or(DEFAULT_SUGGEST_SIZE);

    let fields = match &request.field {
        Some(field) => vec![field.clone()],
        None => dictionary.fields(),
    };

    let mut frequencies: AHashMap<String, u64> = AHashMap::new();
    for field in &fields {
        for term in dictionary.scan_prefix(field, &prefix) {
            let freq = dictionary
                .lookup(field, &term)
                .map(|list| list.doc_frequency())
                .unwrap_or(0);
            *frequencies.entry(term).or_insert(0) += freq;
        }
    }

    let mut candidates: Vec<(String, u64)> = frequencies.into_iter().collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    candidates.truncate(size);

    let top = candidates.first().map(|(_, freq)| *freq).unwrap_or(0);
    let suggestions = candidates
        .into_iter()
        .map(|(text, freq)| Suggestion {
            text,
            score: if top > 0 { freq as f32 / top as f32 } else { 0.0 },
            freq,
        })
        .collect();
    Ok(suggestions)
}
