//! Fragment highlighting for search hits.

use std::collections::BTreeMap;
use std::ops::Range;

use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::{Analyzer, flatten_source};
use crate::query::dto::HighlightRequest;
use crate::query::plan::{ALL_FIELD, QueryPlan, TermSelector};

/// Wraps query-matched terms in tagged fragments.
///
/// Match criteria come from the plan's scoring clauses, so filter-only and
/// must-not terms never light up. Fragment boundaries snap to Unicode word
/// bounds so tags never split a grapheme.
pub struct Highlighter<'a> {
    request: &'a HighlightRequest,
    selectors: Vec<(String, TermSelector)>,
}

impl<'a> Highlighter<'a> {
    pub fn new(request: &'a HighlightRequest, plan: &QueryPlan) -> Self {
        Highlighter {
            request,
            selectors: plan.scoring_terms(),
        }
    }

    /// Highlighted fragments per field, or `None` when nothing matched.
    pub fn highlight(
        &self,
        source: &Value,
        analyzer: &dyn Analyzer,
    ) -> Option<BTreeMap<String, Vec<String>>> {
        if self.selectors.is_empty() {
            return None;
        }
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, text) in flatten_source(source) {
            if !self.wants_field(&field) {
                continue;
            }
            let spans = self.match_spans(&field, &text, analyzer);
            if spans.is_empty() {
                continue;
            }
            let fragments = self.build_fragments(&text, &spans);
            if !fragments.is_empty() {
                out.entry(field).or_default().extend(fragments);
            }
        }
        if out.is_empty() { None } else { Some(out) }
    }

    fn wants_field(&self, field: &str) -> bool {
        self.request.fields.is_empty() || self.request.fields.iter().any(|f| f == field)
    }

    /// Byte ranges of matched tokens, merged where adjacent matches touch.
    fn match_spans(&self, field: &str, text: &str, analyzer: &dyn Analyzer) -> Vec<Range<usize>> {
        let relevant: Vec<&TermSelector> = self
            .selectors
            .iter()
            .filter(|(target, _)| target == field || target == ALL_FIELD)
            .map(|(_, selector)| selector)
            .collect();
        if relevant.is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        for token in analyzer.analyze(text) {
            if relevant.iter().any(|selector| selector.matches(&token.text)) {
                spans.push(token.start_offset..token.end_offset);
            }
        }
        merge_spans(spans)
    }

    fn build_fragments(&self, text: &str, spans: &[Range<usize>]) -> Vec<String> {
        let size = self.request.fragment_size;
        // Fragment size or count of zero disables fragmentation: the whole
        // field comes back as one tagged string.
        if size == 0 || self.request.number_of_fragments == 0 || text.len() <= size {
            return vec![self.wrap(text, spans, 0)];
        }

        let mut fragments = Vec::new();
        let mut consumed = 0usize;
        for span in spans {
            if fragments.len() >= self.request.number_of_fragments {
                break;
            }
            if span.start < consumed {
                continue;
            }
            let lead = size.saturating_sub(span.len()) / 2;
            let start = word_boundary_before(text, span.start.saturating_sub(lead));
            let end = word_boundary_after(text, (start + size.max(span.len())).min(text.len()));
            let in_window: Vec<Range<usize>> = spans
                .iter()
                .filter(|s| s.start >= start && s.end <= end)
                .cloned()
                .collect();
            fragments.push(self.wrap(&text[start..end], &in_window, start));
            consumed = end;
        }
        fragments
    }

    /// Insert tags around each span. `base` is the fragment's byte offset in
    /// the original text.
    fn wrap(&self, fragment: &str, spans: &[Range<usize>], base: usize) -> String {
        let mut out = String::with_capacity(fragment.len() + spans.len() * 16);
        let mut cursor = 0usize;
        for span in spans {
            let start = span.start - base;
            let end = span.end - base;
            out.push_str(&fragment[cursor..start]);
            out.push_str(&self.request.pre_tag);
            out.push_str(&fragment[start..end]);
            out.push_str(&self.request.post_tag);
            cursor = end;
        }
        out.push_str(&fragment[cursor..]);
        out
    }
}

fn merge_spans(spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
        } else {
            merged.push(span);
        }
    }
    merged
}

fn word_boundary_before(text: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    text.split_word_bound_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= pos)
        .last()
        .unwrap_or(0)
}

fn word_boundary_after(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    text.split_word_bound_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= pos)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StandardAnalyzer;
    use crate::query::normalizer::QueryNormalizer;
    use serde_json::json;

    fn plan_for(query: serde_json::Value) -> QueryPlan {
        QueryNormalizer::new()
            .unwrap()
            .normalize(Some(&query))
            .unwrap()
    }

    fn highlight(
        request: &HighlightRequest,
        query: serde_json::Value,
        source: serde_json::Value,
    ) -> Option<BTreeMap<String, Vec<String>>> {
        let plan = plan_for(query);
        let analyzer = StandardAnalyzer::new().unwrap();
        Highlighter::new(request, &plan).highlight(&source, &analyzer)
    }

    #[test]
    fn test_wraps_matched_terms() {
        let request = HighlightRequest::default();
        let result = highlight(
            &request,
            json!({"match": {"field": "title", "value": "wireless"}}),
            json!({"title": "Wireless Headphones"}),
        )
        .unwrap();
        assert_eq!(result["title"], vec!["<em>Wireless</em> Headphones"]);
    }

    #[test]
    fn test_custom_tags() {
        let request = HighlightRequest {
            pre_tag: "[".to_string(),
            post_tag: "]".to_string(),
            ..HighlightRequest::default()
        };
        let result = highlight(
            &request,
            json!({"match": {"field": "title", "value": "lamp"}}),
            json!({"title": "Desk Lamp"}),
        )
        .unwrap();
        assert_eq!(result["title"], vec!["Desk [Lamp]"]);
    }

    #[test]
    fn test_field_restriction() {
        let request = HighlightRequest {
            fields: vec!["title".to_string()],
            ..HighlightRequest::default()
        };
        let result = highlight(
            &request,
            json!("phone"),
            json!({"title": "Phone case", "description": "Fits any phone"}),
        )
        .unwrap();
        assert!(result.contains_key("title"));
        assert!(!result.contains_key("description"));
    }

    #[test]
    fn test_all_field_query_lights_every_field() {
        let request = HighlightRequest::default();
        let result = highlight(
            &request,
            json!("phone"),
            json!({"title": "Phone case", "description": "Fits any phone"}),
        )
        .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_wildcard_selector() {
        let request = HighlightRequest::default();
        let result = highlight(
            &request,
            json!({"wildcard": {"title": "smart*"}}),
            json!({"title": "A smartphone and a smartwatch"}),
        )
        .unwrap();
        assert_eq!(
            result["title"],
            vec!["A <em>smartphone</em> and a <em>smartwatch</em>"]
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        let request = HighlightRequest::default();
        let result = highlight(
            &request,
            json!({"match": {"field": "title", "value": "tablet"}}),
            json!({"title": "Wireless Headphones"}),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_match_all_has_nothing_to_highlight() {
        let request = HighlightRequest::default();
        let result = highlight(
            &request,
            json!({"match_all": {}}),
            json!({"title": "Wireless Headphones"}),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_fragments_window_long_text() {
        let request = HighlightRequest {
            fragment_size: 30,
            number_of_fragments: 2,
            ..HighlightRequest::default()
        };
        let filler = "lorem ipsum dolor sit amet ".repeat(5);
        let text = format!("{filler} beacon {filler} beacon {filler}");
        let result = highlight(
            &request,
            json!({"match": {"field": "body", "value": "beacon"}}),
            json!({"body": text}),
        )
        .unwrap();

        let fragments = &result["body"];
        assert_eq!(fragments.len(), 2);
        for fragment in fragments {
            assert!(fragment.contains("<em>beacon</em>"));
            // Window stays near the configured size plus tag overhead.
            assert!(fragment.len() < 80, "fragment too long: {fragment:?}");
        }
    }

    #[test]
    fn test_filter_terms_not_highlighted() {
        let request = HighlightRequest::default();
        let result = highlight(
            &request,
            json!({"bool": {
                "must": [{"match": {"field": "title", "value": "phone"}}],
                "filter": [{"term": {"field": "title", "value": "case"}}]
            }}),
            json!({"title": "phone case"}),
        )
        .unwrap();
        assert_eq!(result["title"], vec!["<em>phone</em> case"]);
    }
}
