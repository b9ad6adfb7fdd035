//! BM25 relevance scoring.

/// Per-term BM25 scorer.
///
/// One scorer is built per `(field, term)` leaf during execution, seeded with
/// that term's document frequency and the field's length statistics. The IDF
/// uses the `ln(1 + ...)` form so scores stay non-negative even for terms
/// present in most documents.
#[derive(Debug, Clone)]
pub struct BM25Scorer {
    /// Number of documents containing the term in this field.
    doc_freq: u64,
    /// Average token count of the field across the index.
    avg_field_length: f64,
    /// Number of live documents in the index.
    total_docs: u64,
    /// Boost factor applied multiplicatively to the final score.
    boost: f32,
    /// BM25 k1 parameter.
    k1: f32,
    /// BM25 b parameter.
    b: f32,
}

impl BM25Scorer {
    /// Create a scorer with the standard k1=1.2, b=0.75 parameters.
    pub fn new(doc_freq: u64, avg_field_length: f64, total_docs: u64, boost: f32) -> Self {
        Self::with_params(doc_freq, avg_field_length, total_docs, boost, 1.2, 0.75)
    }

    /// Create a scorer with custom BM25 parameters.
    pub fn with_params(
        doc_freq: u64,
        avg_field_length: f64,
        total_docs: u64,
        boost: f32,
        k1: f32,
        b: f32,
    ) -> Self {
        BM25Scorer {
            doc_freq,
            avg_field_length,
            total_docs,
            boost,
            k1,
            b,
        }
    }

    /// Inverse document frequency component.
    fn idf(&self) -> f32 {
        if self.doc_freq == 0 || self.total_docs == 0 {
            return 0.0;
        }
        let n = self.total_docs as f32;
        let df = self.doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Length-normalized term frequency component.
    fn tf(&self, term_freq: f32, field_length: f32) -> f32 {
        if term_freq == 0.0 {
            return 0.0;
        }
        let avg_len = if self.avg_field_length > 0.0 {
            self.avg_field_length as f32
        } else {
            1.0
        };
        let norm = 1.0 - self.b + self.b * (field_length / avg_len);
        (term_freq * (self.k1 + 1.0)) / (term_freq + self.k1 * norm)
    }

    /// Score one document occurrence.
    pub fn score(&self, term_freq: u32, field_length: u32) -> f32 {
        self.idf() * self.tf(term_freq as f32, field_length as f32) * self.boost
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn k1(&self) -> f32 {
        self.k1
    }

    pub fn b(&self) -> f32 {
        self.b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_frequency_scores_zero() {
        let scorer = BM25Scorer::new(5, 10.0, 100, 1.0);
        assert_eq!(scorer.score(0, 10), 0.0);
    }

    #[test]
    fn test_score_is_positive() {
        let scorer = BM25Scorer::new(5, 10.0, 100, 1.0);
        assert!(scorer.score(3, 10) > 0.0);
        // Terms in every document still score above zero.
        let common = BM25Scorer::new(100, 10.0, 100, 1.0);
        assert!(common.score(3, 10) > 0.0);
    }

    #[test]
    fn test_rare_terms_outscore_common_terms() {
        let rare = BM25Scorer::new(2, 10.0, 1000, 1.0);
        let common = BM25Scorer::new(900, 10.0, 1000, 1.0);
        assert!(rare.score(1, 10) > common.score(1, 10));
    }

    #[test]
    fn test_term_frequency_saturates() {
        let scorer = BM25Scorer::new(10, 10.0, 1000, 1.0);
        let low = scorer.score(1, 10);
        let mid = scorer.score(5, 10);
        let high = scorer.score(50, 10);
        assert!(mid > low);
        assert!(high > mid);
        // Doubling an already-high frequency gains less than the first hits.
        assert!(high - mid < (mid - low) * 5.0);
    }

    #[test]
    fn test_long_fields_are_penalized() {
        let scorer = BM25Scorer::new(10, 10.0, 1000, 1.0);
        assert!(scorer.score(2, 5) > scorer.score(2, 50));
    }

    #[test]
    fn test_boost_scales_linearly() {
        let base = BM25Scorer::new(10, 10.0, 1000, 1.0);
        let boosted = BM25Scorer::new(10, 10.0, 1000, 2.0);
        let score = base.score(2, 10);
        assert!((boosted.score(2, 10) - score * 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_custom_params() {
        // b=0 disables length normalization entirely.
        let scorer = BM25Scorer::with_params(10, 10.0, 1000, 1.0, 1.2, 0.0);
        assert_eq!(scorer.score(2, 5), scorer.score(2, 500));
        assert_eq!(scorer.k1(), 1.2);
        assert_eq!(scorer.b(), 0.0);
    }
}
