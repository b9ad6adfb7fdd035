//! Analyzer implementations for term extraction.
//!
//! The standard analyzer tokenizes on word characters and lowercases every
//! token; the keyword analyzer emits the whole trimmed, lowercased value as a
//! single token. Which analyzer a field uses is decided by its mapping.

use std::sync::Arc;

use regex::Regex;

use crate::analysis::token::Token;
use crate::error::{FalxError, Result};

/// Trait for text analyzers.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze text into a sequence of normalized tokens.
    fn analyze(&self, text: &str) -> Vec<Token>;

    /// The name this analyzer is registered under.
    fn name(&self) -> &str;
}

/// A standard analyzer: word tokenization followed by lowercasing.
///
/// The token pattern `\w+` follows Unicode word boundaries, which is suitable
/// for whitespace-separated languages.
#[derive(Debug, Clone)]
pub struct StandardAnalyzer {
    pattern: Arc<Regex>,
}

impl StandardAnalyzer {
    /// Create a new standard analyzer with the default `\w+` token pattern.
    pub fn new() -> Result<Self> {
        Self::with_pattern(r"\w+")
    }

    /// Create a standard analyzer with a custom token pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| FalxError::analysis(format!("Invalid token pattern: {e}")))?;
        Ok(StandardAnalyzer {
            pattern: Arc::new(regex),
        })
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        self.pattern
            .find_iter(text)
            .enumerate()
            .map(|(position, m)| {
                Token::with_offsets(m.as_str().to_lowercase(), position, m.start(), m.end())
            })
            .collect()
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// A keyword analyzer: the whole trimmed value becomes one lowercased token.
///
/// Used for `keyword`-mapped fields where exact values (tags, identifiers,
/// categories) must match as a unit.
#[derive(Debug, Clone, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let start = trimmed.as_ptr() as usize - text.as_ptr() as usize;
        vec![Token::with_offsets(
            trimmed.to_lowercase(),
            0,
            start,
            start + trimmed.len(),
        )]
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Resolve an analyzer by its registered name.
///
/// Unknown names fail with a validation error so a bad mapping is rejected at
/// index-creation time rather than silently falling back.
pub fn resolve_analyzer(name: &str) -> Result<Arc<dyn Analyzer>> {
    match name {
        "standard" => Ok(Arc::new(StandardAnalyzer::new()?)),
        "keyword" => Ok(Arc::new(KeywordAnalyzer::new())),
        other => Err(FalxError::validation(format!(
            "unknown analyzer '{other}' (expected 'standard' or 'keyword')"
        ))),
    }
}
