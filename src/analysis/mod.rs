//! Text analysis pipeline for term extraction.
//!
//! Documents and query text pass through an [`Analyzer`] before they reach the
//! term dictionary. Two analyzers cover the supported mapping types: the
//! [`StandardAnalyzer`] (word tokenization plus lowercasing) for `text` fields
//! and the [`KeywordAnalyzer`] (whole lowercased value) for `keyword` fields.

pub mod analyzer;
pub mod fields;
pub mod token;

pub use self::analyzer::{Analyzer, KeywordAnalyzer, StandardAnalyzer, resolve_analyzer};
pub use self::fields::{flatten_source, lookup_path, scalar_text};
pub use self::token::Token;
