//! The inverted term dictionary and its supporting pieces.
//!
//! Terms are keyed by `(field, term)` pairs in one ordered map per index, so
//! prefix scans walk a contiguous key range and exact lookups never collide
//! across fields.

pub mod cache;
pub mod pattern;
pub mod term_dictionary;

pub use cache::{ScanCache, ScanCacheStats};
pub use pattern::{WildcardPattern, contains_wildcard};
pub use term_dictionary::{FieldStats, TermDictionary, TermKey};
