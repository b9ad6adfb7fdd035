//! # Falx
//!
//! A term-indexed search engine core for Rust.
//!
//! ## Features
//!
//! - Per-index inverted term dictionaries with exact, prefix, and wildcard lookup
//! - Durable posting and document stores over pluggable storage backends
//! - JSON query normalization with match-all and wildcard auto-detection
//! - Boolean query execution with BM25 scoring, sorting, and exact-count pagination
//! - Highlighting, facet aggregation, and prefix suggestions
//! - Concurrent bulk indexing with per-batch progress tracking
//! - Index lifecycle management: rebuilds, cache clearing, guarded reset

pub mod analysis;
pub mod bulk;
pub mod cli;
pub mod dictionary;
pub mod docstore;
pub mod engine;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod postings;
pub mod query;
pub mod storage;

pub use crate::engine::{EngineConfig, SearchEngine};
pub use crate::error::{FalxError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
