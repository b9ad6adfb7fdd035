//! Query execution against the term dictionary and document store.

#[allow(clippy::module_inception)]
pub mod executor;
pub mod facet;
pub mod highlight;
pub mod pagination;
pub mod scorer;
pub mod suggest;

pub use self::executor::{QueryExecutor, SearchHit, SearchOutcome};
pub use self::facet::{FacetBucket, FacetResult, compute_facets};
pub use self::highlight::Highlighter;
pub use self::pagination::Pagination;
pub use self::scorer::BM25Scorer;
pub use self::suggest::{Suggestion, suggest_terms};
