//! Query normalization and planning.
//!
//! Incoming JSON query DTOs are rewritten by the [`QueryNormalizer`] into a
//! [`QueryPlan`] tree before execution. Match-all and wildcard patterns hidden
//! inside `match` clauses are detected during normalization, so the executor
//! only ever sees explicit plan variants.

pub mod dto;
pub mod normalizer;
pub mod plan;

pub use self::dto::{
    DEFAULT_PAGE_SIZE, FacetRange, FacetSpec, HighlightRequest, SCORE_FIELD, SearchRequest,
    SortSpec, SuggestRequest,
};
pub use self::normalizer::QueryNormalizer;
pub use self::plan::{ALL_FIELD, BoolPlan, QueryPlan, RangeBounds, TermSelector, compare_values};
