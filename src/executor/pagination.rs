//! Offset pagination metadata.

use serde::{Deserialize, Serialize};

/// Page bookkeeping attached to every successful search response.
///
/// `total_results` is an exact count over the full matching set, never an
/// estimate from the returned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub total_results: usize,
}

impl Pagination {
    /// Derive pagination metadata from an exact total and the request's
    /// `size`/`from`. Callers validate `size > 0`.
    pub fn compute(total: usize, size: usize, from: usize) -> Pagination {
        Pagination {
            current_page: from / size + 1,
            total_pages: total.div_ceil(size),
            page_size: size,
            has_next: from + size < total,
            has_previous: from > 0,
            total_results: total,
        }
    }
}
