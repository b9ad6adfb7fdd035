//! Engine facade: the crate's primary entry point.

pub mod config;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod response;

pub use self::config::EngineConfig;
pub use self::engine::SearchEngine;
pub use self::response::{
    BulkIndexRequest, BulkItemResult, BulkResponse, ClearCacheResponse, ClearPostingsResponse,
    CreateIndexRequest, DeleteByQueryResponse, DeleteFailure, DocumentListResponse,
    DocumentResponse, DocumentWriteResponse, IndexDocumentRequest, IndexListResponse,
    IndexResponse, JobPerformance, JobStatusResponse, RebuildResponse, SearchData, SearchResponse,
    SuggestResponse, SystemResetResponse, UpdateIndexRequest,
};
