//! Request and response envelopes of the engine's operation surface.
//!
//! Field names follow the wire contract: camelCase keys, `data.pagination`
//! on every search, and partial-failure reporting (`successCount`,
//! `failures`) instead of batch-aborting errors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bulk::{BulkDocumentItem, BulkJob, BulkJobOptions, JobProgress, JobStatus};
use crate::executor::{FacetResult, Pagination, SearchHit, Suggestion};
use crate::lifecycle::{IndexMappings, IndexMetadata, IndexSettings, IndexSettingsPatch, IndexStatus};

/// Body of a create-index call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIndexRequest {
    pub name: String,
    #[serde(default)]
    pub settings: IndexSettings,
    #[serde(default)]
    pub mappings: IndexMappings,
}

/// Body of an update-index call; both parts are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateIndexRequest {
    pub settings: Option<IndexSettingsPatch>,
    pub mappings: Option<IndexMappings>,
}

/// Body of a single-document index call.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexDocumentRequest {
    pub id: Option<String>,
    pub document: Value,
}

impl Default for IndexDocumentRequest {
    fn default() -> Self {
        IndexDocumentRequest {
            id: None,
            document: Value::Null,
        }
    }
}

/// Body of a synchronous bulk call.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkIndexRequest {
    pub documents: Vec<BulkDocumentItem>,
}

/// One index as reported to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub name: String,
    pub status: IndexStatus,
    pub document_count: u64,
    pub created_at: DateTime<Utc>,
    pub settings: IndexSettings,
    pub mappings: IndexMappings,
}

impl From<IndexMetadata> for IndexResponse {
    fn from(metadata: IndexMetadata) -> Self {
        IndexResponse {
            name: metadata.name,
            status: metadata.status,
            document_count: metadata.doc_count,
            created_at: metadata.created_at,
            settings: metadata.settings,
            mappings: metadata.mappings,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexListResponse {
    pub indices: Vec<IndexResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResponse {
    pub documents_processed: u64,
    pub terms_indexed: u64,
    pub took: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheResponse {
    pub cleared_terms: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearPostingsResponse {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemResetResponse {
    pub reset_components: Vec<String>,
}

/// Outcome of a single-document write.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWriteResponse {
    pub id: String,
    pub version: u64,
    /// `created` or `updated`.
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub version: u64,
    pub source: Value,
}

/// Per-item outcome inside a synchronous bulk response.
#[derive(Debug, Clone, Serialize)]
pub struct BulkItemResult {
    pub id: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub took: u64,
    pub errors: bool,
    pub success_count: usize,
    pub items: Vec<BulkItemResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteByQueryResponse {
    pub took: u64,
    pub deleted: u64,
    pub failures: Vec<DeleteFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentListResponse {
    pub total: usize,
    pub documents: Vec<DocumentResponse>,
}

/// The `data` block of a search response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchData {
    pub total: usize,
    pub max_score: Option<f32>,
    pub hits: Vec<SearchHit>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub data: SearchData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<BTreeMap<String, FacetResult>>,
    pub took: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
    pub took: u64,
}

/// Throughput figures of a bulk job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPerformance {
    pub duration_ms: u64,
    pub documents_per_second: f64,
}

/// One bulk job as reported to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub batch_id: String,
    pub index: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub configuration: BulkJobOptions,
    pub performance: JobPerformance,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl From<BulkJob> for JobStatusResponse {
    fn from(job: BulkJob) -> Self {
        let end = job.finished_at.unwrap_or_else(Utc::now);
        let duration_ms = (end - job.started_at).num_milliseconds().max(0) as u64;
        let documents_per_second =
            job.progress.processed as f64 * 1000.0 / duration_ms.max(1) as f64;
        JobStatusResponse {
            batch_id: job.batch_id,
            index: job.index,
            status: job.status,
            progress: job.progress,
            configuration: job.configuration,
            performance: JobPerformance {
                duration_ms,
                documents_per_second,
            },
            errors: job.errors,
        }
    }
}
