//! The engine facade tying index lifecycle, document writes, bulk jobs, and
//! query execution together.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashSet;
use log::debug;
use serde_json::Value;

use crate::bulk::{BulkDocumentItem, BulkJobHandle, BulkJobManager, BulkJobOptions};
use crate::engine::config::EngineConfig;
use crate::engine::response::{
    BulkIndexRequest, BulkItemResult, BulkResponse, ClearCacheResponse, ClearPostingsResponse,
    CreateIndexRequest, DeleteByQueryResponse, DeleteFailure, DocumentListResponse,
    DocumentResponse, DocumentWriteResponse, IndexDocumentRequest, IndexListResponse,
    IndexResponse, JobStatusResponse, RebuildResponse, SearchData, SearchResponse,
    SuggestResponse, SystemResetResponse, UpdateIndexRequest,
};
use crate::error::{FalxError, Result};
use crate::executor::{QueryExecutor, suggest_terms};
use crate::lifecycle::{IndexHandle, IndexManager, IndexStats, IndexStatus};
use crate::query::dto::{SearchRequest, SuggestRequest};
use crate::query::normalizer::QueryNormalizer;
use crate::query::plan::QueryPlan;
use crate::storage::{FileStorage, MemoryStorage, Storage, StorageConfig};

/// Full-text search engine over a storage backend.
///
/// One engine owns a set of named indices. All operations are safe to call
/// from multiple threads; reads run concurrently and writes serialize per
/// index.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use falx::{EngineConfig, SearchEngine};
///
/// let engine = SearchEngine::open_in_memory(EngineConfig::default()).unwrap();
/// engine
///     .create_index(serde_json::from_value(json!({"name": "books"})).unwrap())
///     .unwrap();
/// engine
///     .index_document(
///         "books",
///         serde_json::from_value(json!({"id": "1", "document": {"title": "Dune"}})).unwrap(),
///     )
///     .unwrap();
///
/// let response = engine
///     .search("books", serde_json::from_value(json!({"query": "dune"})).unwrap())
///     .unwrap();
/// assert_eq!(response.data.total, 1);
/// ```
pub struct SearchEngine {
    manager: IndexManager,
    bulk: BulkJobManager,
    normalizer: QueryNormalizer,
    config: EngineConfig,
}

impl SearchEngine {
    /// Open an engine over an existing storage backend, loading every index
    /// the backend already holds.
    pub fn open(storage: Arc<dyn Storage>, config: EngineConfig) -> Result<Self> {
        let manager = IndexManager::open(
            storage,
            config.scan_cache_capacity,
            config.reset_key.clone(),
        )?;
        Ok(SearchEngine {
            manager,
            bulk: BulkJobManager::new(),
            normalizer: QueryNormalizer::new()?,
            config,
        })
    }

    /// Open an engine with no durable storage. Used by tests and throwaway
    /// tooling.
    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        Self::open(Arc::new(MemoryStorage::new()), config)
    }

    /// Open an engine persisting under `path`.
    pub fn open_on_disk<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let storage = FileStorage::new(path, StorageConfig::default())?;
        Self::open(Arc::new(storage), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index_count(&self) -> usize {
        self.manager.index_count()
    }

    // ---- index lifecycle ----------------------------------------------

    pub fn create_index(&self, request: CreateIndexRequest) -> Result<IndexResponse> {
        let handle = self
            .manager
            .create(&request.name, request.settings, request.mappings)?;
        Ok(handle.metadata().into())
    }

    pub fn get_index(&self, name: &str) -> Result<IndexResponse> {
        Ok(self.manager.get(name)?.metadata().into())
    }

    pub fn list_indices(&self, status: Option<IndexStatus>) -> IndexListResponse {
        let indices: Vec<IndexResponse> = self
            .manager
            .list(status)
            .into_iter()
            .map(IndexResponse::from)
            .collect();
        let total = indices.len();
        IndexListResponse { indices, total }
    }

    pub fn update_index(&self, name: &str, request: UpdateIndexRequest) -> Result<IndexResponse> {
        let metadata = self
            .manager
            .update(name, request.settings, request.mappings)?;
        Ok(metadata.into())
    }

    pub fn delete_index(&self, name: &str) -> Result<()> {
        self.manager.delete(name)
    }

    /// Recount live documents and persist the corrected count.
    pub fn rebuild_doc_count(&self, name: &str) -> Result<u64> {
        self.manager.rebuild_doc_count(name)
    }

    /// Rebuild an index's postings synchronously from its stored documents.
    pub fn rebuild_all(&self, name: &str) -> Result<RebuildResponse> {
        let summary = self.manager.rebuild_all(name)?;
        Ok(RebuildResponse {
            documents_processed: summary.documents_processed,
            terms_indexed: summary.terms_indexed,
            took: summary.took_ms,
        })
    }

    /// Rebuild an index as a background bulk job re-indexing every live
    /// document.
    pub fn rebuild_index(&self, name: &str, options: BulkJobOptions) -> Result<BulkJobHandle> {
        let handle = self.manager.get(name)?;
        self.bulk.submit_rebuild(handle, options)
    }

    pub fn clear_term_cache(&self, name: &str) -> Result<ClearCacheResponse> {
        Ok(ClearCacheResponse {
            cleared_terms: self.manager.clear_cache(name)?,
        })
    }

    pub fn clear_term_postings(&self, name: &str) -> Result<ClearPostingsResponse> {
        Ok(ClearPostingsResponse {
            deleted_count: self.manager.clear_term_postings(name)?,
        })
    }

    /// Wipe every index and all storage files. Requires the configured reset
    /// key; any mismatch leaves the engine untouched.
    pub fn system_reset(&self, reset_key: Option<&str>) -> Result<SystemResetResponse> {
        Ok(SystemResetResponse {
            reset_components: self.manager.system_reset(reset_key)?,
        })
    }

    pub fn index_stats(&self, name: &str) -> Result<IndexStats> {
        Ok(self.manager.get(name)?.stats())
    }

    /// Flush every index's metadata, documents, and postings to storage.
    pub fn persist_all(&self) -> Result<()> {
        self.manager.persist_all()
    }

    // ---- document writes ----------------------------------------------

    /// Index one document, upserting on id collision. A missing id gets a
    /// generated UUID.
    pub fn index_document(
        &self,
        index: &str,
        request: IndexDocumentRequest,
    ) -> Result<DocumentWriteResponse> {
        let handle = self.manager.get(index)?;
        let write = handle.put_document(request.id.as_deref(), request.document)?;
        Ok(DocumentWriteResponse {
            id: write.id,
            version: write.version,
            result: write_result(write.created),
        })
    }

    pub fn get_document(&self, index: &str, id: &str) -> Result<DocumentResponse> {
        let handle = self.manager.get(index)?;
        let stored = handle.get_document(id).ok_or_else(|| {
            FalxError::not_found(format!("document '{id}' not found in index '{index}'"))
        })?;
        Ok(DocumentResponse {
            id: stored.id,
            version: stored.version,
            source: stored.source,
        })
    }

    /// Replace an existing document. Unlike [`SearchEngine::index_document`]
    /// this refuses to create: an unknown id is a not-found error.
    pub fn update_document(
        &self,
        index: &str,
        id: &str,
        document: Value,
    ) -> Result<DocumentWriteResponse> {
        let handle = self.manager.get(index)?;
        let write = handle.replace_document(id, document)?;
        Ok(DocumentWriteResponse {
            id: write.id,
            version: write.version,
            result: write_result(write.created),
        })
    }

    pub fn delete_document(&self, index: &str, id: &str) -> Result<()> {
        let handle = self.manager.get(index)?;
        if !handle.delete_document(id) {
            return Err(FalxError::not_found(format!(
                "document '{id}' not found in index '{index}'"
            )));
        }
        Ok(())
    }

    /// Index many documents in the caller's thread, reporting per-item
    /// outcomes instead of aborting on the first bad document.
    pub fn bulk_index(&self, index: &str, request: BulkIndexRequest) -> Result<BulkResponse> {
        let handle = self.manager.get(index)?;
        let start = Instant::now();

        let mut items = Vec::with_capacity(request.documents.len());
        let mut success_count = 0;
        for item in request.documents {
            match handle.put_document(item.id.as_deref(), item.document) {
                Ok(write) => {
                    success_count += 1;
                    items.push(BulkItemResult {
                        id: write.id,
                        status: if write.created { 201 } else { 200 },
                        version: Some(write.version),
                        error: None,
                    });
                }
                Err(e) => items.push(BulkItemResult {
                    id: item.id.unwrap_or_default(),
                    status: e.http_status(),
                    version: None,
                    error: Some(e.to_string()),
                }),
            }
        }

        Ok(BulkResponse {
            took: elapsed_ms(start),
            errors: success_count < items.len(),
            success_count,
            items,
        })
    }

    /// Delete every document matching a query. Per-document failures are
    /// collected, not fatal.
    pub fn delete_by_query(&self, index: &str, query: &Value) -> Result<DeleteByQueryResponse> {
        let handle = self.manager.get(index)?;
        let plan = self.normalizer.normalize(Some(query))?;
        let start = Instant::now();

        let targets = self.matching_ids(&handle, &plan);
        let mut deleted = 0;
        let mut failures = Vec::new();
        for id in targets {
            if handle.delete_document(&id) {
                deleted += 1;
            } else {
                // Lost a race with another deleter between scan and delete.
                failures.push(DeleteFailure {
                    id,
                    reason: "document no longer exists".to_string(),
                });
            }
        }
        debug!("delete_by_query removed {deleted} documents from '{index}'");

        Ok(DeleteByQueryResponse {
            took: elapsed_ms(start),
            deleted,
            failures,
        })
    }

    /// List stored documents with optional filtering and offset paging.
    pub fn list_documents(
        &self,
        index: &str,
        limit: Option<usize>,
        offset: Option<usize>,
        filter: Option<&Value>,
    ) -> Result<DocumentListResponse> {
        let handle = self.manager.get(index)?;
        let limit = limit.unwrap_or(self.config.default_list_limit);
        let offset = offset.unwrap_or(0);
        let plan = match filter {
            Some(value) => Some(self.normalizer.normalize(Some(value))?),
            None => None,
        };

        let documents = handle.documents();
        let analyze = |text: &str| self.normalizer.tokens(text);
        let matching: Vec<u32> = documents
            .iter_live()
            .filter(|(_, _, source)| {
                plan.as_ref()
                    .is_none_or(|p| p.matches_source(source, &analyze))
            })
            .map(|(ordinal, _, _)| ordinal)
            .collect();

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|ordinal| documents.stored(ordinal))
            .map(|stored| DocumentResponse {
                id: stored.id,
                version: stored.version,
                source: stored.source,
            })
            .collect();

        Ok(DocumentListResponse {
            total,
            documents: page,
        })
    }

    // ---- queries ------------------------------------------------------

    /// Run a search and assemble the full response envelope.
    pub fn search(&self, index: &str, request: SearchRequest) -> Result<SearchResponse> {
        let handle = self.manager.get(index)?;
        let start = Instant::now();

        let plan = self
            .normalizer
            .normalize_with_fields(request.query.as_ref(), request.fields.as_deref())?;
        let filter_plan = match &request.filter {
            Some(value) => Some(self.normalizer.normalize(Some(value))?),
            None => None,
        };

        let documents = handle.documents();
        let dictionary = handle.dictionary();
        let mut executor = QueryExecutor::new(&dictionary, &documents, handle.scan_cache());
        if self.config.search_timeout_ms > 0 {
            executor = executor
                .with_deadline(start + Duration::from_millis(self.config.search_timeout_ms));
        }

        let outcome = executor.search(&plan, filter_plan.as_ref(), &request, handle.query_analyzer())?;

        let max_score = outcome
            .hits
            .iter()
            .map(|hit| hit.score)
            .fold(None, |best: Option<f32>, score| {
                Some(best.map_or(score, |b| b.max(score)))
            });
        let mut hits = outcome.hits;
        if let Some(fields) = request.fields.as_deref()
            && !fields.is_empty()
        {
            for hit in &mut hits {
                hit.source = project_source(std::mem::take(&mut hit.source), fields);
            }
        }

        Ok(SearchResponse {
            data: SearchData {
                total: outcome.total,
                max_score,
                hits,
                pagination: outcome.pagination,
            },
            facets: outcome.facets,
            took: elapsed_ms(start),
        })
    }

    /// Count candidate terms completing a prefix.
    pub fn suggest(&self, index: &str, request: SuggestRequest) -> Result<SuggestResponse> {
        let handle = self.manager.get(index)?;
        let start = Instant::now();
        let suggestions = suggest_terms(&handle.dictionary(), &request)?;
        Ok(SuggestResponse {
            suggestions,
            took: elapsed_ms(start),
        })
    }

    // ---- bulk jobs ----------------------------------------------------

    /// Start a background bulk indexing job and return its handle
    /// immediately.
    pub fn start_bulk_indexing(
        &self,
        index: &str,
        documents: Vec<BulkDocumentItem>,
        options: BulkJobOptions,
    ) -> Result<BulkJobHandle> {
        let handle = self.manager.get(index)?;
        self.bulk.submit(handle, documents, options)
    }

    pub fn bulk_job_status(&self, batch_id: &str) -> Result<JobStatusResponse> {
        Ok(self.bulk.status(batch_id)?.into())
    }

    /// Every known job, newest first.
    pub fn bulk_jobs(&self) -> Vec<JobStatusResponse> {
        self.bulk
            .all_jobs()
            .into_iter()
            .map(JobStatusResponse::from)
            .collect()
    }

    /// Drop a finished job's record. Jobs still processing cannot be
    /// cleared.
    pub fn clear_bulk_job(&self, batch_id: &str) -> Result<()> {
        self.bulk.clear(batch_id)
    }

    // ---- internals ----------------------------------------------------

    /// Ids of live documents matching a plan, scanned under one read lock.
    fn matching_ids(&self, handle: &IndexHandle, plan: &QueryPlan) -> Vec<String> {
        let documents = handle.documents();
        let analyze = |text: &str| self.normalizer.tokens(text);
        documents
            .iter_live()
            .filter(|(_, _, source)| plan.matches_source(source, &analyze))
            .map(|(_, id, _)| id.to_string())
            .collect()
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("indices", &self.manager.index_count())
            .finish_non_exhaustive()
    }
}

fn write_result(created: bool) -> String {
    if created { "created" } else { "updated" }.to_string()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Keep only the top-level source keys named by the request's `fields`,
/// ignoring `^boost` suffixes and nested path tails.
fn project_source(source: Value, fields: &[String]) -> Value {
    let Value::Object(map) = source else {
        return source;
    };
    let keep: AHashSet<&str> = fields
        .iter()
        .map(|field| {
            let name = field.split_once('^').map_or(field.as_str(), |(n, _)| n);
            name.split_once('.').map_or(name, |(top, _)| top).trim()
        })
        .collect();
    Value::Object(
        map.into_iter()
            .filter(|(key, _)| keep.contains(key.as_str()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use serde_json::json;

    use crate::bulk::JobStatus;

    fn engine() -> SearchEngine {
        SearchEngine::open_in_memory(EngineConfig::default()).unwrap()
    }

    fn create(engine: &SearchEngine, name: &str) {
        engine
            .create_index(serde_json::from_value(json!({"name": name})).unwrap())
            .unwrap();
    }

    fn index_doc(engine: &SearchEngine, index: &str, id: &str, document: Value) {
        engine
            .index_document(
                index,
                IndexDocumentRequest {
                    id: Some(id.to_string()),
                    document,
                },
            )
            .unwrap();
    }

    fn seed_products(engine: &SearchEngine) {
        create(engine, "products");
        index_doc(
            engine,
            "products",
            "p1",
            json!({"title": "Wireless Keyboard", "category": "accessories", "price": 49}),
        );
        index_doc(
            engine,
            "products",
            "p2",
            json!({"title": "Wireless Mouse", "category": "accessories", "price": 29}),
        );
        index_doc(
            engine,
            "products",
            "p3",
            json!({"title": "USB Hub", "category": "adapters", "price": 35}),
        );
    }

    fn search_body(engine: &SearchEngine, index: &str, body: Value) -> SearchResponse {
        engine
            .search(index, serde_json::from_value(body).unwrap())
            .unwrap()
    }

    #[test]
    fn test_index_lifecycle() {
        let engine = engine();
        let created = engine
            .create_index(serde_json::from_value(json!({"name": "books"})).unwrap())
            .unwrap();
        assert_eq!(created.name, "books");
        assert_eq!(created.status, IndexStatus::Open);
        assert_eq!(created.document_count, 0);

        let err = engine
            .create_index(serde_json::from_value(json!({"name": "books"})).unwrap())
            .unwrap_err();
        assert_eq!(err.http_status(), 409);

        let listed = engine.list_indices(None);
        assert_eq!(listed.total, 1);
        assert_eq!(listed.indices[0].name, "books");

        let updated = engine
            .update_index(
                "books",
                serde_json::from_value(json!({
                    "settings": {"shards": 2},
                    "mappings": {"properties": {"title": {"type": "text", "boost": 2.0}}}
                }))
                .unwrap(),
            )
            .unwrap();
        assert_eq!(updated.settings.shards, 2);
        assert_eq!(updated.mappings.boost("title"), 2.0);

        engine.delete_index("books").unwrap();
        assert_eq!(engine.get_index("books").unwrap_err().http_status(), 404);
    }

    #[test]
    fn test_document_crud() {
        let engine = engine();
        create(&engine, "books");

        let write = engine
            .index_document(
                "books",
                serde_json::from_value(json!({"id": "b1", "document": {"title": "Dune"}}))
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(write.result, "created");
        assert_eq!(write.version, 1);

        let fetched = engine.get_document("books", "b1").unwrap();
        assert_eq!(fetched.source["title"], "Dune");

        let rewrite = engine
            .update_document("books", "b1", json!({"title": "Dune Messiah"}))
            .unwrap();
        assert_eq!(rewrite.result, "updated");
        assert_eq!(rewrite.version, 2);

        let missing = engine
            .update_document("books", "nope", json!({"title": "x"}))
            .unwrap_err();
        assert_eq!(missing.http_status(), 404);

        engine.delete_document("books", "b1").unwrap();
        assert_eq!(
            engine.get_document("books", "b1").unwrap_err().http_status(),
            404
        );
        assert_eq!(
            engine.delete_document("books", "b1").unwrap_err().http_status(),
            404
        );
    }

    #[test]
    fn test_generated_id_on_index() {
        let engine = engine();
        create(&engine, "books");
        let write = engine
            .index_document(
                "books",
                serde_json::from_value(json!({"document": {"title": "Dune"}})).unwrap(),
            )
            .unwrap();
        assert!(!write.id.is_empty());
        assert!(engine.get_document("books", &write.id).is_ok());
    }

    #[test]
    fn test_bulk_index_reports_partial_failure() {
        let engine = engine();
        create(&engine, "books");

        let response = engine
            .bulk_index(
                "books",
                serde_json::from_value(json!({"documents": [
                    {"id": "b1", "document": {"title": "Dune"}},
                    {"id": "b2", "document": "not an object"},
                    {"id": "b3", "document": {"title": "Foundation"}}
                ]}))
                .unwrap(),
            )
            .unwrap();

        assert!(response.errors);
        assert_eq!(response.success_count, 2);
        assert_eq!(response.items.len(), 3);
        assert_eq!(response.items[0].status, 201);
        assert_eq!(response.items[1].status, 400);
        assert!(response.items[1].error.is_some());
        assert_eq!(response.items[2].status, 201);

        // Re-indexing the same id reports an update, not a create.
        let again = engine
            .bulk_index(
                "books",
                serde_json::from_value(json!({"documents": [
                    {"id": "b1", "document": {"title": "Dune"}}
                ]}))
                .unwrap(),
            )
            .unwrap();
        assert!(!again.errors);
        assert_eq!(again.items[0].status, 200);
        assert_eq!(again.items[0].version, Some(2));
    }

    #[test]
    fn test_search_envelope() {
        let engine = engine();
        seed_products(&engine);

        let response = search_body(
            &engine,
            "products",
            json!({"query": {"match": {"field": "title", "value": "wireless"}}}),
        );
        assert_eq!(response.data.total, 2);
        assert_eq!(response.data.hits.len(), 2);
        assert!(response.data.max_score.is_some());
        assert_eq!(response.data.pagination.current_page, 1);
        assert_eq!(response.data.pagination.total_results, 2);
        assert!(!response.data.pagination.has_next);
        assert!(response.facets.is_none());
    }

    #[test]
    fn test_search_fields_project_source() {
        let engine = engine();
        seed_products(&engine);

        let response = search_body(
            &engine,
            "products",
            json!({"query": "wireless", "fields": ["title^2"]}),
        );
        assert_eq!(response.data.total, 2);
        for hit in &response.data.hits {
            assert!(hit.source.get("title").is_some());
            assert!(hit.source.get("price").is_none());
        }
    }

    #[test]
    fn test_search_unknown_index() {
        let engine = engine();
        let err = engine
            .search("ghost", SearchRequest::default())
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn test_delete_by_query_completeness() {
        let engine = engine();
        seed_products(&engine);

        let response = engine
            .delete_by_query(
                "products",
                &json!({"term": {"field": "category", "value": "accessories"}}),
            )
            .unwrap();
        assert_eq!(response.deleted, 2);
        assert!(response.failures.is_empty());

        let after = search_body(
            &engine,
            "products",
            json!({"query": {"term": {"field": "category", "value": "accessories"}}}),
        );
        assert_eq!(after.data.total, 0);

        let remaining = search_body(&engine, "products", json!({}));
        assert_eq!(remaining.data.total, 1);
    }

    #[test]
    fn test_list_documents_filter_and_paging() {
        let engine = engine();
        seed_products(&engine);

        let all = engine.list_documents("products", None, None, None).unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.documents.len(), 3);

        let page = engine
            .list_documents("products", Some(2), Some(2), None)
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.documents.len(), 1);

        let filtered = engine
            .list_documents(
                "products",
                None,
                None,
                Some(&json!({"term": {"field": "category", "value": "adapters"}})),
            )
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.documents[0].id, "p3");
    }

    #[test]
    fn test_suggest_envelope() {
        let engine = engine();
        seed_products(&engine);

        let response = engine
            .suggest(
                "products",
                serde_json::from_value(json!({"text": "wir", "field": "title"})).unwrap(),
            )
            .unwrap();
        assert_eq!(response.suggestions.len(), 1);
        assert_eq!(response.suggestions[0].text, "wireless");
        assert_eq!(response.suggestions[0].freq, 2);
    }

    #[test]
    fn test_bulk_job_roundtrip() {
        let engine = engine();
        create(&engine, "books");

        let documents: Vec<BulkDocumentItem> = (0..20)
            .map(|i| BulkDocumentItem {
                id: Some(format!("b{i}")),
                document: json!({"title": format!("volume {i}")}),
            })
            .collect();
        let handle = engine
            .start_bulk_indexing(
                "books",
                documents,
                BulkJobOptions {
                    batch_size: 5,
                    concurrency: 2,
                    enable_term_postings_persistence: false,
                    ..BulkJobOptions::default()
                },
            )
            .unwrap();
        assert_eq!(handle.total_documents, 20);
        assert_eq!(handle.total_batches, 4);

        let status = wait_terminal(&engine, &handle.batch_id);
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.progress.processed, 20);
        assert_eq!(status.progress.remaining, 0);
        assert_eq!(status.progress.percentage, 100.0);
        assert!(status.performance.documents_per_second > 0.0);

        assert_eq!(engine.bulk_jobs().len(), 1);
        engine.clear_bulk_job(&handle.batch_id).unwrap();
        assert_eq!(
            engine
                .bulk_job_status(&handle.batch_id)
                .unwrap_err()
                .http_status(),
            404
        );
    }

    #[test]
    fn test_rebuild_index_job() {
        let engine = engine();
        seed_products(&engine);

        let handle = engine
            .rebuild_index(
                "products",
                BulkJobOptions {
                    batch_size: 2,
                    enable_term_postings_persistence: false,
                    ..BulkJobOptions::default()
                },
            )
            .unwrap();
        let status = wait_terminal(&engine, &handle.batch_id);
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.progress.processed, 3);

        // Rebuild upserts in place: same documents, bumped versions.
        assert_eq!(engine.get_document("products", "p1").unwrap().version, 2);
        assert_eq!(engine.index_stats("products").unwrap().doc_count, 3);
    }

    #[test]
    fn test_rebuild_all_counts() {
        let engine = engine();
        seed_products(&engine);
        engine.delete_document("products", "p3").unwrap();

        let response = engine.rebuild_all("products").unwrap();
        assert_eq!(response.documents_processed, 2);
        assert!(response.terms_indexed > 0);
        assert_eq!(engine.rebuild_doc_count("products").unwrap(), 2);
    }

    #[test]
    fn test_clear_cache_and_postings() {
        let engine = engine();
        seed_products(&engine);
        search_body(&engine, "products", json!({"query": "wire*"}));

        let cleared = engine.clear_term_cache("products").unwrap();
        assert!(cleared.cleared_terms >= 1);

        engine.persist_all().unwrap();
        let removed = engine.clear_term_postings("products").unwrap();
        assert!(removed.deleted_count > 0);
        let again = engine.clear_term_postings("products").unwrap();
        assert_eq!(again.deleted_count, 0);
    }

    #[test]
    fn test_system_reset_key_gating() {
        let engine =
            SearchEngine::open_in_memory(EngineConfig::default().with_reset_key("sesame"))
                .unwrap();
        seed_products(&engine);

        let denied = engine.system_reset(Some("wrong")).unwrap_err();
        assert_eq!(denied.http_status(), 400);
        assert_eq!(engine.index_stats("products").unwrap().doc_count, 3);

        let reset = engine.system_reset(Some("sesame")).unwrap();
        assert_eq!(reset.reset_components.len(), 4);
        assert_eq!(engine.index_count(), 0);
    }

    #[test]
    fn test_index_isolation_across_engines_indices() {
        let engine = engine();
        create(&engine, "left");
        create(&engine, "right");
        index_doc(&engine, "left", "l1", json!({"title": "smartphone"}));
        index_doc(&engine, "right", "r1", json!({"title": "tablet"}));

        let crossed = search_body(&engine, "right", json!({"query": "smart*"}));
        assert_eq!(crossed.data.total, 0);
        let own = search_body(&engine, "left", json!({"query": "smart*"}));
        assert_eq!(own.data.total, 1);
    }

    #[test]
    fn test_concurrent_search_during_writes() {
        let engine = Arc::new(engine());
        seed_products(&engine);

        let reader = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..50 {
                    let response = engine
                        .search(
                            "products",
                            serde_json::from_value(json!({"query": "wireless"})).unwrap(),
                        )
                        .unwrap();
                    assert!(response.data.total >= 2);
                }
            })
        };
        for i in 0..50 {
            index_doc(
                &engine,
                "products",
                &format!("w{i}"),
                json!({"title": "wireless charger", "price": i}),
            );
        }
        reader.join().unwrap();

        let total = search_body(&engine, "products", json!({"query": "wireless"}));
        assert_eq!(total.data.total, 52);
    }

    fn wait_terminal(engine: &SearchEngine, batch_id: &str) -> JobStatusResponse {
        for _ in 0..500 {
            let status = engine.bulk_job_status(batch_id).unwrap();
            if status.status.is_terminal() {
                return status;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("bulk job {batch_id} did not finish in time");
    }
}
