//! Bulk job submission and batch coordination.
//!
//! A submitted job returns immediately. A coordinator thread drives the
//! batches through a rayon pool bounded by the job's concurrency; workers
//! report each batch over a crossbeam channel and the coordinator folds the
//! outcomes into the registry, one update per batch rather than per
//! document.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use log::{debug, error, info, warn};
use rayon::ThreadPoolBuilder;
use uuid::Uuid;

use crate::bulk::job::{BulkDocumentItem, BulkJob, BulkJobHandle, BulkJobOptions, JobStatus};
use crate::bulk::registry::JobRegistry;
use crate::error::{FalxError, Result};
use crate::lifecycle::IndexHandle;

/// What one worker reports for one finished batch.
#[derive(Debug)]
struct BatchOutcome {
    batch_index: usize,
    processed: u64,
    failed: u64,
    error: Option<String>,
}

/// Accepts bulk jobs and tracks them in a shared registry.
#[derive(Debug, Default)]
pub struct BulkJobManager {
    registry: Arc<JobRegistry>,
}

impl BulkJobManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn status(&self, batch_id: &str) -> Result<BulkJob> {
        self.registry.status(batch_id)
    }

    pub fn all_jobs(&self) -> Vec<BulkJob> {
        self.registry.all()
    }

    pub fn clear(&self, batch_id: &str) -> Result<()> {
        self.registry.clear(batch_id)
    }

    /// Start a bulk indexing job over `documents` and return its handle.
    ///
    /// One batch's failure never halts its siblings; the job's terminal
    /// status is decided by the failure threshold once every batch reported.
    pub fn submit(
        &self,
        index: Arc<IndexHandle>,
        documents: Vec<BulkDocumentItem>,
        options: BulkJobOptions,
    ) -> Result<BulkJobHandle> {
        if options.batch_size == 0 {
            return Err(FalxError::validation("batchSize must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&options.failure_threshold) {
            return Err(FalxError::validation(
                "failureThreshold must be between 0.0 and 1.0",
            ));
        }

        let batch_id = Uuid::new_v4().to_string();
        let total = documents.len();
        let batches = partition(documents, options.batch_size);
        let total_batches = batches.len();

        let mut job = BulkJob::new(&batch_id, index.name(), total as u64, options.clone());
        if total == 0 {
            job.finish();
            let status = job.status;
            self.registry.insert(job);
            return Ok(BulkJobHandle {
                batch_id,
                total_batches: 0,
                total_documents: 0,
                status,
            });
        }
        self.registry.insert(job);

        info!(
            "bulk job {batch_id}: {total} documents in {total_batches} batches for index '{}'",
            index.name()
        );

        let registry = self.registry.clone();
        let coordinator_id = batch_id.clone();
        let spawned = thread::Builder::new()
            .name(format!("falx-bulk-{}", &batch_id[..8]))
            .spawn(move || run_job(registry, coordinator_id, index, batches, options));

        if let Err(e) = spawned {
            self.registry.update(&batch_id, |job| {
                job.record_error(format!("coordinator thread failed to start: {e}"));
                job.progress.record_batch(0, total as u64);
                job.finish();
            });
            return Err(e.into());
        }

        Ok(BulkJobHandle {
            batch_id,
            total_batches,
            total_documents: total,
            status: JobStatus::Processing,
        })
    }

    /// Re-index every live document of an index as a bulk job.
    pub fn submit_rebuild(
        &self,
        index: Arc<IndexHandle>,
        options: BulkJobOptions,
    ) -> Result<BulkJobHandle> {
        let documents: Vec<BulkDocumentItem> = index
            .documents()
            .iter_live()
            .map(|(_, id, source)| BulkDocumentItem {
                id: Some(id.to_string()),
                document: source.clone(),
            })
            .collect();
        self.submit(index, documents, options)
    }
}

/// Split the documents into `batch_size` chunks, preserving order.
fn partition(documents: Vec<BulkDocumentItem>, batch_size: usize) -> Vec<Vec<BulkDocumentItem>> {
    let mut batches = Vec::with_capacity(documents.len().div_ceil(batch_size.max(1)));
    let mut iter = documents.into_iter();
    loop {
        let batch: Vec<BulkDocumentItem> = iter.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }
    batches
}

/// Coordinator body: fan batches out, fold outcomes in, finalize the job.
fn run_job(
    registry: Arc<JobRegistry>,
    batch_id: String,
    index: Arc<IndexHandle>,
    batches: Vec<Vec<BulkDocumentItem>>,
    options: BulkJobOptions,
) {
    let workers = options.effective_concurrency().max(1);
    let pool = match ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("falx-bulk-worker-{i}"))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            error!("bulk job {batch_id}: worker pool failed to start: {e}");
            let total: u64 = batches.iter().map(|b| b.len() as u64).sum();
            registry.update(&batch_id, |job| {
                job.record_error(format!("worker pool failed to start: {e}"));
                job.progress.record_batch(0, total);
                job.finish();
            });
            return;
        }
    };

    let (tx, rx) = unbounded::<BatchOutcome>();
    for (batch_index, batch) in batches.into_iter().enumerate() {
        let tx = tx.clone();
        let index = index.clone();
        let persist = options.enable_term_postings_persistence;
        pool.spawn(move || {
            let outcome = process_batch(batch_index, &index, batch, persist);
            // The receiver only disappears on coordinator teardown.
            let _ = tx.send(outcome);
        });
    }
    drop(tx);

    while let Ok(outcome) = rx.recv() {
        debug!(
            "bulk job {batch_id}: batch {} done, processed={} failed={}",
            outcome.batch_index, outcome.processed, outcome.failed
        );
        registry.update(&batch_id, |job| {
            job.progress.record_batch(outcome.processed, outcome.failed);
            if let Some(error) = outcome.error {
                job.record_error(format!("batch {}: {error}", outcome.batch_index));
            }
        });
    }

    registry.update(&batch_id, |job| {
        job.finish();
        match job.status {
            JobStatus::Failed => warn!(
                "bulk job {batch_id} failed: {}/{} documents failed",
                job.progress.failed, job.progress.total
            ),
            _ => info!(
                "bulk job {batch_id} completed: processed={} failed={}",
                job.progress.processed, job.progress.failed
            ),
        }
    });
}

/// Index one batch. Every document is an independent upsert; a posting
/// persistence failure recategorizes the whole batch as failed without
/// stopping the job.
fn process_batch(
    batch_index: usize,
    index: &IndexHandle,
    batch: Vec<BulkDocumentItem>,
    persist: bool,
) -> BatchOutcome {
    let mut processed = 0u64;
    let mut failed = 0u64;
    let mut error = None;

    for item in batch {
        match index.put_document(item.id.as_deref(), item.document) {
            Ok(_) => processed += 1,
            Err(e) => {
                failed += 1;
                error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if persist && let Err(e) = index.persist_postings() {
        failed += processed;
        processed = 0;
        error.get_or_insert_with(|| format!("posting persistence failed: {e}"));
    }

    BatchOutcome {
        batch_index,
        processed,
        failed,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{IndexMappings, IndexMetadata, IndexSettings};
    use crate::storage::{MemoryStorage, Storage};
    use serde_json::json;
    use std::time::Duration;

    fn test_index(name: &str) -> Arc<IndexHandle> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let metadata = IndexMetadata::new(name, IndexSettings::default(), IndexMappings::default());
        Arc::new(IndexHandle::new(metadata, storage, 64).unwrap())
    }

    fn items(count: usize) -> Vec<BulkDocumentItem> {
        (0..count)
            .map(|i| BulkDocumentItem {
                id: Some(format!("doc-{i}")),
                document: json!({"title": format!("entry number {i}"), "seq": i}),
            })
            .collect()
    }

    fn wait_terminal(manager: &BulkJobManager, batch_id: &str) -> BulkJob {
        for _ in 0..500 {
            let job = manager.status(batch_id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("bulk job {batch_id} did not reach a terminal state");
    }

    fn quick_options(batch_size: usize) -> BulkJobOptions {
        BulkJobOptions {
            batch_size,
            concurrency: 4,
            enable_term_postings_persistence: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_job_runs_to_completion() {
        let manager = BulkJobManager::new();
        let index = test_index("books");

        let handle = manager
            .submit(index.clone(), items(25), quick_options(10))
            .unwrap();
        assert_eq!(handle.total_documents, 25);
        assert_eq!(handle.total_batches, 3);
        assert_eq!(handle.status, JobStatus::Processing);

        let job = wait_terminal(&manager, &handle.batch_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress.processed, 25);
        assert_eq!(job.progress.failed, 0);
        assert_eq!(job.progress.remaining, 0);
        assert_eq!(index.metadata().doc_count, 25);
        assert!(index.dictionary().lookup("title", "entry").is_some());
    }

    #[test]
    fn test_resubmission_upserts_without_double_postings() {
        let manager = BulkJobManager::new();
        let index = test_index("books");

        let first = manager
            .submit(index.clone(), items(20), quick_options(5))
            .unwrap();
        wait_terminal(&manager, &first.batch_id);

        let second = manager
            .submit(index.clone(), items(20), quick_options(5))
            .unwrap();
        wait_terminal(&manager, &second.batch_id);

        assert_eq!(index.metadata().doc_count, 20);
        let doc = index.get_document("doc-3").unwrap();
        assert_eq!(doc.version, 2);
        let dictionary = index.dictionary();
        let list = dictionary.lookup("title", "entry").unwrap();
        assert_eq!(list.doc_frequency(), 20, "postings must not double on re-index");
    }

    #[test]
    fn test_failures_counted_and_threshold_applied() {
        let manager = BulkJobManager::new();
        let index = test_index("books");

        // Non-object sources fail validation inside the batch.
        let mut documents = items(4);
        for item in &mut documents {
            item.document = json!("not an object");
        }
        let handle = manager
            .submit(index.clone(), documents, quick_options(2))
            .unwrap();

        let job = wait_terminal(&manager, &handle.batch_id);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress.failed, 4);
        assert_eq!(job.progress.processed, 0);
        assert!(!job.errors.is_empty());
    }

    #[test]
    fn test_partial_failure_below_threshold_completes() {
        let manager = BulkJobManager::new();
        let index = test_index("books");

        let mut documents = items(10);
        documents[7].document = json!(42);
        let handle = manager
            .submit(index.clone(), documents, quick_options(3))
            .unwrap();

        let job = wait_terminal(&manager, &handle.batch_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress.processed, 9);
        assert_eq!(job.progress.failed, 1);
        assert_eq!(
            job.progress.processed + job.progress.failed + job.progress.remaining,
            job.progress.total
        );
    }

    #[test]
    fn test_empty_submission_completes_immediately() {
        let manager = BulkJobManager::new();
        let index = test_index("books");

        let handle = manager
            .submit(index, Vec::new(), quick_options(10))
            .unwrap();
        assert_eq!(handle.status, JobStatus::Completed);
        assert_eq!(handle.total_batches, 0);

        let job = manager.status(&handle.batch_id).unwrap();
        assert!((job.progress.percentage - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let manager = BulkJobManager::new();
        let index = test_index("books");

        let err = manager
            .submit(index.clone(), items(2), quick_options(0))
            .unwrap_err();
        assert_eq!(err.http_status(), 400);

        let options = BulkJobOptions {
            failure_threshold: 1.5,
            ..quick_options(10)
        };
        let err = manager.submit(index, items(2), options).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_rebuild_job_reindexes_live_documents() {
        let manager = BulkJobManager::new();
        let index = test_index("books");
        for i in 0..6 {
            index
                .put_document(Some(&format!("doc-{i}")), json!({"title": format!("original {i}")}))
                .unwrap();
        }
        index.delete_document("doc-5");

        let handle = manager
            .submit_rebuild(index.clone(), quick_options(2))
            .unwrap();
        assert_eq!(handle.total_documents, 5);

        let job = wait_terminal(&manager, &handle.batch_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress.processed, 5);
        // Rebuild upserts bump each surviving document once.
        assert_eq!(index.get_document("doc-0").unwrap().version, 2);
    }

    #[test]
    fn test_persistence_enabled_leaves_durable_postings() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let metadata =
            IndexMetadata::new("books", IndexSettings::default(), IndexMappings::default());
        let index = Arc::new(IndexHandle::new(metadata, storage.clone(), 64).unwrap());

        let manager = BulkJobManager::new();
        let options = BulkJobOptions {
            batch_size: 4,
            concurrency: 2,
            enable_term_postings_persistence: true,
            ..Default::default()
        };
        let handle = manager.submit(index, items(8), options).unwrap();
        let job = wait_terminal(&manager, &handle.batch_id);

        assert_eq!(job.status, JobStatus::Completed);
        assert!(storage.file_exists("postings-books.fxps"));
    }
}
