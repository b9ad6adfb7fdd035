//! Bulk job state: status, progress accounting, and configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Batch size used when a job does not specify one.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Concurrent batch limit used when a job does not specify one.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Fraction of failed documents above which a job ends `Failed`.
pub const DEFAULT_FAILURE_THRESHOLD: f32 = 0.5;

/// Upper bound on per-batch error strings retained per job.
pub const MAX_RECORDED_ERRORS: usize = 32;

/// Lifecycle of one bulk job. Terminal states never transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Document-level progress of a job.
///
/// `processed + failed + remaining == total` holds after every update, and
/// all counters move monotonically toward completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
    pub remaining: u64,
    pub percentage: f32,
}

impl JobProgress {
    pub fn new(total: u64) -> Self {
        JobProgress {
            total,
            processed: 0,
            failed: 0,
            remaining: total,
            percentage: if total == 0 { 100.0 } else { 0.0 },
        }
    }

    /// Fold one finished batch into the counters.
    pub fn record_batch(&mut self, processed: u64, failed: u64) {
        self.processed += processed;
        self.failed += failed;
        self.remaining = self.total.saturating_sub(self.processed + self.failed);
        self.percentage = if self.total == 0 {
            100.0
        } else {
            (self.processed + self.failed) as f32 / self.total as f32 * 100.0
        };
    }

    /// Fraction of the total that failed, 0.0 for an empty job.
    pub fn failure_fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f32 / self.total as f32
        }
    }
}

/// Tunables of one bulk job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BulkJobOptions {
    /// Documents per batch.
    pub batch_size: usize,
    /// Concurrent batches; 0 means one per core.
    pub concurrency: usize,
    /// Persist postings after each batch's dictionary update.
    pub enable_term_postings_persistence: bool,
    /// Failed-document fraction above which the job ends `Failed`.
    pub failure_threshold: f32,
}

impl Default for BulkJobOptions {
    fn default() -> Self {
        BulkJobOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            enable_term_postings_persistence: true,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl BulkJobOptions {
    /// Worker count with the 0-means-all-cores rule applied.
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus::get()
        } else {
            self.concurrency
        }
    }
}

/// One document in a bulk request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDocumentItem {
    #[serde(default)]
    pub id: Option<String>,
    pub document: Value,
}

/// Registry record of one bulk job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub batch_id: String,
    pub index: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub configuration: BulkJobOptions,
    /// First error message of each failed batch, capped at
    /// [`MAX_RECORDED_ERRORS`].
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BulkJob {
    pub fn new(batch_id: &str, index: &str, total: u64, configuration: BulkJobOptions) -> Self {
        BulkJob {
            batch_id: batch_id.to_string(),
            index: index.to_string(),
            status: JobStatus::Processing,
            progress: JobProgress::new(total),
            configuration,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_error(&mut self, message: String) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(message);
        }
    }

    /// Move to a terminal state based on the failure threshold.
    pub fn finish(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = if self.progress.failure_fraction() > self.configuration.failure_threshold {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        self.finished_at = Some(Utc::now());
    }
}

/// Immediate response to a job submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJobHandle {
    pub batch_id: String,
    pub total_batches: usize,
    pub total_documents: usize,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_conservation() {
        let mut progress = JobProgress::new(100);
        assert_eq!(progress.processed + progress.failed + progress.remaining, 100);

        progress.record_batch(40, 0);
        assert_eq!(progress.processed + progress.failed + progress.remaining, 100);
        assert_eq!(progress.remaining, 60);
        assert!((progress.percentage - 40.0).abs() < f32::EPSILON);

        progress.record_batch(30, 10);
        assert_eq!(progress.processed + progress.failed + progress.remaining, 100);
        assert_eq!(progress.failed, 10);

        progress.record_batch(20, 0);
        assert_eq!(progress.remaining, 0);
        assert!((progress.percentage - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_job_is_complete() {
        let progress = JobProgress::new(0);
        assert!((progress.percentage - 100.0).abs() < f32::EPSILON);
        assert_eq!(progress.failure_fraction(), 0.0);
    }

    #[test]
    fn test_finish_applies_threshold() {
        let mut job = BulkJob::new("b1", "books", 10, BulkJobOptions::default());
        job.progress.record_batch(4, 6);
        job.finish();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.finished_at.is_some());

        let mut job = BulkJob::new("b2", "books", 10, BulkJobOptions::default());
        job.progress.record_batch(8, 2);
        job.finish();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_finish_is_sticky() {
        let mut job = BulkJob::new("b1", "books", 10, BulkJobOptions::default());
        job.progress.record_batch(10, 0);
        job.finish();
        let finished_at = job.finished_at;

        job.finish();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.finished_at, finished_at);
    }

    #[test]
    fn test_error_cap() {
        let mut job = BulkJob::new("b1", "books", 1000, BulkJobOptions::default());
        for i in 0..100 {
            job.record_error(format!("batch {i} broke"));
        }
        assert_eq!(job.errors.len(), MAX_RECORDED_ERRORS);
    }

    #[test]
    fn test_options_wire_names() {
        let options: BulkJobOptions = serde_json::from_value(serde_json::json!({
            "batchSize": 50,
            "concurrency": 2,
            "enableTermPostingsPersistence": false
        }))
        .unwrap();
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.concurrency, 2);
        assert!(!options.enable_term_postings_persistence);
        assert_eq!(options.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
    }

    #[test]
    fn test_zero_concurrency_means_all_cores() {
        let options = BulkJobOptions {
            concurrency: 0,
            ..Default::default()
        };
        assert!(options.effective_concurrency() >= 1);
    }
}
