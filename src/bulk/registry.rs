//! Shared registry of bulk jobs.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::bulk::job::BulkJob;
use crate::error::{FalxError, Result};

/// All known bulk jobs, keyed by batch id.
///
/// Records stay until explicitly cleared; a cleared id is indistinguishable
/// from one that never existed.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<AHashMap<String, BulkJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: BulkJob) {
        self.jobs.write().insert(job.batch_id.clone(), job);
    }

    /// Snapshot of one job. Cleared or unknown ids are not found.
    pub fn status(&self, batch_id: &str) -> Result<BulkJob> {
        self.jobs
            .read()
            .get(batch_id)
            .cloned()
            .ok_or_else(|| FalxError::not_found(format!("bulk job '{batch_id}' not found")))
    }

    /// Snapshot of every job, newest first.
    pub fn all(&self) -> Vec<BulkJob> {
        let mut jobs: Vec<BulkJob> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(a.batch_id.cmp(&b.batch_id)));
        jobs
    }

    /// Mutate a job in place. Returns false when the id is gone, so a
    /// coordinator racing a clear simply stops reporting.
    pub fn update<F: FnOnce(&mut BulkJob)>(&self, batch_id: &str, apply: F) -> bool {
        match self.jobs.write().get_mut(batch_id) {
            Some(job) => {
                apply(job);
                true
            }
            None => false,
        }
    }

    /// Drop a finished job's record. In-flight jobs cannot be cleared.
    pub fn clear(&self, batch_id: &str) -> Result<()> {
        let mut jobs = self.jobs.write();
        let Some(job) = jobs.get(batch_id) else {
            return Err(FalxError::not_found(format!(
                "bulk job '{batch_id}' not found"
            )));
        };
        if !job.status.is_terminal() {
            return Err(FalxError::conflict(format!(
                "bulk job '{batch_id}' is still processing"
            )));
        }
        jobs.remove(batch_id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
