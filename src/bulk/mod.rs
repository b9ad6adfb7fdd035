//! Asynchronous bulk indexing: jobs, their registry, and the coordinator.

pub mod job;
pub mod manager;
pub mod registry;

pub use self::job::{
    BulkDocumentItem, BulkJob, BulkJobHandle, BulkJobOptions, JobProgress, JobStatus,
    DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY,
};
pub use self::manager::BulkJobManager;
pub use self::registry::JobRegistry;
