//! Index lifecycle: metadata, live per-index state, and the manager that
//! coordinates creation, rebuilds, cache clearing, and system reset.

pub mod handle;
pub mod manager;
pub mod metadata;

pub use self::handle::{DocumentWrite, IndexHandle, IndexStats, RebuildCounts};
pub use self::manager::{IndexManager, RebuildSummary};
pub use self::metadata::{
    FieldMapping, IndexMappings, IndexMetadata, IndexSettings, IndexSettingsPatch, IndexStatus,
    validate_index_name,
};
