//! Pluggable storage backends for index persistence.
//!
//! Index state is written through the [`Storage`] trait so the engine can run
//! entirely in memory or persist to a directory on disk. Binary payloads go
//! through [`StructWriter`]/[`StructReader`], which frame every file with a
//! trailing CRC32 checksum.

pub mod file;
pub mod memory;
pub mod structured;
pub mod traits;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use structured::{StructReader, StructWriter};
pub use traits::{Storage, StorageConfig, StorageInput, StorageOutput};
