//! Engine-wide index lifecycle management.

use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use log::{info, warn};
use parking_lot::RwLock;

use crate::dictionary::TermDictionary;
use crate::error::{FalxError, Result};
use crate::lifecycle::handle::IndexHandle;
use crate::lifecycle::metadata::{
    IndexMappings, IndexMetadata, IndexSettings, IndexSettingsPatch, IndexStatus,
    documents_file, index_of_metadata_file, metadata_file, postings_file, validate_index_name,
};
use crate::storage::{Storage, StructReader};

/// Result of a full synchronous rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    pub documents_processed: u64,
    pub terms_indexed: u64,
    pub took_ms: u64,
}

/// Owns every open index and the operations that cross index boundaries.
///
/// Handles are shared out as `Arc`; concurrent searches and writes
/// synchronize inside each handle, the manager only guards the name table.
#[derive(Debug)]
pub struct IndexManager {
    storage: Arc<dyn Storage>,
    indices: RwLock<AHashMap<String, Arc<IndexHandle>>>,
    cache_capacity: usize,
    reset_key: Option<String>,
}

impl IndexManager {
    /// Open the manager over a storage backend, reloading every index whose
    /// metadata file is present.
    pub fn open(
        storage: Arc<dyn Storage>,
        cache_capacity: usize,
        reset_key: Option<String>,
    ) -> Result<Self> {
        let mut indices = AHashMap::new();
        for file in storage.list_files()? {
            let Some(name) = index_of_metadata_file(&file) else {
                continue;
            };
            let handle = IndexHandle::open(name, storage.clone(), cache_capacity)?;
            info!(
                "opened index '{name}' with {} documents",
                handle.metadata().doc_count
            );
            indices.insert(name.to_string(), Arc::new(handle));
        }
        Ok(IndexManager {
            storage,
            indices: RwLock::new(indices),
            cache_capacity,
            reset_key,
        })
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn index_count(&self) -> usize {
        self.indices.read().len()
    }

    /// Create a new index. The name must be unique and well-formed.
    pub fn create(
        &self,
        name: &str,
        settings: IndexSettings,
        mappings: IndexMappings,
    ) -> Result<Arc<IndexHandle>> {
        validate_index_name(name)?;

        let mut indices = self.indices.write();
        if indices.contains_key(name) {
            return Err(FalxError::conflict(format!(
                "index '{name}' already exists"
            )));
        }

        let metadata = IndexMetadata::new(name, settings, mappings);
        let handle = Arc::new(IndexHandle::new(
            metadata,
            self.storage.clone(),
            self.cache_capacity,
        )?);
        handle.persist_metadata()?;
        handle.update_metadata(|m| m.status = IndexStatus::Open);
        handle.persist_metadata()?;

        indices.insert(name.to_string(), handle.clone());
        info!("created index '{name}'");
        Ok(handle)
    }

    pub fn get(&self, name: &str) -> Result<Arc<IndexHandle>> {
        self.indices
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FalxError::not_found(format!("index '{name}' not found")))
    }

    /// Metadata of all indices, optionally narrowed by status, name-sorted.
    pub fn list(&self, status: Option<IndexStatus>) -> Vec<IndexMetadata> {
        let mut all: Vec<IndexMetadata> = self
            .indices
            .read()
            .values()
            .map(|handle| handle.metadata())
            .filter(|metadata| status.is_none_or(|s| metadata.status == s))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Partial update of settings and mappings. Mapping changes never
    /// re-analyze already-stored documents.
    pub fn update(
        &self,
        name: &str,
        settings: Option<IndexSettingsPatch>,
        mappings: Option<IndexMappings>,
    ) -> Result<IndexMetadata> {
        let handle = self.get(name)?;
        handle.update_metadata(|metadata| {
            if let Some(patch) = &settings {
                metadata.settings.apply(patch);
            }
            if let Some(mappings) = mappings {
                metadata.mappings.merge(mappings);
            }
        });
        handle.persist_metadata()?;
        Ok(handle.metadata())
    }

    /// Delete an index with its files.
    pub fn delete(&self, name: &str) -> Result<()> {
        let handle = {
            let mut indices = self.indices.write();
            indices
                .remove(name)
                .ok_or_else(|| FalxError::not_found(format!("index '{name}' not found")))?
        };
        handle.update_metadata(|m| m.status = IndexStatus::Deleting);
        self.delete_index_files(name)?;
        info!("deleted index '{name}'");
        Ok(())
    }

    /// Rebuild all postings from the documents and persist the result.
    /// Completion is reported only after the new postings are durable.
    pub fn rebuild_all(&self, name: &str) -> Result<RebuildSummary> {
        let start = Instant::now();

        let handle = self.get(name)?;
        let counts = handle.rebuild_postings();
        handle.persist_postings()?;
        handle.persist_metadata()?;

        info!(
            "index '{name}': rebuilt {} documents into {} terms",
            counts.documents_processed, counts.terms_indexed
        );
        Ok(RebuildSummary {
            documents_processed: counts.documents_processed,
            terms_indexed: counts.terms_indexed,
            took_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Recompute `doc_count` by scanning the document store.
    pub fn rebuild_doc_count(&self, name: &str) -> Result<u64> {
        let handle = self.get(name)?;
        let live = handle.documents().live_count() as u64;
        handle.update_metadata(|m| m.doc_count = live);
        handle.persist_metadata()?;
        Ok(live)
    }

    /// Delete the durable posting rows of one index, leaving the in-memory
    /// dictionary and the documents untouched. Returns how many persisted
    /// terms the deleted file held.
    pub fn clear_term_postings(&self, name: &str) -> Result<u64> {
        self.get(name)?;
        let file = postings_file(name);
        let deleted = match self.count_persisted_terms(&file) {
            Ok(count) => count,
            Err(e) => {
                warn!("index '{name}': could not count persisted terms: {e}");
                0
            }
        };
        self.storage.delete_file(&file)?;
        info!("index '{name}': cleared {deleted} persisted term postings");
        Ok(deleted)
    }

    /// Synchronously evict the scan cache of one index. Returns the number
    /// of evicted entries.
    pub fn clear_cache(&self, name: &str) -> Result<usize> {
        let handle = self.get(name)?;
        let cleared = handle.clear_scan_cache();
        info!("index '{name}': evicted {cleared} cached term scans");
        Ok(cleared)
    }

    /// Wipe every index and every storage file. Requires the configured
    /// reset key; a mismatch rejects before anything is touched.
    pub fn system_reset(&self, provided_key: Option<&str>) -> Result<Vec<String>> {
        let Some(expected) = &self.reset_key else {
            return Err(FalxError::validation(
                "system reset is disabled: no reset key is configured",
            ));
        };
        if provided_key != Some(expected.as_str()) {
            warn!("system reset rejected: key mismatch");
            return Err(FalxError::validation("invalid reset key"));
        }

        let mut indices = self.indices.write();
        let count = indices.len();
        for file in self.storage.list_files()? {
            self.storage.delete_file(&file)?;
        }
        indices.clear();
        warn!("system reset: wiped {count} indices");

        Ok(vec![
            "termDictionary".to_string(),
            "postingStore".to_string(),
            "documentStore".to_string(),
            "indexMetadata".to_string(),
        ])
    }

    /// Persist metadata, documents, and postings of every open index.
    pub fn persist_all(&self) -> Result<()> {
        let handles: Vec<Arc<IndexHandle>> = self.indices.read().values().cloned().collect();
        for handle in handles {
            handle.persist_all()?;
        }
        Ok(())
    }

    fn delete_index_files(&self, name: &str) -> Result<()> {
        for file in [metadata_file(name), documents_file(name), postings_file(name)] {
            self.storage.delete_file(&file)?;
        }
        Ok(())
    }

    fn count_persisted_terms(&self, file: &str) -> Result<u64> {
        if !self.storage.file_exists(file) {
            return Ok(0);
        }
        let input = self.storage.open_input(file)?;
        let mut reader = StructReader::new(input)?;
        let dictionary = TermDictionary::read_from(&mut reader)?;
        Ok(dictionary.term_count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn memory_manager(reset_key: Option<&str>) -> IndexManager {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        IndexManager::open(storage, 64, reset_key.map(String::from)).unwrap()
    }

    fn create_default(manager: &IndexManager, name: &str) -> Arc<IndexHandle> {
        manager
            .create(name, IndexSettings::default(), IndexMappings::default())
            .unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let manager = memory_manager(None);
        create_default(&manager, "books");

        let handle = manager.get("books").unwrap();
        assert_eq!(handle.metadata().status, IndexStatus::Open);
        assert_eq!(manager.get("missing").unwrap_err().http_status(), 404);
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let manager = memory_manager(None);
        create_default(&manager, "books");
        let err = manager
            .create("books", IndexSettings::default(), IndexMappings::default())
            .unwrap_err();
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let manager = memory_manager(None);
        let err = manager
            .create("Bad Name", IndexSettings::default(), IndexMappings::default())
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_list_with_status_filter() {
        let manager = memory_manager(None);
        create_default(&manager, "b-index");
        create_default(&manager, "a-index");

        let all = manager.list(None);
        let names: Vec<&str> = all.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a-index", "b-index"]);

        assert_eq!(manager.list(Some(IndexStatus::Open)).len(), 2);
        assert!(manager.list(Some(IndexStatus::Closed)).is_empty());
    }

    #[test]
    fn test_update_merges_partially() {
        let manager = memory_manager(None);
        create_default(&manager, "books");

        let mappings: IndexMappings =
            serde_json::from_value(json!({"properties": {"title": {"type": "text", "boost": 2.0}}}))
                .unwrap();
        let updated = manager
            .update(
                "books",
                Some(IndexSettingsPatch {
                    shards: Some(2),
                    refresh_interval: None,
                }),
                Some(mappings),
            )
            .unwrap();

        assert_eq!(updated.settings.shards, 2);
        assert_eq!(updated.settings.refresh_interval, "1s");
        assert_eq!(updated.mappings.boost("title"), 2.0);
    }

    #[test]
    fn test_delete_removes_files() {
        let manager = memory_manager(None);
        let handle = create_default(&manager, "books");
        handle.put_document(Some("b1"), json!({"title": "gone"})).unwrap();
        handle.persist_all().unwrap();

        manager.delete("books").unwrap();
        assert_eq!(manager.get("books").unwrap_err().http_status(), 404);
        assert!(manager.storage().list_files().unwrap().is_empty());
        assert_eq!(manager.delete("books").unwrap_err().http_status(), 404);
    }

    #[test]
    fn test_rebuild_reports_and_persists() {
        let manager = memory_manager(None);
        let handle = create_default(&manager, "books");
        handle.put_document(Some("b1"), json!({"title": "alpha beta"})).unwrap();
        handle.put_document(Some("b2"), json!({"title": "gamma"})).unwrap();

        let summary = manager.rebuild_all("books").unwrap();
        assert_eq!(summary.documents_processed, 2);
        assert!(summary.terms_indexed >= 3);
        assert!(manager.storage().file_exists(&postings_file("books")));
    }

    #[test]
    fn test_clear_term_postings_counts_durable_rows() {
        let manager = memory_manager(None);
        let handle = create_default(&manager, "books");
        handle.put_document(Some("b1"), json!({"title": "alpha beta"})).unwrap();
        handle.persist_postings().unwrap();

        let deleted = manager.clear_term_postings("books").unwrap();
        assert_eq!(deleted, 2);
        assert!(!manager.storage().file_exists(&postings_file("books")));
        // The in-memory dictionary is untouched.
        assert!(handle.dictionary().lookup("title", "alpha").is_some());

        assert_eq!(manager.clear_term_postings("books").unwrap(), 0);
    }

    #[test]
    fn test_reset_requires_matching_key() {
        let manager = memory_manager(Some("topsecret"));
        let handle = create_default(&manager, "books");
        handle.put_document(Some("b1"), json!({"title": "wipe me"})).unwrap();
        handle.persist_all().unwrap();

        assert_eq!(manager.system_reset(None).unwrap_err().http_status(), 400);
        assert_eq!(
            manager.system_reset(Some("wrong")).unwrap_err().http_status(),
            400
        );
        // Nothing was touched by the rejected attempts.
        assert_eq!(manager.index_count(), 1);
        assert!(!manager.storage().list_files().unwrap().is_empty());

        let components = manager.system_reset(Some("topsecret")).unwrap();
        assert_eq!(components.len(), 4);
        assert_eq!(manager.index_count(), 0);
        assert!(manager.storage().list_files().unwrap().is_empty());
    }

    #[test]
    fn test_reset_disabled_without_key() {
        let manager = memory_manager(None);
        let err = manager.system_reset(Some("anything")).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_reopen_restores_indices() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        {
            let manager = IndexManager::open(storage.clone(), 64, None).unwrap();
            let handle = manager
                .create("books", IndexSettings::default(), IndexMappings::default())
                .unwrap();
            handle.put_document(Some("b1"), json!({"title": "persistent"})).unwrap();
            manager.persist_all().unwrap();
        }

        let reopened = IndexManager::open(storage, 64, None).unwrap();
        assert_eq!(reopened.index_count(), 1);
        let handle = reopened.get("books").unwrap();
        assert!(handle.get_document("b1").is_some());
        assert!(handle.dictionary().lookup("title", "persistent").is_some());
    }
}
