//! Live in-memory state of one open index.
//!
//! An [`IndexHandle`] owns the dictionary, document store, and scan cache of
//! a single index behind `parking_lot` locks, plus the persistence of all
//! three artifacts through the storage backend. Lock order everywhere is
//! documents, then dictionary, then metadata; readers hold the guards for
//! the duration of one request.

use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::analysis::{Analyzer, flatten_source, resolve_analyzer};
use crate::dictionary::{ScanCache, TermDictionary};
use crate::docstore::{DocumentStore, StoredDocument};
use crate::error::{FalxError, Result};
use crate::lifecycle::metadata::{
    IndexMetadata, documents_file, metadata_file, postings_file,
};
use crate::storage::{Storage, StructReader, StructWriter};

/// Outcome of a single-document write.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub id: String,
    pub version: u64,
    pub created: bool,
}

/// Counters produced by a full posting rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildCounts {
    pub documents_processed: u64,
    pub terms_indexed: u64,
}

/// Point-in-time size figures for one index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub doc_count: u64,
    pub term_count: u64,
    pub field_count: u64,
    pub deleted_count: u64,
}

pub struct IndexHandle {
    name: String,
    metadata: RwLock<IndexMetadata>,
    documents: RwLock<DocumentStore>,
    dictionary: RwLock<TermDictionary>,
    scan_cache: ScanCache,
    storage: Arc<dyn Storage>,
    // Serializes temp-file writes so concurrent batch workers cannot
    // interleave on the same artifact.
    persist_lock: Mutex<()>,
    standard: Arc<dyn Analyzer>,
    keyword: Arc<dyn Analyzer>,
}

impl IndexHandle {
    /// Create a handle for a brand-new, empty index.
    pub fn new(
        metadata: IndexMetadata,
        storage: Arc<dyn Storage>,
        cache_capacity: usize,
    ) -> Result<Self> {
        let name = metadata.name.clone();
        Ok(IndexHandle {
            name,
            metadata: RwLock::new(metadata),
            documents: RwLock::new(DocumentStore::new()),
            dictionary: RwLock::new(TermDictionary::new()),
            scan_cache: ScanCache::new(cache_capacity),
            storage,
            persist_lock: Mutex::new(()),
            standard: resolve_analyzer("standard")?,
            keyword: resolve_analyzer("keyword")?,
        })
    }

    /// Reopen an index from its persisted files.
    ///
    /// Documents and metadata must both be readable. A missing postings file
    /// is recovered from by re-deriving the dictionary out of the stored
    /// documents; a corrupt one is an error.
    pub fn open(name: &str, storage: Arc<dyn Storage>, cache_capacity: usize) -> Result<Self> {
        let metadata: IndexMetadata = read_bincode(storage.as_ref(), &metadata_file(name))?;

        let documents = if storage.file_exists(&documents_file(name)) {
            let snapshot = read_bincode(storage.as_ref(), &documents_file(name))?;
            DocumentStore::restore(snapshot)?
        } else {
            DocumentStore::new()
        };

        let handle = IndexHandle {
            name: name.to_string(),
            metadata: RwLock::new(metadata),
            documents: RwLock::new(documents),
            dictionary: RwLock::new(TermDictionary::new()),
            scan_cache: ScanCache::new(cache_capacity),
            storage,
            persist_lock: Mutex::new(()),
            standard: resolve_analyzer("standard")?,
            keyword: resolve_analyzer("keyword")?,
        };

        let postings = postings_file(name);
        if handle.storage.file_exists(&postings) {
            let input = handle.storage.open_input(&postings)?;
            let mut reader = StructReader::new(input)?;
            let loaded = TermDictionary::read_from(&mut reader).map_err(|e| {
                FalxError::storage(format!("postings file '{postings}' unreadable: {e}"))
            })?;
            *handle.dictionary.write() = loaded;
        } else {
            warn!("index '{name}': postings file missing, rebuilding from documents");
            handle.rebuild_postings();
        }

        Ok(handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current metadata.
    pub fn metadata(&self) -> IndexMetadata {
        self.metadata.read().clone()
    }

    /// Mutate metadata in place and stamp `updated_at`.
    pub fn update_metadata<F: FnOnce(&mut IndexMetadata)>(&self, apply: F) {
        let mut metadata = self.metadata.write();
        apply(&mut metadata);
        metadata.touch();
    }

    pub fn documents(&self) -> RwLockReadGuard<'_, DocumentStore> {
        self.documents.read()
    }

    pub fn dictionary(&self) -> RwLockReadGuard<'_, TermDictionary> {
        self.dictionary.read()
    }

    pub fn scan_cache(&self) -> &ScanCache {
        &self.scan_cache
    }

    /// The analyzer a field's mapping selects; standard unless the mapping
    /// marks the field as keyword.
    pub fn analyzer_for(&self, field: &str) -> &dyn Analyzer {
        let metadata = self.metadata.read();
        match metadata.mappings.field(field) {
            Some(mapping) if mapping.is_keyword() => self.keyword.as_ref(),
            _ => self.standard.as_ref(),
        }
    }

    /// The analyzer used for ad-hoc query text.
    pub fn query_analyzer(&self) -> &dyn Analyzer {
        self.standard.as_ref()
    }

    /// Tokenize every scalar field of a source into `path -> terms`.
    pub fn analyze_source(&self, source: &Value) -> AHashMap<String, Vec<String>> {
        let mut fields: AHashMap<String, Vec<String>> = AHashMap::new();
        for (path, text) in flatten_source(source) {
            let tokens = self
                .analyzer_for(&path)
                .analyze(&text)
                .into_iter()
                .map(|token| token.text);
            fields.entry(path).or_default().extend(tokens);
        }
        fields
    }

    /// Upsert one document and its postings.
    ///
    /// A missing id gets a generated uuid. Updates first retract the
    /// previous source's postings so term frequencies never double-count.
    pub fn put_document(&self, id: Option<&str>, source: Value) -> Result<DocumentWrite> {
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        self.write_document(id, source, false)
    }

    /// Replace one existing document. Unlike [`IndexHandle::put_document`]
    /// an id with no live document is a not-found error, decided under the
    /// same write lock as the put so a concurrent delete cannot turn the
    /// replace into a create.
    pub fn replace_document(&self, id: &str, source: Value) -> Result<DocumentWrite> {
        self.write_document(id.to_string(), source, true)
    }

    fn write_document(
        &self,
        id: String,
        source: Value,
        require_existing: bool,
    ) -> Result<DocumentWrite> {
        if !source.is_object() {
            return Err(FalxError::validation("document source must be a JSON object"));
        }
        let fields = self.analyze_source(&source);

        let created = {
            let mut documents = self.documents.write();
            let mut dictionary = self.dictionary.write();

            if require_existing
                && !documents
                    .ordinal_of(&id)
                    .is_some_and(|ordinal| documents.is_live(ordinal))
            {
                return Err(FalxError::not_found(format!(
                    "document '{id}' not found in index '{}'",
                    self.name
                )));
            }

            let put = documents.put(&id, source)?;
            if let Some(previous) = &put.previous_source {
                let old_fields = self.analyze_source(previous);
                dictionary.remove_document(put.ordinal, &old_fields);
            }
            dictionary.index_document(put.ordinal, &fields);
            debug!(
                "index '{}': put id={id} version={} created={}",
                self.name, put.version, put.created
            );

            DocumentWrite {
                id,
                version: put.version,
                created: put.created,
            }
        };

        if created.created {
            self.update_metadata(|m| m.doc_count += 1);
        }
        Ok(created)
    }

    pub fn get_document(&self, id: &str) -> Option<StoredDocument> {
        self.documents.read().get(id)
    }

    /// Delete one document and retract its postings. Returns false when the
    /// id has no live document.
    pub fn delete_document(&self, id: &str) -> bool {
        let deleted = {
            let mut documents = self.documents.write();
            let mut dictionary = self.dictionary.write();
            match documents.delete(id) {
                Some((ordinal, previous)) => {
                    let old_fields = self.analyze_source(&previous);
                    dictionary.remove_document(ordinal, &old_fields);
                    true
                }
                None => false,
            }
        };
        if deleted {
            self.update_metadata(|m| m.doc_count = m.doc_count.saturating_sub(1));
            debug!("index '{}': deleted id={id}", self.name);
        }
        deleted
    }

    /// Re-derive every live document's postings into a fresh dictionary and
    /// swap it in.
    pub fn rebuild_postings(&self) -> RebuildCounts {
        let mut fresh = TermDictionary::new();
        let mut documents_processed = 0u64;
        {
            let documents = self.documents.read();
            for (ordinal, _, source) in documents.iter_live() {
                let fields = self.analyze_source(source);
                fresh.index_document(ordinal, &fields);
                documents_processed += 1;
            }
        }
        let terms_indexed = fresh.term_count() as u64;

        // The fresh dictionary restarts the generation counter, so cached
        // scans must go before any reader can observe the new counter.
        {
            let mut dictionary = self.dictionary.write();
            *dictionary = fresh;
            self.scan_cache.clear();
        }
        self.update_metadata(|m| m.doc_count = documents_processed);

        RebuildCounts {
            documents_processed,
            terms_indexed,
        }
    }

    /// Drop all cached scan results. Durable postings are untouched.
    pub fn clear_scan_cache(&self) -> usize {
        self.scan_cache.clear()
    }

    pub fn stats(&self) -> IndexStats {
        let documents = self.documents.read();
        let dictionary = self.dictionary.read();
        IndexStats {
            doc_count: documents.live_count() as u64,
            term_count: dictionary.term_count() as u64,
            field_count: dictionary.fields().len() as u64,
            deleted_count: (documents.slot_count() - documents.live_count()) as u64,
        }
    }

    /// Write the dictionary to its postings file. Returns the persisted term
    /// count.
    pub fn persist_postings(&self) -> Result<usize> {
        let _guard = self.persist_lock.lock();
        let file = postings_file(&self.name);
        let temp = format!("{file}.tmp");

        let output = self.storage.create_output(&temp)?;
        let mut writer = StructWriter::new(output);
        let term_count = {
            let dictionary = self.dictionary.read();
            dictionary.write_to(&mut writer)?;
            dictionary.term_count()
        };
        writer.close()?;
        self.storage.rename_file(&temp, &file)?;

        debug!("index '{}': persisted {term_count} terms", self.name);
        Ok(term_count)
    }

    /// Write the document snapshot to its file.
    pub fn persist_documents(&self) -> Result<()> {
        let _guard = self.persist_lock.lock();
        let snapshot = self.documents.read().snapshot();
        write_bincode(self.storage.as_ref(), &documents_file(&self.name), &snapshot)
    }

    /// Write the metadata to its file.
    pub fn persist_metadata(&self) -> Result<()> {
        let _guard = self.persist_lock.lock();
        let metadata = self.metadata();
        write_bincode(self.storage.as_ref(), &metadata_file(&self.name), &metadata)
    }

    /// Persist metadata, documents, and postings together.
    pub fn persist_all(&self) -> Result<()> {
        self.persist_metadata()?;
        self.persist_documents()?;
        self.persist_postings()?;
        Ok(())
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Serialize a value to a storage file through a temp-and-rename publish.
fn write_bincode<T: Serialize>(storage: &dyn Storage, file: &str, value: &T) -> Result<()> {
    let temp = format!("{file}.tmp");
    let mut output = storage.create_output(&temp)?;
    let bytes = bincode::serialize(value)
        .map_err(|e| FalxError::storage(format!("encoding '{file}' failed: {e}")))?;
    std::io::Write::write_all(&mut output, &bytes)?;
    output.close()?;
    storage.rename_file(&temp, file)?;
    Ok(())
}

fn read_bincode<T: serde::de::DeserializeOwned>(storage: &dyn Storage, file: &str) -> Result<T> {
    let mut input = storage.open_input(file)?;
    let mut bytes = Vec::new();
    std::io::Read::read_to_end(&mut input, &mut bytes)?;
    bincode::deserialize(&bytes)
        .map_err(|e| FalxError::storage(format!("decoding '{file}' failed: {e}")))
}
