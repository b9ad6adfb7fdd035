//! Per-index document storage and ordinal interning.
//!
//! External string ids are interned to dense `u32` ordinals on first sight.
//! An id keeps its ordinal for the life of the index, across deletes: the
//! slot is tombstoned, and re-putting the same id revives the ordinal with
//! the version continuing from where it stopped. Ordinals are meaningless
//! outside their own index.

use bit_vec::BitVec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FalxError, Result};

/// A live document as returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// External document id.
    pub id: String,
    /// The document source as submitted.
    pub source: Value,
    /// Monotonic per-id version, starting at 1.
    pub version: u64,
}

/// Outcome of a put.
#[derive(Debug, Clone, PartialEq)]
pub struct PutResult {
    /// Ordinal assigned to the id.
    pub ordinal: u32,
    /// Version after the put.
    pub version: u64,
    /// True for a first write or a revive, false for an overwrite.
    pub created: bool,
    /// The replaced source when overwriting a live document.
    pub previous_source: Option<Value>,
}

#[derive(Debug)]
struct Slot {
    id: String,
    version: u64,
    // None while the slot is tombstoned.
    source: Option<Value>,
}

/// The document store for one index.
#[derive(Debug, Default)]
pub struct DocumentStore {
    ordinals: ahash::AHashMap<String, u32>,
    slots: Vec<Slot>,
    live: BitVec,
    live_count: usize,
}

impl DocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the document under `id`.
    pub fn put(&mut self, id: &str, source: Value) -> Result<PutResult> {
        if let Some(&ordinal) = self.ordinals.get(id) {
            let slot = &mut self.slots[ordinal as usize];
            slot.version += 1;

            let was_live = self.live.get(ordinal as usize).unwrap_or(false);
            let previous_source = slot.source.replace(source);

            if !was_live {
                self.live.set(ordinal as usize, true);
                self.live_count += 1;
            }

            return Ok(PutResult {
                ordinal,
                version: slot.version,
                created: !was_live,
                previous_source: if was_live { previous_source } else { None },
            });
        }

        let ordinal = u32::try_from(self.slots.len())
            .map_err(|_| FalxError::internal("document ordinal space exhausted"))?;

        self.slots.push(Slot {
            id: id.to_string(),
            version: 1,
            source: Some(source),
        });
        self.live.push(true);
        self.live_count += 1;
        self.ordinals.insert(id.to_string(), ordinal);

        Ok(PutResult {
            ordinal,
            version: 1,
            created: true,
            previous_source: None,
        })
    }

    /// Fetch a live document by id.
    pub fn get(&self, id: &str) -> Option<StoredDocument> {
        let ordinal = *self.ordinals.get(id)?;
        self.stored(ordinal)
    }

    /// Fetch a live document by ordinal.
    pub fn stored(&self, ordinal: u32) -> Option<StoredDocument> {
        if !self.is_live(ordinal) {
            return None;
        }
        let slot = self.slots.get(ordinal as usize)?;
        Some(StoredDocument {
            id: slot.id.clone(),
            source: slot.source.clone()?,
            version: slot.version,
        })
    }

    /// The id at `ordinal`, live or not.
    pub fn id_of(&self, ordinal: u32) -> Option<&str> {
        self.slots.get(ordinal as usize).map(|slot| slot.id.as_str())
    }

    /// The source of the live document at `ordinal`.
    pub fn source_of(&self, ordinal: u32) -> Option<&Value> {
        if !self.is_live(ordinal) {
            return None;
        }
        self.slots.get(ordinal as usize)?.source.as_ref()
    }

    /// The ordinal interned for `id`, live or tombstoned.
    pub fn ordinal_of(&self, id: &str) -> Option<u32> {
        self.ordinals.get(id).copied()
    }

    /// Tombstone the document under `id`.
    ///
    /// Returns the ordinal and the removed source so the caller can strip its
    /// postings. The id keeps its ordinal and version for a later revive.
    pub fn delete(&mut self, id: &str) -> Option<(u32, Value)> {
        let ordinal = *self.ordinals.get(id)?;
        if !self.is_live(ordinal) {
            return None;
        }

        let slot = &mut self.slots[ordinal as usize];
        let source = slot.source.take()?;
        self.live.set(ordinal as usize, false);
        self.live_count -= 1;
        Some((ordinal, source))
    }

    /// Whether the slot at `ordinal` holds a live document.
    pub fn is_live(&self, ordinal: u32) -> bool {
        self.live.get(ordinal as usize).unwrap_or(false)
    }

    /// Number of live documents.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Number of interned ids, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over live documents in ordinal (insertion) order.
    pub fn iter_live(&self) -> impl Iterator<Item = (u32, &str, &Value)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let ordinal = i as u32;
            if self.live.get(i).unwrap_or(false) {
                slot.source
                    .as_ref()
                    .map(|source| (ordinal, slot.id.as_str(), source))
            } else {
                None
            }
        })
    }

    /// Drop every document and every interned id.
    pub fn clear(&mut self) {
        self.ordinals.clear();
        self.slots.clear();
        self.live = BitVec::new();
        self.live_count = 0;
    }

    /// Capture the full store state, tombstones included.
    pub fn snapshot(&self) -> DocStoreSnapshot {
        let entries = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| SnapshotEntry {
                id: slot.id.clone(),
                version: slot.version,
                live: self.live.get(i).unwrap_or(false),
                source_json: slot.source.as_ref().map(|s| s.to_string()),
            })
            .collect();
        DocStoreSnapshot { entries }
    }

    /// Rebuild a store from a snapshot.
    pub fn restore(snapshot: DocStoreSnapshot) -> Result<Self> {
        let mut store = DocumentStore::new();

        for (i, entry) in snapshot.entries.into_iter().enumerate() {
            let ordinal = u32::try_from(i)
                .map_err(|_| FalxError::storage("snapshot exceeds ordinal space"))?;

            let source = match entry.source_json {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };

            if entry.live && source.is_none() {
                return Err(FalxError::storage(format!(
                    "snapshot entry {} is live but has no source",
                    entry.id
                )));
            }

            store.ordinals.insert(entry.id.clone(), ordinal);
            store.slots.push(Slot {
                id: entry.id,
                version: entry.version,
                source,
            });
            store.live.push(entry.live);
            if entry.live {
                store.live_count += 1;
            }
        }

        Ok(store)
    }
}

/// A serializable snapshot of a [`DocumentStore`].
///
/// Sources are carried as JSON text; ordinals are implied by entry position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocStoreSnapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEntry {
    id: String,
    version: u64,
    live: bool,
    source_json: Option<String>,
}
