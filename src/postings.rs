//! Posting lists mapping document ordinals to term frequencies.

use crate::error::Result;
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{StorageInput, StorageOutput};

/// A single posting: one document that contains a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Dense per-index document ordinal.
    pub ordinal: u32,
    /// Number of times the term occurs in the document field.
    pub frequency: u32,
}

impl Posting {
    /// Create a new posting.
    pub fn new(ordinal: u32, frequency: u32) -> Self {
        Posting { ordinal, frequency }
    }
}

/// The documents containing one term, sorted by ordinal.
///
/// Each ordinal appears at most once. Adding an ordinal that is already
/// present replaces its frequency instead of merging, so re-indexing a
/// document is idempotent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    /// Insert or update the posting for `ordinal`.
    ///
    /// Returns `true` when the ordinal was not present before.
    pub fn add_or_update(&mut self, ordinal: u32, frequency: u32) -> bool {
        match self.postings.binary_search_by_key(&ordinal, |p| p.ordinal) {
            Ok(pos) => {
                self.postings[pos].frequency = frequency;
                false
            }
            Err(pos) => {
                self.postings.insert(pos, Posting::new(ordinal, frequency));
                true
            }
        }
    }

    /// Remove the posting for `ordinal`, returning whether it was present.
    pub fn remove(&mut self, ordinal: u32) -> bool {
        match self.postings.binary_search_by_key(&ordinal, |p| p.ordinal) {
            Ok(pos) => {
                self.postings.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Get the stored frequency for `ordinal`, if present.
    pub fn get(&self, ordinal: u32) -> Option<u32> {
        self.postings
            .binary_search_by_key(&ordinal, |p| p.ordinal)
            .ok()
            .map(|pos| self.postings[pos].frequency)
    }

    /// Check whether `ordinal` is present.
    pub fn contains(&self, ordinal: u32) -> bool {
        self.get(ordinal).is_some()
    }

    /// Number of documents containing the term.
    pub fn doc_frequency(&self) -> u64 {
        self.postings.len() as u64
    }

    /// Sum of frequencies across all documents.
    pub fn total_frequency(&self) -> u64 {
        self.postings.iter().map(|p| u64::from(p.frequency)).sum()
    }

    /// Get the number of postings.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Get an iterator over the postings in ordinal order.
    pub fn iter(&'_ self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    /// Get the postings as a slice, sorted by ordinal.
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Encode the posting list to binary format.
    ///
    /// Ordinals are delta-compressed; frequencies follow as varints in the
    /// same order.
    pub fn encode<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        let ordinals: Vec<u32> = self.postings.iter().map(|p| p.ordinal).collect();
        writer.write_delta_compressed_u32s(&ordinals)?;

        for posting in &self.postings {
            writer.write_varint(u64::from(posting.frequency))?;
        }

        Ok(())
    }

    /// Decode a posting list from binary format.
    pub fn decode<R: StorageInput>(reader: &mut StructReader<R>) -> Result<Self> {
        let ordinals = reader.read_delta_compressed_u32s()?;

        let mut postings = Vec::with_capacity(ordinals.len());
        for ordinal in ordinals {
            let frequency = reader.read_varint()? as u32;
            postings.push(Posting::new(ordinal, frequency));
        }

        Ok(PostingList { postings })
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.postings.iter()
    }
}
