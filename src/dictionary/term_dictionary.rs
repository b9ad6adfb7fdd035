//! The per-index term dictionary.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};

use crate::dictionary::pattern::WildcardPattern;
use crate::error::{FalxError, Result};
use crate::postings::PostingList;
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{StorageInput, StorageOutput};

/// Magic number identifying a postings file ("FXPS").
pub const POSTINGS_MAGIC: u32 = 0x4658_5053;

/// Current postings file format version.
pub const POSTINGS_VERSION: u32 = 1;

/// The key for one posting list: a field name and an analyzed term.
///
/// Keys order by field first, then term, so all terms of a field form one
/// contiguous range and a prefix scan never crosses into another field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermKey {
    /// Field the term was extracted from.
    pub field: String,
    /// The analyzed term.
    pub term: String,
}

impl TermKey {
    /// Create a new term key.
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> Self {
        TermKey {
            field: field.into(),
            term: term.into(),
        }
    }
}

/// Aggregate statistics for one field across the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStats {
    /// Number of documents carrying the field.
    pub doc_count: u64,
    /// Total analyzed tokens across those documents.
    pub total_tokens: u64,
}

impl FieldStats {
    /// Average field length in tokens.
    pub fn avg_length(&self) -> f64 {
        if self.doc_count == 0 {
            0.0
        } else {
            self.total_tokens as f64 / self.doc_count as f64
        }
    }
}

/// The inverted dictionary for one index.
///
/// Maps `(field, term)` keys to posting lists and tracks the per-field and
/// per-document length statistics scoring needs. Every mutation bumps a
/// generation counter; cached scan results carry the generation they were
/// computed under and become invalid as soon as it moves.
#[derive(Debug, Default)]
pub struct TermDictionary {
    terms: BTreeMap<TermKey, PostingList>,
    field_stats: AHashMap<String, FieldStats>,
    field_lengths: AHashMap<u32, AHashMap<String, u32>>,
    generation: u64,
}

impl TermDictionary {
    /// Create a new empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the analyzed fields of one document under `ordinal`.
    ///
    /// `fields` maps each field name to the terms its value analyzed into,
    /// duplicates included. Indexing the same ordinal twice without removing
    /// it first double-counts statistics, so callers remove the old state on
    /// update.
    pub fn index_document(&mut self, ordinal: u32, fields: &AHashMap<String, Vec<String>>) {
        for (field, terms) in fields {
            let stats = self.field_stats.entry(field.clone()).or_default();
            stats.doc_count += 1;
            stats.total_tokens += terms.len() as u64;

            self.field_lengths
                .entry(ordinal)
                .or_default()
                .insert(field.clone(), terms.len() as u32);

            let mut freqs: AHashMap<&str, u32> = AHashMap::new();
            for term in terms {
                *freqs.entry(term.as_str()).or_insert(0) += 1;
            }

            for (term, freq) in freqs {
                self.terms
                    .entry(TermKey::new(field.clone(), term))
                    .or_default()
                    .add_or_update(ordinal, freq);
            }
        }

        self.generation += 1;
    }

    /// Remove one document's contribution, given the same analyzed fields it
    /// was indexed with.
    pub fn remove_document(&mut self, ordinal: u32, fields: &AHashMap<String, Vec<String>>) {
        for (field, terms) in fields {
            if let Some(stats) = self.field_stats.get_mut(field) {
                stats.doc_count = stats.doc_count.saturating_sub(1);
                stats.total_tokens = stats.total_tokens.saturating_sub(terms.len() as u64);
                if stats.doc_count == 0 {
                    self.field_stats.remove(field);
                }
            }

            let unique: AHashSet<&str> = terms.iter().map(String::as_str).collect();
            for term in unique {
                let key = TermKey::new(field.clone(), term);
                let now_empty = match self.terms.get_mut(&key) {
                    Some(list) => {
                        list.remove(ordinal);
                        list.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.terms.remove(&key);
                }
            }
        }

        self.field_lengths.remove(&ordinal);
        self.generation += 1;
    }

    /// Look up the posting list for an exact `(field, term)` pair.
    pub fn lookup(&self, field: &str, term: &str) -> Option<&PostingList> {
        self.terms.get(&TermKey::new(field, term))
    }

    /// Collect every term in `field` matching the wildcard pattern.
    ///
    /// With a literal prefix only the key range starting with it is walked;
    /// a leading-wildcard pattern scans the whole field.
    pub fn scan_wildcard(&self, field: &str, pattern: &WildcardPattern) -> Vec<String> {
        let prefix = pattern.prefix();
        let start = TermKey::new(field, prefix);

        self.terms
            .range(start..)
            .take_while(|(key, _)| key.field == field && key.term.starts_with(prefix))
            .filter(|(key, _)| pattern.matches(&key.term))
            .map(|(key, _)| key.term.clone())
            .collect()
    }

    /// Collect every term in `field` starting with `prefix`.
    pub fn scan_prefix(&self, field: &str, prefix: &str) -> Vec<String> {
        let start = TermKey::new(field, prefix);

        self.terms
            .range(start..)
            .take_while(|(key, _)| key.field == field && key.term.starts_with(prefix))
            .map(|(key, _)| key.term.clone())
            .collect()
    }

    /// Drop the posting lists for `term`, in one field or in all of them.
    ///
    /// Returns the number of postings dropped. Document statistics are left
    /// alone; the documents still exist and a rebuild restores the lists.
    pub fn remove_term(&mut self, field: Option<&str>, term: &str) -> u64 {
        let keys: Vec<TermKey> = self
            .terms
            .keys()
            .filter(|key| key.term == term && field.is_none_or(|f| key.field == f))
            .cloned()
            .collect();

        let mut removed = 0;
        for key in keys {
            if let Some(list) = self.terms.remove(&key) {
                removed += list.doc_frequency();
            }
        }

        if removed > 0 {
            self.generation += 1;
        }
        removed
    }

    /// Get the statistics for one field.
    pub fn field_stats(&self, field: &str) -> Option<FieldStats> {
        self.field_stats.get(field).copied()
    }

    /// Iterate over all field statistics.
    pub fn field_stats_iter(&self) -> impl Iterator<Item = (&String, &FieldStats)> {
        self.field_stats.iter()
    }

    /// All field names seen by the index, sorted.
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.field_stats.keys().cloned().collect();
        fields.sort();
        fields
    }

    /// Analyzed token count of `field` in the document at `ordinal`.
    pub fn field_length(&self, ordinal: u32, field: &str) -> u32 {
        self.field_lengths
            .get(&ordinal)
            .and_then(|lengths| lengths.get(field))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct `(field, term)` keys.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Total number of postings across all lists.
    pub fn posting_count(&self) -> u64 {
        self.terms.values().map(|list| list.doc_frequency()).sum()
    }

    /// Iterate over all `(key, posting list)` entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&TermKey, &PostingList)> {
        self.terms.iter()
    }

    /// The mutation generation. Moves on every change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop all terms and statistics.
    pub fn clear(&mut self) {
        self.terms.clear();
        self.field_stats.clear();
        self.field_lengths.clear();
        self.generation += 1;
    }

    /// Serialize the dictionary to a postings file payload.
    pub fn write_to<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_u32(POSTINGS_MAGIC)?;
        writer.write_u32(POSTINGS_VERSION)?;
        writer.write_u64(self.generation)?;

        // Sort map sections for deterministic output.
        let mut fields: Vec<_> = self.field_stats.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        writer.write_varint(fields.len() as u64)?;
        for (name, stats) in fields {
            writer.write_string(name)?;
            writer.write_varint(stats.doc_count)?;
            writer.write_varint(stats.total_tokens)?;
        }

        let mut ordinals: Vec<u32> = self.field_lengths.keys().copied().collect();
        ordinals.sort_unstable();
        writer.write_varint(ordinals.len() as u64)?;
        for ordinal in ordinals {
            writer.write_varint(u64::from(ordinal))?;
            let lengths = &self.field_lengths[&ordinal];
            let mut entries: Vec<_> = lengths.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            writer.write_varint(entries.len() as u64)?;
            for (name, len) in entries {
                writer.write_string(name)?;
                writer.write_varint(u64::from(*len))?;
            }
        }

        writer.write_varint(self.terms.len() as u64)?;
        for (key, list) in &self.terms {
            writer.write_string(&key.field)?;
            writer.write_string(&key.term)?;
            list.encode(writer)?;
        }

        Ok(())
    }

    /// Deserialize a dictionary from a postings file payload.
    pub fn read_from<R: StorageInput>(reader: &mut StructReader<R>) -> Result<Self> {
        let magic = reader.read_u32()?;
        if magic != POSTINGS_MAGIC {
            return Err(FalxError::storage("invalid postings file format"));
        }

        let version = reader.read_u32()?;
        if version != POSTINGS_VERSION {
            return Err(FalxError::storage(format!(
                "unsupported postings file version: {version}"
            )));
        }

        let generation = reader.read_u64()?;

        let field_count = reader.read_varint()? as usize;
        let mut field_stats = AHashMap::with_capacity(field_count);
        for _ in 0..field_count {
            let name = reader.read_string()?;
            let doc_count = reader.read_varint()?;
            let total_tokens = reader.read_varint()?;
            field_stats.insert(
                name,
                FieldStats {
                    doc_count,
                    total_tokens,
                },
            );
        }

        let doc_count = reader.read_varint()? as usize;
        let mut field_lengths = AHashMap::with_capacity(doc_count);
        for _ in 0..doc_count {
            let ordinal = reader.read_varint()? as u32;
            let entry_count = reader.read_varint()? as usize;
            let mut lengths = AHashMap::with_capacity(entry_count);
            for _ in 0..entry_count {
                let name = reader.read_string()?;
                let len = reader.read_varint()? as u32;
                lengths.insert(name, len);
            }
            field_lengths.insert(ordinal, lengths);
        }

        let term_count = reader.read_varint()? as usize;
        let mut terms = BTreeMap::new();
        for _ in 0..term_count {
            let field = reader.read_string()?;
            let term = reader.read_string()?;
            let list = PostingList::decode(reader)?;
            terms.insert(TermKey::new(field, term), list);
        }

        Ok(TermDictionary {
            terms,
            field_stats,
            field_lengths,
            generation,
        })
    }
}
