//! Index metadata: status, settings, and field mappings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FalxError, Result};

/// Lifecycle state of an index.
///
/// `Creating` and `Deleting` are transitional; `Deleting` is terminal and
/// the metadata disappears once deletion completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Creating,
    Open,
    Closed,
    Deleting,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Creating => "creating",
            IndexStatus::Open => "open",
            IndexStatus::Closed => "closed",
            IndexStatus::Deleting => "deleting",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "creating" => Ok(IndexStatus::Creating),
            "open" => Ok(IndexStatus::Open),
            "closed" => Ok(IndexStatus::Closed),
            "deleting" => Ok(IndexStatus::Deleting),
            other => Err(FalxError::validation(format!(
                "unknown index status '{other}'"
            ))),
        }
    }
}

/// Index-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexSettings {
    pub shards: u32,
    pub refresh_interval: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            shards: 1,
            refresh_interval: "1s".to_string(),
        }
    }
}

impl IndexSettings {
    /// Apply a partial update, keeping fields the patch does not mention.
    pub fn apply(&mut self, patch: &IndexSettingsPatch) {
        if let Some(shards) = patch.shards {
            self.shards = shards;
        }
        if let Some(refresh_interval) = &patch.refresh_interval {
            self.refresh_interval = refresh_interval.clone();
        }
    }
}

/// Partial settings update as sent by clients.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexSettingsPatch {
    pub shards: Option<u32>,
    pub refresh_interval: Option<String>,
}

/// How one field is analyzed and weighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    #[serde(rename = "type")]
    pub field_type: String,
    pub analyzer: Option<String>,
    pub boost: f32,
}

impl Default for FieldMapping {
    fn default() -> Self {
        FieldMapping {
            field_type: "text".to_string(),
            analyzer: None,
            boost: 1.0,
        }
    }
}

impl FieldMapping {
    /// Whether values of this field are indexed as one untokenized term.
    pub fn is_keyword(&self) -> bool {
        self.field_type == "keyword" || self.analyzer.as_deref() == Some("keyword")
    }
}

/// Field name to mapping, in the `{"properties": {...}}` wire shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexMappings {
    pub properties: BTreeMap<String, FieldMapping>,
}

impl IndexMappings {
    /// Merge another mapping set in, field by field. Existing fields the
    /// other set does not mention are kept.
    pub fn merge(&mut self, other: IndexMappings) {
        for (field, mapping) in other.properties {
            self.properties.insert(field, mapping);
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.properties.get(name)
    }

    /// Indexing boost for a field, 1.0 when unmapped.
    pub fn boost(&self, name: &str) -> f32 {
        self.field(name).map(|m| m.boost).unwrap_or(1.0)
    }
}

/// Persistent description of one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub name: String,
    pub status: IndexStatus,
    pub settings: IndexSettings,
    pub mappings: IndexMappings,
    pub doc_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexMetadata {
    pub fn new(name: &str, settings: IndexSettings, mappings: IndexMappings) -> Self {
        let now = Utc::now();
        IndexMetadata {
            name: name.to_string(),
            status: IndexStatus::Creating,
            settings,
            mappings,
            doc_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Index names are lowercase alphanumeric with `-` and `_`.
pub fn validate_index_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FalxError::validation("index name must not be empty"));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !valid {
        return Err(FalxError::validation(format!(
            "invalid index name '{name}': only lowercase alphanumeric, '-' and '_' are allowed"
        )));
    }
    Ok(())
}

pub(crate) fn metadata_file(index: &str) -> String {
    format!("meta-{index}.bin")
}

pub(crate) fn documents_file(index: &str) -> String {
    format!("docs-{index}.bin")
}

pub(crate) fn postings_file(index: &str) -> String {
    format!("postings-{index}.fxps")
}

/// The index name a metadata file belongs to, if it is one.
pub(crate) fn index_of_metadata_file(file: &str) -> Option<&str> {
    file.strip_prefix("meta-")?.strip_suffix(".bin")
}
