use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Initial fields for a manifest that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewManifest {
    pub name: String,
    pub size: u64,
    pub chunk_size: u64,
    pub chunk_count: u32,
}

/// Durable record of one transfer's progress.
///
/// One manifest exists per `(adapter, file_id)` pair. It is created on the
/// first start for that pair, updated on every acknowledged chunk and on
/// finalize, and never deleted automatically — hosts purge through
/// [`ManifestStore::remove`](crate::ManifestStore::remove).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferManifest {
    /// Storage key, `"<adapter>|<file_id>"`.
    pub key: String,
    /// File name as presented to the backend.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Chunk size the identity was computed at.
    pub chunk_size: u64,
    /// Total number of chunks, at least 1.
    pub chunk_count: u32,
    /// Indices of chunks the backend has acknowledged.
    pub uploaded: BTreeSet<u32>,
    /// Backend session id from the most recent negotiation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Backend-issued tag (for example an ETag) per uploaded chunk.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub chunk_tags: BTreeMap<u32, String>,
    /// Final URL reported by the backend on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Whether the transfer finalized successfully.
    #[serde(default)]
    pub completed: bool,
    /// When the record was last persisted.
    pub updated_at: DateTime<Utc>,
}

impl TransferManifest {
    /// Builds the storage key for an `(adapter, file_id)` pair.
    pub fn storage_key(adapter: &str, file_id: &str) -> String {
        format!("{adapter}|{file_id}")
    }

    /// Creates a fresh manifest with no uploaded chunks.
    pub fn new(adapter: &str, file_id: &str, init: NewManifest) -> Self {
        Self {
            key: Self::storage_key(adapter, file_id),
            name: init.name,
            size: init.size,
            chunk_size: init.chunk_size,
            chunk_count: init.chunk_count,
            uploaded: BTreeSet::new(),
            session_id: None,
            chunk_tags: BTreeMap::new(),
            url: None,
            completed: false,
            updated_at: Utc::now(),
        }
    }

    /// Records an acknowledged chunk. Returns `true` if the index was new.
    ///
    /// Recording the same index twice leaves the uploaded set unchanged.
    pub fn record_uploaded(&mut self, index: u32, tag: Option<String>) -> bool {
        if let Some(tag) = tag {
            self.chunk_tags.insert(index, tag);
        }
        self.uploaded.insert(index)
    }

    /// Merges acknowledged indices reported by the backend during
    /// negotiation (it may know about chunks from a previous process).
    pub fn merge_uploaded<I: IntoIterator<Item = u32>>(&mut self, indices: I) {
        self.uploaded.extend(indices);
    }

    /// Number of acknowledged chunks.
    pub fn uploaded_count(&self) -> u32 {
        self.uploaded.len() as u32
    }

    /// Whether every chunk has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.uploaded_count() >= self.chunk_count
    }

    /// Marks the transfer finalized, storing the backend URL if any.
    pub fn set_completed(&mut self, url: Option<String>) {
        self.completed = true;
        if url.is_some() {
            self.url = url;
        }
    }
}
