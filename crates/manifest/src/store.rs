use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use chrono::Utc;

use crate::record::{NewManifest, TransferManifest};

/// Errors produced by manifest persistence.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Abstract manifest persistence.
///
/// The engine drives this through a trait object, so any store works:
/// the bundled [`FsManifestStore`](crate::FsManifestStore) and
/// [`MemoryManifestStore`], or a host-provided one. Implementations
/// supply `load`/`save`/`remove`; the idempotent record-keeping
/// operations are provided on top of those.
pub trait ManifestStore: Send + Sync {
    /// Loads the manifest for `(adapter, file_id)`, if one was ever saved.
    fn load(
        &self,
        adapter: &str,
        file_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TransferManifest>, ManifestError>> + Send + '_>>;

    /// Persists the full record, stamping `updated_at`.
    ///
    /// Overwrites any previous record under the same key.
    fn save<'a>(
        &'a self,
        manifest: &'a mut TransferManifest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + 'a>>;

    /// Removes the record for `(adapter, file_id)`. Missing records are
    /// not an error.
    fn remove(
        &self,
        adapter: &str,
        file_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + '_>>;

    /// Returns the existing manifest for the key, or creates, saves and
    /// returns a fresh one. Calling twice with the same key never
    /// overwrites the first record.
    fn put<'a>(
        &'a self,
        adapter: &'a str,
        file_id: &'a str,
        init: NewManifest,
    ) -> Pin<Box<dyn Future<Output = Result<TransferManifest, ManifestError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(existing) = self.load(adapter, file_id).await? {
                return Ok(existing);
            }
            let mut manifest = TransferManifest::new(adapter, file_id, init);
            self.save(&mut manifest).await?;
            Ok(manifest)
        })
    }

    /// Records one acknowledged chunk on the persisted manifest.
    ///
    /// Idempotent: recording an index twice leaves the record unchanged
    /// apart from `updated_at`. A missing manifest is a no-op.
    fn record_chunk_uploaded<'a>(
        &'a self,
        adapter: &'a str,
        file_id: &'a str,
        index: u32,
        tag: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + 'a>> {
        Box::pin(async move {
            let Some(mut manifest) = self.load(adapter, file_id).await? else {
                return Ok(());
            };
            manifest.record_uploaded(index, tag.map(str::to_owned));
            self.save(&mut manifest).await
        })
    }

    /// Marks the persisted manifest completed, storing the final URL.
    /// A missing manifest is a no-op.
    fn mark_completed<'a>(
        &'a self,
        adapter: &'a str,
        file_id: &'a str,
        url: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + 'a>> {
        Box::pin(async move {
            let Some(mut manifest) = self.load(adapter, file_id).await? else {
                return Ok(());
            };
            manifest.set_completed(url.map(str::to_owned));
            self.save(&mut manifest).await
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryManifestStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and hosts that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryManifestStore {
    records: Mutex<HashMap<String, TransferManifest>>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ManifestStore for MemoryManifestStore {
    fn load(
        &self,
        adapter: &str,
        file_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TransferManifest>, ManifestError>> + Send + '_>>
    {
        let key = TransferManifest::storage_key(adapter, file_id);
        Box::pin(async move { Ok(self.records.lock().unwrap().get(&key).cloned()) })
    }

    fn save<'a>(
        &'a self,
        manifest: &'a mut TransferManifest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + 'a>> {
        Box::pin(async move {
            manifest.updated_at = Utc::now();
            self.records
                .lock()
                .unwrap()
                .insert(manifest.key.clone(), manifest.clone());
            Ok(())
        })
    }

    fn remove(
        &self,
        adapter: &str,
        file_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + '_>> {
        let key = TransferManifest::storage_key(adapter, file_id);
        Box::pin(async move {
            self.records.lock().unwrap().remove(&key);
            Ok(())
        })
    }
}
