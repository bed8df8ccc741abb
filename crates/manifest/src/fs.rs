use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::DEFAULT_PREFIX;
use crate::record::TransferManifest;
use crate::store::{ManifestError, ManifestStore};

/// Durable manifest store: one JSON file per logical key.
///
/// Records live under `root`, named by the SHA-256 of their logical key
/// (`"<prefix>:manifest:<adapter>|<file_id>"`) so arbitrary adapter names
/// and ids stay filesystem-safe. Writes go to a temp file, are synced,
/// then renamed into place, so a crash never leaves a half-written record.
pub struct FsManifestStore {
    root: PathBuf,
    prefix: String,
}

impl FsManifestStore {
    /// Opens a store rooted at `root` with the default key prefix,
    /// creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        Self::with_prefix(root, DEFAULT_PREFIX).await
    }

    /// Opens a store with a custom key prefix. Two stores on the same
    /// directory with different prefixes never see each other's records.
    pub async fn with_prefix(
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Result<Self, ManifestError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            prefix: prefix.into(),
        })
    }

    /// Full logical key a manifest is stored under.
    fn logical_key(&self, adapter: &str, file_id: &str) -> String {
        format!(
            "{}:manifest:{}",
            self.prefix,
            TransferManifest::storage_key(adapter, file_id)
        )
    }

    fn record_path(&self, adapter: &str, file_id: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(self.logical_key(adapter, file_id).as_bytes());
        self.root
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }
}

impl ManifestStore for FsManifestStore {
    fn load(
        &self,
        adapter: &str,
        file_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TransferManifest>, ManifestError>> + Send + '_>>
    {
        let path = self.record_path(adapter, file_id);
        Box::pin(async move {
            let contents = match fs::read(&path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let manifest: TransferManifest = serde_json::from_slice(&contents)?;
            Ok(Some(manifest))
        })
    }

    fn save<'a>(
        &'a self,
        manifest: &'a mut TransferManifest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + 'a>> {
        // Reconstruct the path from the stored key rather than taking
        // adapter/file_id again; the key is authoritative.
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:manifest:{}", self.prefix, manifest.key).as_bytes());
        let path = self
            .root
            .join(format!("{}.json", hex::encode(hasher.finalize())));

        Box::pin(async move {
            manifest.updated_at = Utc::now();
            let json = serde_json::to_string_pretty(manifest)?;

            let temp_path = path.with_extension("tmp");
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &path).await?;

            debug!(key = %manifest.key, path = %path.display(), "saved manifest");
            Ok(())
        })
    }

    fn remove(
        &self,
        adapter: &str,
        file_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ManifestError>> + Send + '_>> {
        let path = self.record_path(adapter, file_id);
        Box::pin(async move {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed manifest");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}
