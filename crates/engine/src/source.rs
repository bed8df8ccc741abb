//! Byte providers for upload tasks.

use std::fs::File;
use std::future::Future;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// A payload readable by absolute byte range.
///
/// The worker pool reads several ranges concurrently and holds at most one
/// chunk of data per worker, so implementations must not share seek state
/// between calls.
pub trait ChunkSource: Send + Sync {
    /// Display name of the payload, e.g. a file name.
    fn name(&self) -> &str;

    /// Total payload size in bytes.
    fn size(&self) -> u64;

    /// Reads exactly the bytes in `range`.
    fn read_range(
        &self,
        range: Range<u64>,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>>;
}

/// Chunk source backed by a file on disk.
///
/// Each read opens its own handle, so concurrent reads never contend on a
/// shared cursor. The file must not change while a transfer is running.
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
}

impl FileSource {
    /// Captures the file's name and current size.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        Ok(Self {
            path,
            name,
            size: meta.len(),
        })
    }
}

impl ChunkSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(
        &self,
        range: Range<u64>,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>> {
        let path = self.path.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let mut file = File::open(&path)?;
                file.seek(SeekFrom::Start(range.start))?;
                let mut buf = vec![0u8; range.end.saturating_sub(range.start) as usize];
                file.read_exact(&mut buf)?;
                Ok(buf)
            })
            .await
            .map_err(|e| io::Error::other(format!("task join error: {e}")))?
        })
    }
}

/// In-memory chunk source, mainly for tests and small payloads.
pub struct MemorySource {
    name: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl ChunkSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_range(
        &self,
        range: Range<u64>,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let slice = self
                .bytes
                .get(range.start as usize..range.end as usize)
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "range outside payload")
                })?;
            Ok(slice.to_vec())
        })
    }
}
