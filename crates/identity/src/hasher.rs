use std::io::Read;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identity of a file's content at a given chunk size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIdentity {
    /// SHA-256 over the concatenated raw chunk digests, hex-encoded.
    pub file_id: String,
    /// Hex-encoded SHA-256 digest of each chunk, in chunk order.
    pub chunk_hashes: Vec<String>,
}

impl FileIdentity {
    /// Number of chunks this identity covers.
    pub fn chunk_count(&self) -> u32 {
        self.chunk_hashes.len() as u32
    }
}

// ---------------------------------------------------------------------------
// IdentityHasher
// ---------------------------------------------------------------------------

/// Incremental identity builder.
///
/// Feed chunks in order with [`update_chunk`](Self::update_chunk), then call
/// [`finish`](Self::finish). Holds one 32-byte digest per chunk, never the
/// chunk bodies themselves.
#[derive(Debug, Default)]
pub struct IdentityHasher {
    digests: Vec<[u8; 32]>,
}

impl IdentityHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes one chunk and appends its digest.
    pub fn update_chunk(&mut self, chunk: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(chunk);
        self.digests.push(hasher.finalize().into());
    }

    /// Number of chunks hashed so far.
    pub fn chunks_hashed(&self) -> u32 {
        self.digests.len() as u32
    }

    /// Finishes the identity: the file id is the SHA-256 over all chunk
    /// digests concatenated in order.
    pub fn finish(self) -> FileIdentity {
        let mut outer = Sha256::new();
        for digest in &self.digests {
            outer.update(digest);
        }
        FileIdentity {
            file_id: hex::encode(outer.finalize()),
            chunk_hashes: self.digests.iter().map(hex::encode).collect(),
        }
    }
}

/// Computes the identity of `reader`'s content windowed at `chunk_size`.
///
/// Reads exactly `file_size` bytes; the final window may be shorter than
/// `chunk_size`. A zero-byte input yields exactly one empty-chunk digest.
/// `chunk_size` must be non-zero.
pub fn identity_from_reader<R: Read>(
    mut reader: R,
    file_size: u64,
    chunk_size: u64,
) -> std::io::Result<FileIdentity> {
    let mut hasher = IdentityHasher::new();
    if file_size == 0 {
        hasher.update_chunk(&[]);
        return Ok(hasher.finish());
    }

    let mut buf = vec![0u8; chunk_size as usize];
    let mut remaining = file_size;
    while remaining > 0 {
        let take = remaining.min(chunk_size) as usize;
        reader.read_exact(&mut buf[..take])?;
        hasher.update_chunk(&buf[..take]);
        remaining -= take as u64;
    }
    Ok(hasher.finish())
}
