//! Transfer and adapter error types.

use chunklift_manifest::ManifestError;

/// Errors surfaced by an [`UploadAdapter`](crate::UploadAdapter).
///
/// `Canceled` is terminal; every other variant is eligible for retry when it
/// comes out of `upload_chunk`.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("chunk transfer failed: {0}")]
    Chunk(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("canceled")]
    Canceled,
}

/// Terminal errors produced by an upload task.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Negotiation(AdapterError),

    #[error("chunk {index} failed after {attempts} attempts: {source}")]
    ChunkTransfer {
        index: u32,
        attempts: u32,
        source: AdapterError,
    },

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("canceled")]
    Canceled,
}
