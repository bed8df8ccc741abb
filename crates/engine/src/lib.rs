//! Resumable chunked upload engine.
//!
//! This crate implements the **transfer logic** for moving large payloads
//! to a remote backend in fixed-size chunks. It carries no wire format of
//! its own: hosts provide an `UploadAdapter` for their backend protocol
//! and a `ManifestStore` for durable progress.
//!
//! # Pipeline
//!
//! 1. **Hash** — derive a content-addressed file id, one chunk at a time
//! 2. **Prepare** — negotiate an upload session with the backend
//! 3. **Upload** — send outstanding chunks through a bounded worker pool,
//!    with retry, pause and cancellation
//! 4. **Finalize** — assemble the object and mark the manifest completed
//!
//! A transfer interrupted at any point resumes from the manifest: chunks
//! acknowledged earlier are never sent again.

pub mod adapter;
pub mod backoff;
pub mod config;
pub mod error;
pub mod events;
pub mod source;
pub mod task;

// Re-export primary types for convenience.
pub use adapter::{
    ChunkContext, ChunkOutcome, FinalizeContext, FinalizeOutcome, PartTag, PrepareContext,
    PrepareOutcome, UploadAdapter,
};
pub use backoff::{backoff_delay, chunk_span, pending_indices};
pub use chunklift_identity::FileIdentity;
pub use config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY, RetryPolicy,
    UploaderConfig,
};
pub use error::{AdapterError, TransferError};
pub use events::{TransferEvent, TransferPhase};
pub use source::{ChunkSource, FileSource, MemorySource};
pub use task::UploadTask;
