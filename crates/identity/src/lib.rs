//! Content-addressed identity for chunked file transfers.
//!
//! A file is split into fixed-size chunks, each chunk is hashed with
//! SHA-256, and the file id is the SHA-256 over the concatenation of the
//! raw chunk digests in order. The same bytes at the same chunk size
//! always produce the same identity, across processes and machines.

mod hasher;

pub use hasher::{FileIdentity, IdentityHasher, identity_from_reader};

/// Number of chunks a file of `file_size` bytes occupies at `chunk_size`.
///
/// Always at least 1: a zero-byte file still carries a single empty chunk
/// so it has a well-defined identity. `chunk_size` must be non-zero.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> u32 {
    file_size.div_ceil(chunk_size).max(1) as u32
}
