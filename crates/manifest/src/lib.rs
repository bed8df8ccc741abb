//! Durable progress records for resumable transfers.
//!
//! A [`TransferManifest`] tracks which chunks of a file a backend has
//! acknowledged, keyed by `(adapter, file_id)`. The [`ManifestStore`]
//! trait is the persistence seam: the engine takes it as a trait object,
//! so hosts can plug in the bundled stores or their own.

mod fs;
mod record;
mod store;

pub use fs::FsManifestStore;
pub use record::{NewManifest, TransferManifest};
pub use store::{ManifestError, ManifestStore, MemoryManifestStore};

/// Default namespace prefix for persisted manifests.
pub const DEFAULT_PREFIX: &str = "up:pro";
