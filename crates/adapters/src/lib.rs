//! Backend adapters for the upload engine.
//!
//! Two reqwest-backed implementations of
//! [`UploadAdapter`](chunklift_engine::UploadAdapter):
//!
//! - [`HttpMultipartAdapter`] talks to a chunk-aware HTTP backend that
//!   receives chunks on its own endpoints.
//! - [`S3MultipartAdapter`] talks to a broker that hands out presigned
//!   URLs, so chunk bytes go straight to object storage.
//!
//! Both race in-flight requests against the transfer's cancellation
//! token and report rejected chunks as soft failures, leaving the
//! retry schedule to the engine.

pub mod http_multipart;
pub mod s3_multipart;

mod payload;
#[cfg(test)]
pub(crate) mod testutil;

pub use http_multipart::HttpMultipartAdapter;
pub use s3_multipart::S3MultipartAdapter;
