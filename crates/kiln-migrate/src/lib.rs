//! # kiln-migrate
//!
//! Content-addressed migration cache for Kiln.
//!
//! Assets encoded at an old schema version are upgraded by an expensive,
//! host-supplied transform. The upgraded payload is persisted under a key
//! derived from the asset identifier and the BLAKE3 hash of the raw bytes, so
//! the transform runs once per distinct content, not once per load.
//!
//! ## Directory Layout
//!
//! ```text
//! <cache_root>/
//! └── migrationCacheV1/
//!     └── {namespace}_{path_with_slashes_as_underscores}_{hexhash}.gz
//! ```
//!
//! Each entry is a gzip-compressed JSON object whose root `data_version`
//! field decides whether it is served.

pub mod hashing;
mod loader;
mod payload;
mod store;

pub use hashing::{content_hash, ContentHash};
pub use loader::{LoaderStats, PayloadTransform, VersionedAssetLoader};
pub use payload::{Payload, DATA_VERSION_KEY, LEGACY_DATA_VERSION};
pub use store::{CacheStats, MigrationCacheStore, CACHE_DIR_NAME, CACHE_FILE_EXT};

use std::io;

use thiserror::Error;

/// Boxed error returned by a host transform
pub type TransformError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during migration cache operations
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode payload: {reason}")]
    Decode { reason: String },

    #[error("failed to encode payload: {reason}")]
    Encode { reason: String },

    #[error("transform failed: {0}")]
    Transform(#[source] TransformError),
}

pub type Result<T> = std::result::Result<T, MigrateError>;
