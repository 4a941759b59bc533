//! Error taxonomy for cache construction and the chunked-rebuild pipeline.

use crate::types::NodeId;
use thiserror::Error;

/// Faults raised by the cache-storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to encode container snapshot: {0}")]
    Encode(String),

    #[error("failed to decode container snapshot: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Faults raised while building a scope's container.
///
/// `MemoryCeiling` and `BuildFlush` are unconditionally fatal for the job or
/// pass that hits them. `ItemPersist` fatality depends on the configured
/// failure policy.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unable to cache object #{id}")]
    ItemPersist { id: NodeId },

    #[error("critical memory threshold reached in cache refresh job ({peak_bytes} bytes)")]
    MemoryCeiling { peak_bytes: u64 },

    #[error("unable to complete cache build: {0}")]
    BuildFlush(#[source] StorageError),

    #[error("cache build completed before the site config was set")]
    ConfigNotSet,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BuildError {
    /// True for errors that abort a job regardless of failure policy.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BuildError::ItemPersist { .. })
    }
}
