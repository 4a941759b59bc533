//! Crate configuration.
//!
//! Typed settings with serde defaults, merged by [`loader`] from built-in
//! defaults, an optional TOML file and `NAVCACHE`-prefixed environment
//! variables.

pub mod loader;

pub use loader::ConfigLoader;

use crate::job::FailurePolicy;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default watermark: hand accumulated work to a background job once peak
/// memory has grown this much. Kept low so each queued chunk stays
/// manageable even on small hosts.
pub const DEFAULT_CHUNK_WATERMARK: u64 = 50 * 1024 * 1024;

/// Tuning for rebuild passes and chunk jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildConfig {
    /// Peak-memory growth, in bytes, at which the scheduler starts a new
    /// chunk.
    #[serde(default = "default_chunk_watermark")]
    pub chunk_watermark_bytes: u64,

    /// Safety margin subtracted from the platform ceiling before a job
    /// aborts, in bytes.
    #[serde(default = "default_critical_buffer")]
    pub critical_buffer_bytes: u64,

    /// Platform memory ceiling as a human-readable size ("256M", "1G").
    /// "-1" means unlimited and disables the in-job abort check.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,

    /// Whether an individual persist failure aborts a whole chunk.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_chunk_watermark() -> u64 {
    DEFAULT_CHUNK_WATERMARK
}

fn default_critical_buffer() -> u64 {
    crate::job::CRITICAL_MEMORY_BUFFER
}

fn default_memory_limit() -> String {
    "-1".to_string()
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            chunk_watermark_bytes: default_chunk_watermark(),
            critical_buffer_bytes: default_critical_buffer(),
            memory_limit: default_memory_limit(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Storage backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for the sled database. `None` resolves to the platform
    /// data directory at startup.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Top-level crate settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavcacheConfig {
    #[serde(default)]
    pub rebuild: RebuildConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
