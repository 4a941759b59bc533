//! Configuration loader: defaults -> optional file -> environment.

use super::NavcacheConfig;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with standard precedence: serde defaults
    /// (lowest), an optional `navcache.toml` in the working directory,
    /// then `NAVCACHE__`-prefixed environment variables (highest).
    pub fn load() -> Result<NavcacheConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("navcache").required(false))
            .add_source(Self::environment());
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<NavcacheConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path))
            .add_source(Self::environment());
        builder.build()?.try_deserialize()
    }

    fn environment() -> Environment {
        Environment::with_prefix("NAVCACHE")
            .separator("__")
            .try_parsing(true)
    }
}
