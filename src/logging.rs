//! Logging setup.
//!
//! Structured logging via `tracing`, configured from [`LoggingConfig`] with
//! `NAVCACHE_LOG`-family environment variables taking precedence.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("logging configuration error: {0}")]
    Config(String),
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format: json, text (default: text).
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file.
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is `file`; None means the platform state
    /// directory.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored output (text format, terminal destinations only).
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Resolve the log file path: explicit config first, `NAVCACHE_LOG_FILE`
/// env second, platform state directory last.
pub fn resolve_log_file_path(config_file: Option<PathBuf>) -> Result<PathBuf, LoggingError> {
    if let Ok(env_path) = std::env::var("NAVCACHE_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }

    let project_dirs = directories::ProjectDirs::from("", "navcache", "navcache")
        .ok_or_else(|| {
            LoggingError::Config("could not determine platform state directory".to_string())
        })?;
    let state_dir = project_dirs
        .state_dir()
        .or_else(|| Some(project_dirs.cache_dir()))
        .ok_or_else(|| LoggingError::Config("platform state directory unavailable".to_string()))?;
    Ok(state_dir.join("navcache.log"))
}

/// Initialize the logging system.
///
/// Precedence, highest first: `NAVCACHE_LOG`/`NAVCACHE_LOG_FORMAT`
/// environment variables, the passed configuration, built-in defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), LoggingError> {
    if config.map(|c| !c.enabled).unwrap_or(false) {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true);
    let output = config.map(|c| c.output.as_str()).unwrap_or("stderr");

    let base = Registry::default().with(filter);
    match (format.as_str(), output) {
        ("json", "file") => {
            let writer = open_log_file(config)?;
            base.with(json_layer().with_writer(writer)).init();
        }
        ("json", "stdout") => {
            base.with(json_layer().with_writer(std::io::stdout)).init();
        }
        ("json", _) => {
            base.with(json_layer().with_writer(std::io::stderr)).init();
        }
        (_, "file") => {
            let writer = open_log_file(config)?;
            base.with(text_layer(false).with_writer(writer)).init();
        }
        (_, "stdout") => {
            base.with(text_layer(use_color).with_writer(std::io::stdout))
                .init();
        }
        _ => {
            base.with(text_layer(use_color).with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

type JsonLayer = fmt::Layer<
    tracing_subscriber::layer::Layered<EnvFilter, Registry>,
    fmt::format::JsonFields,
    fmt::format::Format<fmt::format::Json, ChronoUtc>,
>;

type TextLayer = fmt::Layer<
    tracing_subscriber::layer::Layered<EnvFilter, Registry>,
    fmt::format::DefaultFields,
    fmt::format::Format<fmt::format::Full, ChronoUtc>,
>;

fn json_layer() -> JsonLayer {
    fmt::layer()
        .json()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
}

fn text_layer(use_color: bool) -> TextLayer {
    fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(use_color)
}

fn open_log_file(config: Option<&LoggingConfig>) -> Result<std::fs::File, LoggingError> {
    let path = resolve_log_file_path(config.and_then(|c| c.file.clone()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| LoggingError::Config(format!("failed to create log directory: {e}")))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| LoggingError::Config(format!("failed to open log file {path:?}: {e}")))
}

/// Build the environment filter from config or `NAVCACHE_LOG`.
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_env("NAVCACHE_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    let mut filter = EnvFilter::new(level);

    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{module}={module_level}");
            filter = filter.add_directive(directive.parse().map_err(|e| {
                LoggingError::Config(format!("invalid log directive `{directive}`: {e}"))
            })?);
        }
    }

    Ok(filter)
}

/// Determine output format from `NAVCACHE_LOG_FORMAT` or config.
fn determine_format(config: Option<&LoggingConfig>) -> Result<String, LoggingError> {
    if let Ok(format) = std::env::var("NAVCACHE_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(LoggingError::Config(format!(
            "invalid log format: {format} (must be 'json' or 'text')"
        )));
    }
    Ok(format.to_string())
}
