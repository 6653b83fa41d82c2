//! Logging configuration and initialization
//!
//! Console output is always on. A log file may additionally be requested,
//! either as a local path or as a `gs://` object. Object storage destinations
//! are written to a local temporary file first; the caller uploads that file
//! once the run has finished (see [`LoggingHandle::finish`]).
//!
//! Use structured fields rather than formatted strings:
//!
//! ```rust
//! use tracing::{info, warn};
//!
//! let uri = "gs://bucket/file.tsv";
//! info!(destination = %uri, bytes = 42, "Uploaded object");
//! warn!(attempt = 2, "Transfer failed, retrying");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gwas_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let handle = init_logging(&config)?;
//!
//!     info!("Application started");
//!     let _finished = handle.finish();
//!     Ok(())
//! }
//! ```

use crate::uri::StoragePath;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Map a repeated `-v` flag count to a level
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Where the log file, if any, ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Local(PathBuf),
    /// Buffered locally, uploaded by the caller at the end of the run
    Remote(StoragePath),
}

impl LogSink {
    /// `gs://` destinations become [`LogSink::Remote`], anything else is a local path.
    pub fn parse(value: &str) -> Result<Self> {
        if value.starts_with("gs://") {
            let path = StoragePath::parse(value)
                .with_context(|| format!("Invalid log file destination: {}", value))?;
            Ok(LogSink::Remote(path))
        } else {
            Ok(LogSink::Local(PathBuf::from(value)))
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,

    pub format: LogFormat,

    /// Optional log file: a local path or a `gs://` object
    pub log_file: Option<String>,

    /// Additional filter directives (e.g., "suppaftp=warn,aws_config=warn")
    pub filter_directives: Option<String>,

    pub include_location: bool,

    pub include_thread_ids: bool,

    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            log_file: None,
            filter_directives: None,
            include_location: false,
            include_thread_ids: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_FILE`: local path or `gs://bucket/object`
    /// - `LOG_FILTER`: additional filter directives
    /// - `LOG_INCLUDE_LOCATION`, `LOG_INCLUDE_THREAD_IDS`, `LOG_INCLUDE_TARGETS`: true/false
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.level = level.parse()?;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = format.parse()?;
        }

        if let Ok(file) = std::env::var("LOG_FILE") {
            if !file.is_empty() {
                config.log_file = Some(file);
            }
        }

        if let Ok(filter) = std::env::var("LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        if let Ok(val) = std::env::var("LOG_INCLUDE_LOCATION") {
            config.include_location = val.parse().unwrap_or(false);
        }

        if let Ok(val) = std::env::var("LOG_INCLUDE_THREAD_IDS") {
            config.include_thread_ids = val.parse().unwrap_or(false);
        }

        if let Ok(val) = std::env::var("LOG_INCLUDE_TARGETS") {
            config.include_targets = val.parse().unwrap_or(true);
        }

        Ok(config)
    }

    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    pub fn sink(&self) -> Result<Option<LogSink>> {
        self.log_file.as_deref().map(LogSink::parse).transpose()
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter =
            EnvFilter::from_default_env().add_directive(self.level.to_tracing_level().into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                filter = filter.add_directive(
                    directive
                        .trim()
                        .parse()
                        .with_context(|| format!("Failed to parse filter directive: {}", directive))?,
                );
            }
        }

        Ok(filter)
    }
}

#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_file(mut self, file: impl Into<String>) -> Self {
        self.config.log_file = Some(file.into());
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn include_location(mut self, include: bool) -> Self {
        self.config.include_location = include;
        self
    }

    pub fn include_thread_ids(mut self, include: bool) -> Self {
        self.config.include_thread_ids = include;
        self
    }

    pub fn include_targets(mut self, include: bool) -> Self {
        self.config.include_targets = include;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Keeps the file writer alive and remembers where the log file must go.
///
/// Dropping the handle flushes the file writer.
#[must_use = "dropping the handle stops file logging"]
pub struct LoggingHandle {
    guard: Option<WorkerGuard>,
    local_file: Option<PathBuf>,
    remote: Option<StoragePath>,
    temp: Option<tempfile::TempPath>,
}

impl LoggingHandle {
    /// Local file currently receiving log lines
    pub fn local_file(&self) -> Option<&Path> {
        self.local_file.as_deref()
    }

    /// Object storage destination the local file must be uploaded to
    pub fn remote(&self) -> Option<&StoragePath> {
        self.remote.as_ref()
    }

    /// Flush buffered lines and hand back the pending upload, if any.
    ///
    /// Events emitted after this call no longer reach the file.
    pub fn finish(mut self) -> Option<PendingLogUpload> {
        drop(self.guard.take());

        match (self.remote.take(), self.temp.take()) {
            (Some(destination), Some(file)) => Some(PendingLogUpload { destination, file }),
            _ => None,
        }
    }
}

/// Log contents waiting to be copied to object storage
pub struct PendingLogUpload {
    pub destination: StoragePath,
    file: tempfile::TempPath,
}

impl PendingLogUpload {
    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.file)
            .with_context(|| format!("Failed to read log file {}", self.file.display()))
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(config.include_targets)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(FmtSpan::CLOSE);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Initialize the global subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<LoggingHandle> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(config, std::io::stdout, true)];

    let mut handle = LoggingHandle {
        guard: None,
        local_file: None,
        remote: None,
        temp: None,
    };

    match config.sink()? {
        None => {},
        Some(LogSink::Local(path)) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            let (writer, guard) = tracing_appender::non_blocking(file);
            layers.push(fmt_layer(config, writer, false));
            handle.guard = Some(guard);
            handle.local_file = Some(path);
        },
        Some(LogSink::Remote(destination)) => {
            let temp = tempfile::Builder::new()
                .prefix("gwas-ingest-")
                .suffix(".log")
                .tempfile()
                .context("Failed to create temporary log file")?;
            let file = temp.reopen().context("Failed to open temporary log file")?;

            let (writer, guard) = tracing_appender::non_blocking(file);
            layers.push(fmt_layer(config, writer, false));

            let temp = temp.into_temp_path();
            handle.guard = Some(guard);
            handle.local_file = Some(temp.to_path_buf());
            handle.remote = Some(destination);
            handle.temp = Some(temp);
        },
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    Ok(handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_from_verbosity() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(5), LogLevel::Trace);
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_sink_parsing() {
        let config = LogConfig::builder().log_file("gs://bucket/logs/run.log").build();
        match config.sink().unwrap() {
            Some(LogSink::Remote(path)) => {
                assert_eq!(path.bucket(), "bucket");
                assert_eq!(path.object(), "logs/run.log");
            },
            other => panic!("unexpected sink: {:?}", other),
        }

        let config = LogConfig::builder().log_file("/tmp/run.log").build();
        assert_eq!(
            config.sink().unwrap(),
            Some(LogSink::Local(PathBuf::from("/tmp/run.log")))
        );

        assert_eq!(LogConfig::default().sink().unwrap(), None);
    }

    #[test]
    fn test_invalid_remote_sink() {
        let config = LogConfig::builder().log_file("gs://bucket/").build();
        assert!(config.sink().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::builder()
            .level(LogLevel::Debug)
            .format(LogFormat::Json)
            .filter_directives("suppaftp=warn")
            .build();

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter_directives.as_deref(), Some("suppaftp=warn"));
        assert!(config.env_filter().is_ok());
    }
}
