//! Telemetry and tracing utilities
//!
//! This module provides utilities for initializing and configuring tracing subscribers
//! for the figura crates.
//!
//! ## Example
//!
//! ```rust,ignore
//! use figura_extras::telemetry::{init_subscriber, SubscriberConfig, OutputFormat};
//!
//! // Initialize with default configuration
//! let _guard = init_subscriber(SubscriberConfig::default())?;
//!
//! // Initialize with custom configuration
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! let _guard = init_subscriber(config)?;
//! ```

use std::path::{Path, PathBuf};

use crate::error::{ExtrasError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Crates whose events pass the filter.
const FIGURA_TARGETS: [&str; 3] = ["figura", "figura_core", "figura_extras"];

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON lines with span context
    Json,
    /// JSON lines with event fields flattened and no span context
    JsonCompact,
}

impl OutputFormat {
    /// Parse `text`, `json` or `json-compact`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "json-compact" => Ok(Self::JsonCompact),
            _ => Err(ExtrasError::TelemetryInit(format!(
                "Invalid log format: {value}. Valid options: text, json, json-compact"
            ))),
        }
    }
}

/// Configuration for tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Log level
    pub log_level: tracing::Level,
    /// Output format
    pub output_format: OutputFormat,
    /// Enable console (stderr) output
    pub enable_console: bool,
    /// Log file path; takes precedence over the console when set
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            enable_console: true,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    /// Create a new builder for SubscriberConfig
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// Create a debug configuration
    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Create a production configuration
    pub fn production(log_file: PathBuf) -> Self {
        Self {
            log_level: tracing::Level::WARN,
            output_format: OutputFormat::Json,
            enable_console: false,
            log_file: Some(log_file),
        }
    }

    /// Read `FIGURA_LOG_LEVEL`, `FIGURA_LOG_FORMAT` and `FIGURA_LOG_FILE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(level) = lookup("FIGURA_LOG_LEVEL") {
            builder = builder.log_level_str(&level)?;
        }
        if let Some(format) = lookup("FIGURA_LOG_FORMAT") {
            builder = builder.output_format(OutputFormat::parse(&format)?);
        }
        if let Some(file_path) = lookup("FIGURA_LOG_FILE")
            && !file_path.trim().is_empty()
        {
            builder = builder.log_file(PathBuf::from(file_path));
        }
        Ok(builder.build())
    }

    /// `EnvFilter` directive restricting output to the figura crates.
    pub fn filter_directive(&self) -> String {
        let level = level_str(self.log_level);
        FIGURA_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Builder for SubscriberConfig
#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    enable_console: Option<bool>,
    log_file: Option<PathBuf>,
}

impl SubscriberConfigBuilder {
    /// Set the log level
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level from a string
    pub fn log_level_str(mut self, level: &str) -> Result<Self> {
        let level = match level.trim().to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(ExtrasError::TelemetryInit(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(level);
        Ok(self)
    }

    /// Set the output format
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Enable or disable console output
    pub fn enable_console(mut self, enable: bool) -> Self {
        self.enable_console = Some(enable);
        self
    }

    /// Set the log file path
    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    /// Build the configuration
    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            enable_console: self.enable_console.unwrap_or(true),
            log_file: self.log_file,
        }
    }
}

fn level_str(level: tracing::Level) -> &'static str {
    match level {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    }
}

fn file_writer(path: &Path) -> Result<(BoxMakeWriter, WorkerGuard)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            ExtrasError::TelemetryInit(format!("Invalid log file path: {}", path.display()))
        })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| ExtrasError::TelemetryInit(format!("Failed to open log file: {e}")))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(writer), guard))
}

/// Initialize tracing subscriber with the given configuration
///
/// ## Returns
///
/// - `Ok(Some(WorkerGuard))` when logging to a file. The guard must be kept alive
///   for the duration of the program or buffered lines are lost.
/// - `Ok(None)` for console output, when output is disabled entirely, or when a
///   global subscriber was already installed.
/// - `Err(ExtrasError::TelemetryInit)` if initialization fails
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>> {
    let (writer, guard, ansi) = match &config.log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (writer, Some(guard), false)
        }
        None if config.enable_console => (BoxMakeWriter::new(std::io::stderr), None, true),
        None => return Ok(None),
    };

    let filter = config.filter_directive();

    // Apply output format
    let init_result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init(),
    };

    // Handle the case where tracing is already initialized
    match init_result {
        Ok(()) => Ok(guard),
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("global default trace dispatcher has already been set") {
                Ok(None)
            } else {
                Err(ExtrasError::TelemetryInit(format!(
                    "Failed to initialize tracing: {e}"
                )))
            }
        }
    }
}

/// Initialize tracing subscriber with default configuration
pub fn init_default() -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::default())
}

/// Initialize tracing subscriber for debugging
pub fn init_debug() -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::debug())
}

/// Initialize tracing subscriber for production
pub fn init_production(log_file: PathBuf) -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::production(log_file))
}

/// Initialize tracing subscriber from environment variables
///
/// Supported environment variables:
/// - `FIGURA_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
/// - `FIGURA_LOG_FORMAT`: Output format (text, json, json-compact)
/// - `FIGURA_LOG_FILE`: Log file path
pub fn init_from_env() -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::from_env()?)
}
