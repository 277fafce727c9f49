//! Logging Module
//!
//! Installs the global `tracing` subscriber for the CLI and the server.
//! `RUST_LOG`, when set, replaces the configured level.
//!
//! The configuration deserializes from a `[logging]` table:
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

/// Crates whose events follow the configured level
const CRATE_TARGETS: [&str; 2] = ["crop_disease", "crop_disease_server"];

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for this project's crates
    pub level: LogLevel,
    /// Level for everything else (burn, hyper, tower-http, ...)
    pub dependency_level: LogLevel,
    pub format: LogFormat,
    /// Whether to include target (module path)
    pub include_target: bool,
    pub include_thread_ids: bool,
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            dependency_level: LogLevel::Warn,
            format: LogFormat::Compact,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug output for this project, with targets and thread ids
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            dependency_level: LogLevel::Info,
            include_target: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// Server defaults: request traces from tower-http, no ANSI escapes
    pub fn server() -> Self {
        Self {
            dependency_level: LogLevel::Info,
            include_target: true,
            ansi_colors: false,
            ..Self::default()
        }
    }

    /// Filter directive string, e.g. `warn,crop_disease=info,crop_disease_server=info`
    pub fn directives(&self) -> String {
        let mut directives = vec![self.dependency_level.as_directive().to_string()];
        directives.extend(
            CRATE_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, self.level.as_directive())),
        );
        directives.join(",")
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
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

    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tracing_level())
    }
}

/// Install the global subscriber.
///
/// Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_fmt::layer()
                    .json()
                    .with_target(config.include_target)
                    .with_thread_ids(config.include_thread_ids),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_fmt::layer()
                    .compact()
                    .with_ansi(config.ansi_colors)
                    .with_target(config.include_target)
                    .with_thread_ids(config.include_thread_ids),
            )
            .try_init(),
    };

    result.map_err(|e| format!("Failed to initialize logging: {}", e))
}
