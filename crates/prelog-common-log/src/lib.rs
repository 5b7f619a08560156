//! Diagnostic logging for prelog.
//!
//! The shim lives inside other programs, so diagnostics never go to their
//! stdout or stderr. Output is written to a file named by
//! `PRELOG_DIAG_FILE`; without one, no subscriber is installed and every
//! `tracing` macro is a no-op.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use prelog_common_config::{vars, Environment};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Diagnostic file. `None` disables diagnostics.
    pub file_path: Option<PathBuf>,
    /// Include source location.
    pub source_location: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
            LogLevel::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            LogLevel::Info => tracing_subscriber::filter::LevelFilter::INFO,
            LogLevel::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            LogLevel::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        }
    }
}

impl LogLevel {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-oriented format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
    /// JSON structured format.
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            file_path: None,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Create config from the process environment.
    pub fn from_env() -> Self {
        Self::from_environment(&Environment::system())
    }

    /// Create config from `PRELOG_DIAG_*` variables. Unknown values keep
    /// the defaults.
    pub fn from_environment(env: &Environment) -> Self {
        let mut config = Self::default();

        if let Some(level) = env.get(vars::PRELOG_DIAG_LEVEL).and_then(|l| LogLevel::parse(&l)) {
            config.level = level;
        }

        if let Some(format) = env
            .get(vars::PRELOG_DIAG_FORMAT)
            .and_then(|f| f.parse::<LogFormat>().ok())
        {
            config.format = format;
        }

        config.file_path = env.get(vars::PRELOG_DIAG_FILE).map(PathBuf::from);
        config.source_location = config.level == LogLevel::Trace;

        config
    }
}

/// Install the diagnostic subscriber for this configuration.
///
/// Returns `Ok(false)` when no diagnostic file is configured.
pub fn init(config: &LogConfig) -> Result<bool, LogError> {
    let Some(file_path) = &config.file_path else {
        return Ok(false);
    };

    let filter = EnvFilter::try_new(config.level.as_str())
        .map_err(|e| LogError::InitError(e.to_string()))?;

    let file = Arc::new(
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?,
    );

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_file(config.source_location)
                .with_line_number(config.source_location);

            registry
                .with(layer)
                .try_init()
                .map_err(|e| LogError::InitError(e.to_string()))?;
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_file(config.source_location)
                .with_line_number(config.source_location);

            registry
                .with(layer)
                .try_init()
                .map_err(|e| LogError::InitError(e.to_string()))?;
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(file)
                .with_file(config.source_location)
                .with_line_number(config.source_location);

            registry
                .with(layer)
                .try_init()
                .map_err(|e| LogError::InitError(e.to_string()))?;
        }
    }

    Ok(true)
}

/// Install diagnostics from the environment at most once per process.
///
/// Failures are swallowed: a host process must never notice that
/// diagnostics could not be set up.
pub fn init_once() -> bool {
    *INSTALLED.get_or_init(|| init(&LogConfig::from_env()).unwrap_or(false))
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    #[error("failed to open log file: {0}")]
    FileError(#[from] io::Error),
}

/// Convenience macros re-exported from tracing.
pub use tracing::{debug, error, info, trace, warn};

/// Span helpers for the audit path.
pub mod spans;
