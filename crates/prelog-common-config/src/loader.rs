//! Configuration file loading and environment overrides.

use std::path::{Path, PathBuf};

use prelog_audit_types::LineFormat;
use thiserror::Error;
use tracing::warn;

use crate::env::{vars, EnvError, Environment};
use crate::types::ShimConfig;

/// Config file location relative to the home directory.
pub const DEFAULT_CONFIG_SUBPATH: &str = ".config/prelog/config.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Resolves a [`ShimConfig`] from defaults, file and environment.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    env: Environment,
}

impl ConfigLoader {
    /// Loader reading the process environment.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(env: Environment) -> Self {
        Self { env }
    }

    /// Resolve the configuration. Never fails: a missing or broken file
    /// yields defaults, and an unusable variable keeps the prior value.
    pub fn load(&self) -> ShimConfig {
        let config = match self.config_path() {
            Some(path) => match Self::load_file(&path) {
                Ok(config) => config,
                Err(ConfigError::NotFound { .. }) => ShimConfig::default(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring config file");
                    ShimConfig::default()
                }
            },
            None => ShimConfig::default(),
        };
        self.apply_env(config)
    }

    /// The config file to read, if any.
    pub fn config_path(&self) -> Option<PathBuf> {
        match self.env.get(vars::PRELOG_CONFIG_PATH) {
            Some(path) => Some(PathBuf::from(path)),
            None => self
                .env
                .get(vars::HOME)
                .map(|home| Path::new(&home).join(DEFAULT_CONFIG_SUBPATH)),
        }
    }

    /// Parse and validate a YAML config file.
    pub fn load_file(path: &Path) -> Result<ShimConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: ShimConfig =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Layer environment overrides on top of `config`.
    pub fn apply_env(&self, mut config: ShimConfig) -> ShimConfig {
        if let Some(home) = self.env.get(vars::HOME) {
            config.home = Some(PathBuf::from(home));
        }

        if let Some(dir) = self.env.get(vars::PRELOG_LOG_DIR) {
            let dir = PathBuf::from(dir);
            if dir.is_absolute() {
                config.log_dir = Some(dir);
            } else {
                warn!(var = vars::PRELOG_LOG_DIR, value = %dir.display(), "log directory must be absolute");
            }
        }

        if let Some(dir) = self.env.get(vars::TMPDIR) {
            let dir = PathBuf::from(dir);
            if dir.is_absolute() && !config.temp_dirs.contains(&dir) {
                config.temp_dirs.push(dir);
            }
        }

        if let Some(uid) = self.parsed(vars::PRELOG_MIN_UID) {
            config.uid_floor = uid;
        }

        match self.parsed::<usize>(vars::PRELOG_CMDLINE_MAX) {
            Some(0) => warn!(var = vars::PRELOG_CMDLINE_MAX, "limit must be positive"),
            Some(limit) => config.cmdline_limit = limit,
            None => {}
        }

        if let Some(format) = self.parsed::<LineFormat>(vars::PRELOG_LINE_FORMAT) {
            config.line_format = format;
        }

        match self.parsed::<u32>(vars::PRELOG_COMPRESSION) {
            Some(level) if level <= 9 => config.compression_level = level,
            Some(level) => warn!(var = vars::PRELOG_COMPRESSION, value = level, "level must be 0..=9"),
            None => {}
        }

        if let Some(flush) = self.flag(vars::PRELOG_SYNC_FLUSH) {
            config.sync_flush = flush;
        }

        if let Some(disable) = self.flag(vars::PRELOG_DISABLE) {
            config.enabled = !disable;
        }

        config
    }

    fn parsed<T: std::str::FromStr>(&self, var: &str) -> Option<T> {
        self.env.get_parsed(var).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring environment override");
            None
        })
    }

    fn flag(&self, var: &str) -> Option<bool> {
        self.env.get_bool(var).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring environment override");
            None
        })
    }
}
