//! Configuration types.

use std::path::PathBuf;

use prelog_audit_types::LineFormat;
use serde::{Deserialize, Serialize};

use crate::loader::ConfigError;

/// Log directory relative to the home directory.
pub const DEFAULT_LOG_SUBDIR: &str = ".local/share/prelog";

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Master switch. A disabled shim only forwards calls.
    pub enabled: bool,
    /// Profile root. Without it no log can be written.
    pub home: Option<PathBuf>,
    /// Log directory; derived from `home` when unset. Ignored without `home`.
    pub log_dir: Option<PathBuf>,
    /// Lowest effective uid that gets audited.
    pub uid_floor: u32,
    /// Temporary directory roots for the interest filter.
    pub temp_dirs: Vec<PathBuf>,
    /// Upper bound on command line bytes read.
    pub cmdline_limit: usize,
    /// Event line encoding.
    pub line_format: LineFormat,
    /// gzip level, 0..=9.
    pub compression_level: u32,
    /// Sync-flush the compressed stream after every line.
    pub sync_flush: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            home: None,
            log_dir: None,
            uid_floor: 1000,
            temp_dirs: vec![PathBuf::from("/tmp")],
            cmdline_limit: 4096,
            line_format: LineFormat::Pipe,
            compression_level: 6,
            sync_flush: true,
        }
    }
}

impl ShimConfig {
    /// The effective log directory. Without a profile root there is none,
    /// even when `log_dir` is set.
    pub fn resolved_log_dir(&self) -> Option<PathBuf> {
        let home = self.home.as_ref()?;
        Some(
            self.log_dir
                .clone()
                .unwrap_or_else(|| home.join(DEFAULT_LOG_SUBDIR)),
        )
    }

    /// Check values a config file could get wrong.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_level > 9 {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "compression_level must be between 0 and 9, got {}",
                    self.compression_level
                ),
            });
        }
        if self.cmdline_limit == 0 {
            return Err(ConfigError::ValidationError {
                message: "cmdline_limit must be greater than 0".to_string(),
            });
        }
        if let Some(dir) = self.log_dir.as_ref().filter(|d| !d.is_absolute()) {
            return Err(ConfigError::ValidationError {
                message: format!("log_dir must be absolute: {}", dir.display()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShimConfig::default();
        assert!(config.enabled);
        assert_eq!(config.uid_floor, 1000);
        assert_eq!(config.temp_dirs, vec![PathBuf::from("/tmp")]);
        assert_eq!(config.cmdline_limit, 4096);
        assert_eq!(config.line_format, LineFormat::Pipe);
        assert_eq!(config.compression_level, 6);
        assert!(config.sync_flush);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_dir_derived_from_home() {
        let mut config = ShimConfig::default();
        assert_eq!(config.resolved_log_dir(), None);

        config.log_dir = Some(PathBuf::from("/var/log/prelog"));
        assert_eq!(config.resolved_log_dir(), None);

        config.log_dir = None;
        config.home = Some(PathBuf::from("/home/u"));
        assert_eq!(
            config.resolved_log_dir(),
            Some(PathBuf::from("/home/u/.local/share/prelog"))
        );

        config.log_dir = Some(PathBuf::from("/var/log/prelog"));
        assert_eq!(config.resolved_log_dir(), Some(PathBuf::from("/var/log/prelog")));
    }

    #[test]
    fn test_partial_yaml_merges_with_defaults() {
        let yaml = r#"
uid_floor: 500
line_format: json
"#;
        let config: ShimConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.uid_floor, 500);
        assert_eq!(config.line_format, LineFormat::Json);
        assert_eq!(config.compression_level, 6);
        assert!(config.enabled);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = ShimConfig {
            compression_level: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ShimConfig {
            cmdline_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ShimConfig {
            log_dir: Some(PathBuf::from("relative/logs")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
