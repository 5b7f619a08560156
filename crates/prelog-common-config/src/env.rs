//! Environment variable handling.

use std::str::FromStr;

use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Environment variable names.
pub mod vars {
    // Profile
    pub const HOME: &str = "HOME";
    pub const TMPDIR: &str = "TMPDIR";

    // Configuration
    pub const PRELOG_CONFIG_PATH: &str = "PRELOG_CONFIG_PATH";
    pub const PRELOG_LOG_DIR: &str = "PRELOG_LOG_DIR";
    pub const PRELOG_MIN_UID: &str = "PRELOG_MIN_UID";
    pub const PRELOG_CMDLINE_MAX: &str = "PRELOG_CMDLINE_MAX";
    pub const PRELOG_LINE_FORMAT: &str = "PRELOG_LINE_FORMAT";
    pub const PRELOG_COMPRESSION: &str = "PRELOG_COMPRESSION";
    pub const PRELOG_SYNC_FLUSH: &str = "PRELOG_SYNC_FLUSH";
    pub const PRELOG_DISABLE: &str = "PRELOG_DISABLE";

    // Diagnostics
    pub const PRELOG_DIAG_FILE: &str = "PRELOG_DIAG_FILE";
    pub const PRELOG_DIAG_LEVEL: &str = "PRELOG_DIAG_LEVEL";
    pub const PRELOG_DIAG_FORMAT: &str = "PRELOG_DIAG_FORMAT";
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Read access to environment variables.
///
/// The process environment is the usual source; tests substitute a fixed
/// set of pairs so they never mutate global state.
pub struct Environment {
    lookup: Lookup,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::system()
    }
}

impl Environment {
    /// The process environment.
    pub fn system() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// A fixed set of variables.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_lookup(move |var| {
            pairs
                .iter()
                .find(|(k, _)| k == var)
                .map(|(_, v)| v.clone())
        })
    }

    /// Get an optional, non-empty string variable.
    pub fn get(&self, var: &str) -> Option<String> {
        (self.lookup)(var).filter(|v| !v.is_empty())
    }

    /// Get a boolean variable.
    pub fn get_bool(&self, var: &str) -> Result<Option<bool>, EnvError> {
        match self.get(var) {
            Some(v) => match v.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(EnvError::InvalidValue {
                    var: var.to_string(),
                    message: format!("expected boolean, got {v:?}"),
                }),
            },
            None => Ok(None),
        }
    }

    /// Get a variable parsed with [`FromStr`].
    pub fn get_parsed<T: FromStr>(&self, var: &str) -> Result<Option<T>, EnvError> {
        match self.get(var) {
            Some(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: format!("cannot parse {v:?}"),
            }),
            None => Ok(None),
        }
    }
}
