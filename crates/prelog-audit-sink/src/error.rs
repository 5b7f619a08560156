use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors on the sink's internal paths. None of these reach the host.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no log directory: HOME is not set")]
    NoLogDirectory,

    #[error("sink is closed")]
    Closed,

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log: {0}")]
    Write(#[from] io::Error),
}
