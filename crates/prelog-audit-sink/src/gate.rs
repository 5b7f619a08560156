//! File-existence opt-out checked before every write.

use std::path::{Path, PathBuf};

use prelog_audit_capture::ActorIdentity;
use strum::Display;

/// Marker disabling all logging for the user.
pub const GLOBAL_LOCK_FILE: &str = "LOGGING-FORBIDDEN.lock";

/// Result of consulting the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum GateDecision {
    Open,
    GloballyForbidden,
    ActorForbidden,
}

impl GateDecision {
    pub fn permits(self) -> bool {
        self == Self::Open
    }
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    log_dir: PathBuf,
}

impl AccessGate {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn global_lock(&self) -> PathBuf {
        self.log_dir.join(GLOBAL_LOCK_FILE)
    }

    pub fn actor_lock(&self, identity: &ActorIdentity) -> PathBuf {
        self.log_dir.join(identity.lock_file_name())
    }

    /// Only existence matters; content is never read.
    pub fn check(&self, identity: &ActorIdentity) -> GateDecision {
        if self.global_lock().exists() {
            GateDecision::GloballyForbidden
        } else if self.actor_lock(identity).exists() {
            GateDecision::ActorForbidden
        } else {
            GateDecision::Open
        }
    }
}
