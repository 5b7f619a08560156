//! Sink lifecycle: Uninitialized, Active, Closed.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use nix::unistd::{getpid, Pid};
use parking_lot::{Mutex, MutexGuard};
use prelog_audit_capture::{ActorIdentity, ActorResolver};
use prelog_audit_types::{Event, LineFormat};
use prelog_common_config::ShimConfig;
use prelog_common_log::spans;
use strum::Display;
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::exit::register_exit_hook;
use crate::gate::{AccessGate, GateDecision};
use crate::writer::LogFile;

const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S";
const FILE_SUFFIX: &str = ".log.gz";

/// Settings fixed for the lifetime of a sink.
#[derive(Debug, Clone)]
pub struct SinkSettings {
    /// Target directory; `None` disables the sink.
    pub log_dir: Option<PathBuf>,
    pub line_format: LineFormat,
    pub compression_level: u32,
    pub sync_flush: bool,
    /// Registered with `atexit` on the first successful open.
    pub exit_hook: Option<extern "C" fn()>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            log_dir: None,
            line_format: LineFormat::default(),
            compression_level: 6,
            sync_flush: true,
            exit_hook: None,
        }
    }
}

impl SinkSettings {
    pub fn from_config(config: &ShimConfig) -> Self {
        Self {
            log_dir: config.resolved_log_dir(),
            line_format: config.line_format,
            compression_level: config.compression_level.min(9),
            sync_flush: config.sync_flush,
            exit_hook: None,
        }
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    pub fn with_exit_hook(mut self, hook: extern "C" fn()) -> Self {
        self.exit_hook = Some(hook);
        self
    }
}

/// Observable sink state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SinkState {
    Uninitialized,
    Active,
    Closed,
}

/// What happened to an inserted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Written,
    /// The event had no interpretation.
    Rejected,
    /// An access-gate marker is present.
    Suppressed(GateDecision),
    /// No log directory, the file could not be opened, or the sink is closed.
    Unavailable,
    /// The write itself failed.
    Failed,
}

struct ActiveLog {
    pid: Pid,
    path: PathBuf,
    encoder: GzEncoder<LogFile>,
}

impl ActiveLog {
    fn write_line(&mut self, line: &str, sync_flush: bool) -> Result<(), SinkError> {
        self.encoder.write_all(line.as_bytes())?;
        if sync_flush {
            self.encoder.flush()?;
        }
        Ok(())
    }

    /// Make sure the stream still writes into its own file, reopening it by
    /// path if the host took over the descriptor number. `false` means the
    /// file is gone and the stream was abandoned.
    fn ensure_intact(&mut self) -> bool {
        if self.encoder.get_ref().is_intact() {
            return true;
        }
        let reattached = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|file| self.encoder.get_mut().reattach(file));
        match reattached {
            Ok(()) => {
                debug!(path = %self.path.display(), "log descriptor reused by host, reopened");
                true
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "log file lost");
                self.encoder.get_mut().release();
                false
            }
        }
    }

    /// Write the gzip trailer and close the file.
    fn finish(mut self) -> Result<(), SinkError> {
        if !self.ensure_intact() {
            return Ok(());
        }
        let mut file = self.encoder.finish()?;
        file.flush()?;
        Ok(())
    }

    /// Close the file without emitting anything still buffered.
    fn discard(mut self) {
        self.encoder.get_mut().detach();
    }
}

enum Lifecycle {
    Uninitialized,
    Active(ActiveLog),
    Closed,
}

impl Lifecycle {
    fn state(&self) -> SinkState {
        match self {
            Self::Uninitialized => SinkState::Uninitialized,
            Self::Active(_) => SinkState::Active,
            Self::Closed => SinkState::Closed,
        }
    }
}

/// Holds the sink lock across `fork`.
#[must_use = "the sink is only protected while the guard is alive"]
pub struct SinkForkGuard<'a> {
    _lifecycle: MutexGuard<'a, Lifecycle>,
}

/// The single per-process destination for audit events.
pub struct AuditSink {
    settings: SinkSettings,
    gate: Option<AccessGate>,
    resolver: Arc<ActorResolver>,
    lifecycle: Mutex<Lifecycle>,
}

impl std::fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSink")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AuditSink {
    pub fn new(settings: SinkSettings, resolver: Arc<ActorResolver>) -> Self {
        let gate = settings.log_dir.as_ref().map(AccessGate::new);
        Self {
            settings,
            gate,
            resolver,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    pub fn settings(&self) -> &SinkSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &Arc<ActorResolver> {
        &self.resolver
    }

    pub fn state(&self) -> SinkState {
        self.lifecycle.lock().state()
    }

    /// Path of the open log file, if active.
    pub fn current_path(&self) -> Option<PathBuf> {
        match &*self.lifecycle.lock() {
            Lifecycle::Active(active) => Some(active.path.clone()),
            _ => None,
        }
    }

    /// Record an event on behalf of the calling process.
    pub fn insert_event(&self, event: Event) -> InsertOutcome {
        self.insert_event_as(event, getpid())
    }

    /// Record an event attributed to `pid`.
    ///
    /// The event is consumed whatever the outcome. If the active file was
    /// opened by a different pid, the inherited stream is discarded first.
    pub fn insert_event_as(&self, event: Event, pid: Pid) -> InsertOutcome {
        let span = spans::sink_span("insert");
        let _enter = span.enter();

        let Some(line) = self.settings.line_format.event(&event) else {
            return InsertOutcome::Rejected;
        };
        let Some(gate) = &self.gate else {
            return InsertOutcome::Unavailable;
        };

        let identity = self.resolver.resolve(pid);
        let decision = gate.check(&identity);
        if !decision.permits() {
            debug!(%decision, actor = %identity.actor, "write suppressed");
            return InsertOutcome::Suppressed(decision);
        }

        let mut lifecycle = self.lifecycle.lock();
        let inherited = matches!(&*lifecycle, Lifecycle::Active(active) if active.pid != pid);
        if inherited {
            if let Lifecycle::Active(active) =
                std::mem::replace(&mut *lifecycle, Lifecycle::Uninitialized)
            {
                debug!(old = active.pid.as_raw(), new = pid.as_raw(), "pid changed, discarding inherited log");
                active.discard();
            }
        }

        if let Lifecycle::Active(active) = &mut *lifecycle {
            if !active.ensure_intact() {
                *lifecycle = Lifecycle::Uninitialized;
            }
        }

        if let Lifecycle::Uninitialized = &*lifecycle {
            match self.open(gate.log_dir(), pid, &identity) {
                Ok(active) => *lifecycle = Lifecycle::Active(active),
                Err(e) => {
                    spans::record_error(&e);
                    warn!(error = %e, "audit log unavailable");
                    return InsertOutcome::Unavailable;
                }
            }
        }

        match &mut *lifecycle {
            Lifecycle::Active(active) => match active.write_line(&line, self.settings.sync_flush) {
                Ok(()) => InsertOutcome::Written,
                Err(e) => {
                    spans::record_error(&e);
                    warn!(error = %e, path = %active.path.display(), "audit write failed");
                    InsertOutcome::Failed
                }
            },
            _ => InsertOutcome::Unavailable,
        }
    }

    /// Open the log for `pid` without waiting for an event.
    pub fn init_as(&self, pid: Pid) -> Result<(), SinkError> {
        let gate = self.gate.as_ref().ok_or(SinkError::NoLogDirectory)?;
        let mut lifecycle = self.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Closed => Err(SinkError::Closed),
            Lifecycle::Active(_) => Ok(()),
            Lifecycle::Uninitialized => {
                let identity = self.resolver.resolve(pid);
                *lifecycle = Lifecycle::Active(self.open(gate.log_dir(), pid, &identity)?);
                Ok(())
            }
        }
    }

    /// Child side of `fork`: drop the inherited stream without flushing it.
    /// The child opens its own file on its first event.
    pub fn reset_for_fork(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if let Lifecycle::Active(active) =
            std::mem::replace(&mut *lifecycle, Lifecycle::Uninitialized)
        {
            active.discard();
        }
        self.resolver.invalidate();
    }

    /// Flush and close for good. Later events are dropped.
    pub fn shutdown(&self) -> Result<(), SinkError> {
        let mut lifecycle = self.lifecycle.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Active(active) => active.finish(),
            _ => Ok(()),
        }
    }

    pub fn lock_for_fork(&self) -> SinkForkGuard<'_> {
        SinkForkGuard {
            _lifecycle: self.lifecycle.lock(),
        }
    }

    fn open(&self, log_dir: &Path, pid: Pid, identity: &ActorIdentity) -> Result<ActiveLog, SinkError> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(log_dir)
            .map_err(|source| SinkError::CreateDir {
                path: log_dir.to_path_buf(),
                source,
            })?;

        let path = log_dir.join(log_file_name(pid));
        let file = open_append(&path)?;
        let mut active = ActiveLog {
            pid,
            encoder: GzEncoder::new(
                LogFile::new(file),
                Compression::new(self.settings.compression_level),
            ),
            path,
        };

        let header = self
            .settings
            .line_format
            .header(&identity.actor, pid.as_raw(), &identity.cmdline);
        active.write_line(&header, true)?;

        if let Some(hook) = self.settings.exit_hook {
            register_exit_hook(hook);
        }
        debug!(path = %active.path.display(), "audit log opened");
        Ok(active)
    }
}

fn open_append(path: &Path) -> Result<File, SinkError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)
        .map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// `<UTC timestamp>_<pid>.log.gz`.
pub(crate) fn log_file_name(pid: Pid) -> String {
    format!(
        "{}_{}{FILE_SUFFIX}",
        Utc::now().format(FILE_TIMESTAMP_FORMAT),
        pid.as_raw()
    )
}
