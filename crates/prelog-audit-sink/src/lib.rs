//! Per-process audit log.
//!
//! One [`AuditSink`] exists per process. It opens a gzip-compressed append
//! file lazily on the first event, writes a header identifying the process,
//! then one line per event. A forked child discards the inherited stream
//! without flushing it and opens its own file on its first event.

mod error;
mod exit;
mod gate;
mod sink;
mod writer;

pub use error::SinkError;
pub use exit::register_exit_hook;
pub use gate::{AccessGate, GateDecision, GLOBAL_LOCK_FILE};
pub use sink::{AuditSink, InsertOutcome, SinkForkGuard, SinkSettings, SinkState};
pub use writer::{FileIdentity, LogFile};
