//! prelog: an `LD_PRELOAD` library that records file and process
//! operations of the host program into a per-process compressed log.
//!
//! Every exported wrapper calls the real implementation first, then audits
//! the call with the caller's errno saved and a per-thread reentry flag set.
//! The audit path never fails the caller: errors degrade to "no event" and
//! panics are caught at the wrapper boundary.
//!
//! The exported symbols are compiled out of this crate's own unit tests so
//! the test harness is never interposed.

// The runtime accessors are only reached through the exported wrappers.
#![cfg_attr(test, allow(dead_code))]

mod auditor;
mod context;
mod guard;
mod outcome;
mod runtime;
mod symbols;

#[cfg(not(test))]
mod hooks;

pub use auditor::{Auditor, ForkBarrier, OpenCall, PathArg};
pub use context::{ProcessContext, SystemContext};
