//! Audit event types for prelog.
//!
//! An [`Event`] is one audit record: a fixed [`Interpretation`] naming the
//! kind of operation, a capture timestamp, and an ordered list of
//! [`Subject`]s. Events are built by the interception layer and handed by
//! value to the log sink, which renders them with [`format`].

mod event;
pub mod format;
mod interpretation;

pub use event::{Event, Subject};
pub use format::LineFormat;
pub use interpretation::Interpretation;
