//! Capture-side decisions for prelog.
//!
//! This crate holds the three pieces of state and logic the interception
//! layer consults before building an event:
//!
//! - [`RelevancePolicy`]: pure predicates deciding whether an operation is
//!   worth recording
//! - [`HandleRegistry`]: thread-safe sets of descriptors, streams and
//!   directory handles the shim has decided to correlate
//! - [`ActorResolver`]: the process identity written into headers and used
//!   by the per-actor access gate, cached per pid

mod actor;
mod policy;
mod registry;

pub use actor::{
    ActorFallback, ActorIdentity, ActorResolver, ProcFs, ProcessIntrospector, ResolverForkGuard,
    ACTOR_LOCK_SUFFIX, DEFAULT_CMDLINE_LIMIT,
};
pub use policy::{
    is_write_intent, normalize, translate_fopen_mode, OpenRequest, PathClass, PathRef,
    RelevancePolicy, DEFAULT_UID_FLOOR,
};
pub use registry::{HandleKind, HandleRegistry, RegistryForkGuard};
