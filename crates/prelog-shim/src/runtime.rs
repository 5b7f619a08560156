//! The process-wide auditor.
//!
//! Built on first use from the resolved configuration. A disabled shim
//! stores `None` and every wrapper becomes a plain pass-through.

use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::OnceCell;
use prelog_common_config::ConfigLoader;
use tracing::{debug, warn};

use crate::auditor::Auditor;
use crate::guard::ReentryGuard;

static AUDITOR: OnceCell<Option<Auditor>> = OnceCell::new();

/// The auditor, building it if this is the first audited call.
///
/// Must be called with a [`ReentryGuard`] held: configuration loading and
/// diagnostics setup perform I/O that lands in the wrappers again.
pub(crate) fn auditor() -> Option<&'static Auditor> {
    AUDITOR.get_or_init(build).as_ref()
}

/// The auditor a fork must lock.
///
/// Builds it, or waits for a build running on another thread: a child
/// forked mid-build would inherit a cell that never finishes initializing.
pub(crate) fn for_fork() -> Option<&'static Auditor> {
    settle(&AUDITOR, build)
}

fn settle<T>(cell: &OnceCell<Option<T>>, init: impl FnOnce() -> Option<T>) -> Option<&T> {
    panic::catch_unwind(AssertUnwindSafe(|| cell.get_or_init(init).as_ref()))
        .ok()
        .flatten()
}

/// The auditor if it has been built, without building it.
pub(crate) fn existing() -> Option<&'static Auditor> {
    AUDITOR.get().and_then(Option::as_ref)
}

fn build() -> Option<Auditor> {
    prelog_common_log::init_once();
    // Panics are caught at the wrapper boundary; report them as diagnostics
    // instead of on the host's stderr.
    panic::set_hook(Box::new(|info| warn!(%info, "panic on audit path")));

    let config = ConfigLoader::new().load();
    if !config.enabled {
        debug!("auditing disabled");
        return None;
    }
    debug!(uid_floor = config.uid_floor, log_dir = ?config.resolved_log_dir(), "auditor ready");
    Some(Auditor::from_config(&config, Some(close_at_exit)))
}

/// Registered with `atexit` once the log is first opened.
extern "C" fn close_at_exit() {
    let Some(_reentry) = ReentryGuard::enter() else {
        return;
    };
    let _ = panic::catch_unwind(|| {
        if let Some(auditor) = existing() {
            auditor.shutdown();
        }
    });
}
