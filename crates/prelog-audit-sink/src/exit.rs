//! Process-exit closure.

use once_cell::sync::OnceCell;
use tracing::warn;

static REGISTERED: OnceCell<bool> = OnceCell::new();

/// Register `hook` with `atexit`, once per process.
///
/// Later calls are no-ops and report whether the first registration
/// succeeded. A forked child inherits the registration.
pub fn register_exit_hook(hook: extern "C" fn()) -> bool {
    *REGISTERED.get_or_init(|| {
        // SAFETY: `hook` is a plain function with C ABI and no arguments.
        let rc = unsafe { libc::atexit(hook) };
        if rc != 0 {
            warn!(rc, "atexit registration failed");
        }
        rc == 0
    })
}
