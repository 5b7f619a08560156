//! Exported C entry points.
//!
//! Every wrapper follows the same shape: resolve the original, call it,
//! save errno, audit, return the original's result. The errno guard puts
//! the caller's errno back when the wrapper returns.

mod descriptor;
mod dir;
mod ipc;
mod open;
mod paths;
mod process;
mod stream;

use std::borrow::Cow;
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};

use libc::c_char;

use crate::auditor::Auditor;
use crate::guard::{set_errno, ReentryGuard};
use crate::runtime;

/// Run `f` against the process auditor, unless this thread is already
/// auditing or auditing is disabled. Panics stop here.
fn audit(f: impl FnOnce(&Auditor)) {
    let Some(_reentry) = ReentryGuard::enter() else {
        return;
    };
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(auditor) = runtime::auditor() {
            f(auditor);
        }
    }));
}

/// Failure value for a wrapper whose original could not be resolved.
fn unresolved<T>(failure: T) -> T {
    set_errno(libc::ENOSYS);
    failure
}

/// Borrow a string argument; `None` for null.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy())
    }
}
