//! fork.

use std::panic::{self, AssertUnwindSafe};

use libc::pid_t;

use super::unresolved;
use crate::guard::{ErrnoGuard, ReentryGuard};
use crate::{runtime, symbols};

/// The capture locks are held across the original call so the child never
/// starts with one of them taken by a thread that no longer exists. The
/// reentry flag is set for the whole call: atfork handlers that close or
/// open files must not try to take those locks again.
#[no_mangle]
pub unsafe extern "C" fn fork() -> pid_t {
    let Some(original) = symbols::fork() else {
        return unresolved(-1);
    };
    let Some(reentry) = ReentryGuard::enter() else {
        return original();
    };

    let auditor = runtime::for_fork();
    let barrier = auditor.map(|auditor| auditor.lock_for_fork());
    let child = original();
    let errno = ErrnoGuard::save();
    drop(barrier);

    if let Some(auditor) = auditor {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            if child == 0 {
                auditor.after_fork_child();
            } else {
                auditor.on_fork(child, errno.value());
            }
        }));
    }
    drop(reentry);
    child
}
