//! Per-call guards: errno preservation and reentry detection.

use std::cell::Cell;

use libc::c_int;

thread_local! {
    static IN_AUDIT: Cell<bool> = const { Cell::new(false) };
}

/// Read the calling thread's errno.
pub(crate) fn errno() -> c_int {
    // SAFETY: `__errno_location` always returns a valid thread-local pointer.
    unsafe { *libc::__errno_location() }
}

pub(crate) fn set_errno(value: c_int) {
    // SAFETY: see `errno`.
    unsafe { *libc::__errno_location() = value }
}

/// Captures errno right after the original call and puts it back on drop,
/// whatever the audit path did to it in between.
pub(crate) struct ErrnoGuard {
    saved: c_int,
}

impl ErrnoGuard {
    pub(crate) fn save() -> Self {
        Self { saved: errno() }
    }

    /// The errno the original call left behind.
    pub(crate) fn value(&self) -> c_int {
        self.saved
    }
}

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        set_errno(self.saved);
    }
}

/// Marks the current thread as inside the audit path.
///
/// Calls the audit path itself makes (opening the log, reading `/proc`,
/// closing files) land in the exported wrappers again; while a guard is
/// alive they go straight to the original implementation.
pub(crate) struct ReentryGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ReentryGuard {
    /// `None` if this thread is already auditing, or its thread-locals are
    /// gone (thread teardown).
    pub(crate) fn enter() -> Option<Self> {
        let entered = IN_AUDIT
            .try_with(|flag| !flag.replace(true))
            .unwrap_or(false);
        entered.then(|| Self {
            _not_send: std::marker::PhantomData,
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        let _ = IN_AUDIT.try_with(|flag| flag.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_restored_on_drop() {
        set_errno(libc::ENOENT);
        {
            let guard = ErrnoGuard::save();
            assert_eq!(guard.value(), libc::ENOENT);
            set_errno(libc::EACCES);
        }
        assert_eq!(errno(), libc::ENOENT);
    }

    #[test]
    fn test_reentry_blocked_while_held() {
        let outer = ReentryGuard::enter().expect("first entry");
        assert!(ReentryGuard::enter().is_none());
        assert!(IN_AUDIT.with(Cell::get));
        drop(outer);
        assert!(!IN_AUDIT.with(Cell::get));
        assert!(ReentryGuard::enter().is_some());
    }

    #[test]
    fn test_reentry_is_per_thread() {
        let _held = ReentryGuard::enter().expect("first entry");
        let other = std::thread::spawn(|| ReentryGuard::enter().is_some())
            .join()
            .unwrap();
        assert!(other);
    }
}
