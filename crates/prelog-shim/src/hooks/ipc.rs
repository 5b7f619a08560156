//! socket, socketpair, pipe, pipe2, shm_open, shm_unlink.

use libc::{c_char, c_int, mode_t};
use prelog_audit_types::Interpretation;

use super::{audit, c_str, unresolved};
use crate::guard::ErrnoGuard;
use crate::symbols;

/// Both ends of a pair, if the call succeeded.
///
/// # Safety
///
/// `fds` must point to two descriptors when `ret` is 0.
unsafe fn pair(ret: c_int, fds: *const c_int) -> Option<[c_int; 2]> {
    (ret == 0 && !fds.is_null()).then(|| [*fds, *fds.add(1)])
}

#[no_mangle]
pub unsafe extern "C" fn socket(domain: c_int, kind: c_int, protocol: c_int) -> c_int {
    let Some(original) = symbols::socket() else {
        return unresolved(-1);
    };
    let ret = original(domain, kind, protocol);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_socket(domain, kind, protocol, ret, errno.value()));
    ret
}

#[no_mangle]
pub unsafe extern "C" fn socketpair(
    domain: c_int,
    kind: c_int,
    protocol: c_int,
    sv: *mut c_int,
) -> c_int {
    let Some(original) = symbols::socketpair() else {
        return unresolved(-1);
    };
    let ret = original(domain, kind, protocol, sv);
    let errno = ErrnoGuard::save();
    audit(|auditor| {
        let result = pair(ret, sv).ok_or(errno.value());
        auditor.on_socketpair(domain, kind, protocol, result);
    });
    ret
}

#[no_mangle]
pub unsafe extern "C" fn pipe(fds: *mut c_int) -> c_int {
    let Some(original) = symbols::pipe() else {
        return unresolved(-1);
    };
    let ret = original(fds);
    let _errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_pipe(Interpretation::Pipe, pair(ret, fds)));
    ret
}

#[no_mangle]
pub unsafe extern "C" fn pipe2(fds: *mut c_int, flags: c_int) -> c_int {
    let Some(original) = symbols::pipe2() else {
        return unresolved(-1);
    };
    let ret = original(fds, flags);
    let _errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_pipe(Interpretation::Pipe2, pair(ret, fds)));
    ret
}

#[no_mangle]
pub unsafe extern "C" fn shm_open(name: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(original) = symbols::shm_open() else {
        return unresolved(-1);
    };
    let ret = original(name, flags, mode);
    let errno = ErrnoGuard::save();
    audit(|auditor| {
        if let Some(name) = c_str(name) {
            auditor.on_shm_open(&name, flags, mode, ret, errno.value());
        }
    });
    ret
}

#[no_mangle]
pub unsafe extern "C" fn shm_unlink(name: *const c_char) -> c_int {
    let Some(original) = symbols::shm_unlink() else {
        return unresolved(-1);
    };
    let ret = original(name);
    let errno = ErrnoGuard::save();
    audit(|auditor| {
        if let Some(name) = c_str(name) {
            auditor.on_shm_unlink(&name, ret, errno.value());
        }
    });
    ret
}
