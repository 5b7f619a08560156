//! open, open64, openat, openat64, creat, mkfifo, mkfifoat, mkdir, mkdirat.

use libc::{c_char, c_int, mode_t};
use prelog_audit_types::Interpretation;

use super::{audit, c_str, unresolved};
use crate::auditor::{OpenCall, PathArg};
use crate::guard::ErrnoGuard;
use crate::symbols;

/// Audit a completed open-family call.
///
/// # Safety
///
/// `path` must be null or a valid C string.
unsafe fn audit_open(
    interpretation: Interpretation,
    dirfd: Option<c_int>,
    path: *const c_char,
    flags: c_int,
    creates: bool,
    ret: c_int,
    errno: &ErrnoGuard,
) {
    audit(|auditor| {
        let Some(path) = c_str(path) else {
            return;
        };
        let call = OpenCall {
            interpretation,
            target: PathArg { dirfd, path: &path },
            flags,
            creates,
            ret,
        };
        auditor.on_open(call, errno.value());
    });
}

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(original) = symbols::open() else {
        return unresolved(-1);
    };
    let ret = original(path, flags, mode);
    let errno = ErrnoGuard::save();
    audit_open(Interpretation::Open, None, path, flags, false, ret, &errno);
    ret
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(original) = symbols::open64() else {
        return unresolved(-1);
    };
    let ret = original(path, flags, mode);
    let errno = ErrnoGuard::save();
    audit_open(
        Interpretation::Open64,
        None,
        path,
        flags | libc::O_LARGEFILE,
        false,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn openat(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let Some(original) = symbols::openat() else {
        return unresolved(-1);
    };
    let ret = original(dirfd, path, flags, mode);
    let errno = ErrnoGuard::save();
    audit_open(Interpretation::Openat, Some(dirfd), path, flags, false, ret, &errno);
    ret
}

#[no_mangle]
pub unsafe extern "C" fn openat64(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let Some(original) = symbols::openat64() else {
        return unresolved(-1);
    };
    let ret = original(dirfd, path, flags, mode);
    let errno = ErrnoGuard::save();
    audit_open(
        Interpretation::Openat64,
        Some(dirfd),
        path,
        flags | libc::O_LARGEFILE,
        false,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn creat(path: *const c_char, mode: mode_t) -> c_int {
    let Some(original) = symbols::creat() else {
        return unresolved(-1);
    };
    let ret = original(path, mode);
    let errno = ErrnoGuard::save();
    audit_open(
        Interpretation::Creat,
        None,
        path,
        libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC,
        true,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn mkfifo(path: *const c_char, mode: mode_t) -> c_int {
    let Some(original) = symbols::mkfifo() else {
        return unresolved(-1);
    };
    let ret = original(path, mode);
    let errno = ErrnoGuard::save();
    audit_open(Interpretation::Mkfifo, None, path, 0, true, ret, &errno);
    ret
}

#[no_mangle]
pub unsafe extern "C" fn mkfifoat(dirfd: c_int, path: *const c_char, mode: mode_t) -> c_int {
    let Some(original) = symbols::mkfifoat() else {
        return unresolved(-1);
    };
    let ret = original(dirfd, path, mode);
    let errno = ErrnoGuard::save();
    audit_open(Interpretation::Mkfifoat, Some(dirfd), path, 0, true, ret, &errno);
    ret
}

#[no_mangle]
pub unsafe extern "C" fn mkdir(path: *const c_char, mode: mode_t) -> c_int {
    let Some(original) = symbols::mkdir() else {
        return unresolved(-1);
    };
    let ret = original(path, mode);
    let errno = ErrnoGuard::save();
    audit_open(Interpretation::Mkdir, None, path, libc::O_CREAT, true, ret, &errno);
    ret
}

#[no_mangle]
pub unsafe extern "C" fn mkdirat(dirfd: c_int, path: *const c_char, mode: mode_t) -> c_int {
    let Some(original) = symbols::mkdirat() else {
        return unresolved(-1);
    };
    let ret = original(dirfd, path, mode);
    let errno = ErrnoGuard::save();
    audit_open(
        Interpretation::Mkdirat,
        Some(dirfd),
        path,
        libc::O_CREAT,
        true,
        ret,
        &errno,
    );
    ret
}
