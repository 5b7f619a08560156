//! Buffered streams: fopen, freopen, popen, fdopen, fclose, pclose.

use libc::{c_char, c_int, FILE};
use prelog_audit_types::Interpretation;

use super::{audit, c_str, unresolved};
use crate::guard::ErrnoGuard;
use crate::symbols;

/// # Safety
///
/// `path` and `mode` must be null or valid C strings.
unsafe fn audit_stream_open(
    interpretation: Interpretation,
    path: *const c_char,
    mode: *const c_char,
    stream: *mut FILE,
    errno: &ErrnoGuard,
) {
    audit(|auditor| {
        let (Some(path), Some(mode)) = (c_str(path), c_str(mode)) else {
            return;
        };
        auditor.on_stream_open(interpretation, &path, &mode, stream as usize, errno.value());
    });
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    let Some(original) = symbols::fopen() else {
        return unresolved(std::ptr::null_mut());
    };
    let stream = original(path, mode);
    let errno = ErrnoGuard::save();
    audit_stream_open(Interpretation::Fopen, path, mode, stream, &errno);
    stream
}

#[no_mangle]
pub unsafe extern "C" fn freopen(
    path: *const c_char,
    mode: *const c_char,
    previous: *mut FILE,
) -> *mut FILE {
    let Some(original) = symbols::freopen() else {
        return unresolved(std::ptr::null_mut());
    };
    let stream = original(path, mode, previous);
    let errno = ErrnoGuard::save();
    audit(|auditor| {
        let Some(mode) = c_str(mode) else {
            return;
        };
        auditor.on_freopen(
            c_str(path).as_deref(),
            &mode,
            previous as usize,
            stream as usize,
            errno.value(),
        );
    });
    stream
}

#[no_mangle]
pub unsafe extern "C" fn popen(command: *const c_char, mode: *const c_char) -> *mut FILE {
    let Some(original) = symbols::popen() else {
        return unresolved(std::ptr::null_mut());
    };
    let stream = original(command, mode);
    let errno = ErrnoGuard::save();
    audit_stream_open(Interpretation::Popen, command, mode, stream, &errno);
    stream
}

#[no_mangle]
pub unsafe extern "C" fn fdopen(fd: c_int, mode: *const c_char) -> *mut FILE {
    let Some(original) = symbols::fdopen() else {
        return unresolved(std::ptr::null_mut());
    };
    let stream = original(fd, mode);
    let errno = ErrnoGuard::save();
    audit(|auditor| {
        let mode = c_str(mode).unwrap_or_default();
        auditor.on_fdopen(fd, &mode, stream as usize, errno.value());
    });
    stream
}

#[no_mangle]
pub unsafe extern "C" fn fclose(stream: *mut FILE) -> c_int {
    let Some(original) = symbols::fclose() else {
        return unresolved(libc::EOF);
    };
    let handle = stream as usize;
    let ret = original(stream);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_stream_close(Interpretation::Fclose, handle, ret, errno.value()));
    ret
}

#[no_mangle]
pub unsafe extern "C" fn pclose(stream: *mut FILE) -> c_int {
    let Some(original) = symbols::pclose() else {
        return unresolved(-1);
    };
    let handle = stream as usize;
    let ret = original(stream);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_stream_close(Interpretation::Pclose, handle, ret, errno.value()));
    ret
}
