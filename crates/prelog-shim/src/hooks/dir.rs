//! Directory streams: opendir, fdopendir, closedir.

use libc::{c_char, c_int, DIR};

use super::{audit, c_str, unresolved};
use crate::guard::ErrnoGuard;
use crate::symbols;

#[no_mangle]
pub unsafe extern "C" fn opendir(path: *const c_char) -> *mut DIR {
    let Some(original) = symbols::opendir() else {
        return unresolved(std::ptr::null_mut());
    };
    let dir = original(path);
    let errno = ErrnoGuard::save();
    audit(|auditor| {
        if let Some(path) = c_str(path) {
            auditor.on_opendir(&path, dir as usize, errno.value());
        }
    });
    dir
}

#[no_mangle]
pub unsafe extern "C" fn fdopendir(fd: c_int) -> *mut DIR {
    let Some(original) = symbols::fdopendir() else {
        return unresolved(std::ptr::null_mut());
    };
    let dir = original(fd);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_fdopendir(fd, dir as usize, errno.value()));
    dir
}

#[no_mangle]
pub unsafe extern "C" fn closedir(dir: *mut DIR) -> c_int {
    let Some(original) = symbols::closedir() else {
        return unresolved(-1);
    };
    let handle = dir as usize;
    let ret = original(dir);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_closedir(handle, ret, errno.value()));
    ret
}
