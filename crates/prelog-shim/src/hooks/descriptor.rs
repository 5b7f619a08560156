//! dup, dup2, dup3, close.

use libc::c_int;
use prelog_audit_types::Interpretation;

use super::{audit, unresolved};
use crate::guard::ErrnoGuard;
use crate::symbols;

#[no_mangle]
pub unsafe extern "C" fn dup(oldfd: c_int) -> c_int {
    let Some(original) = symbols::dup() else {
        return unresolved(-1);
    };
    let ret = original(oldfd);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_dup(Interpretation::Dup, oldfd, ret, ret, errno.value()));
    ret
}

#[no_mangle]
pub unsafe extern "C" fn dup2(oldfd: c_int, newfd: c_int) -> c_int {
    let Some(original) = symbols::dup2() else {
        return unresolved(-1);
    };
    let ret = original(oldfd, newfd);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_dup(Interpretation::Dup2, oldfd, newfd, ret, errno.value()));
    ret
}

#[no_mangle]
pub unsafe extern "C" fn dup3(oldfd: c_int, newfd: c_int, flags: c_int) -> c_int {
    let Some(original) = symbols::dup3() else {
        return unresolved(-1);
    };
    let ret = original(oldfd, newfd, flags);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_dup(Interpretation::Dup3, oldfd, newfd, ret, errno.value()));
    ret
}

#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    let Some(original) = symbols::close() else {
        return unresolved(-1);
    };
    let ret = original(fd);
    let errno = ErrnoGuard::save();
    audit(|auditor| auditor.on_close(fd, ret, errno.value()));
    ret
}
