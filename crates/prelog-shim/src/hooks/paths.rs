//! Path-pair and removal calls: link, symlink, rename and their *at
//! variants, unlink, rmdir, remove.

use libc::{c_char, c_int, c_uint};
use prelog_audit_types::Interpretation;

use super::{audit, c_str, unresolved};
use crate::auditor::PathArg;
use crate::guard::ErrnoGuard;
use crate::symbols;

#[derive(Clone, Copy)]
enum PairKind {
    Link,
    Rename,
}

/// # Safety
///
/// `old` and `new` must be null or valid C strings.
unsafe fn audit_pair(
    kind: PairKind,
    interpretation: Interpretation,
    (old_dirfd, old): (Option<c_int>, *const c_char),
    (new_dirfd, new): (Option<c_int>, *const c_char),
    flags: c_uint,
    ret: c_int,
    errno: &ErrnoGuard,
) {
    audit(|auditor| {
        let (Some(old), Some(new)) = (c_str(old), c_str(new)) else {
            return;
        };
        let old = PathArg {
            dirfd: old_dirfd,
            path: &old,
        };
        let new = PathArg {
            dirfd: new_dirfd,
            path: &new,
        };
        match kind {
            PairKind::Link => {
                auditor.on_link(interpretation, old, new, flags as c_int, ret, errno.value())
            }
            PairKind::Rename => auditor.on_rename(interpretation, old, new, flags, ret, errno.value()),
        }
    });
}

/// # Safety
///
/// `path` must be null or a valid C string.
unsafe fn audit_removal(
    interpretation: Interpretation,
    path: *const c_char,
    ret: c_int,
    errno: &ErrnoGuard,
) {
    audit(|auditor| {
        if let Some(path) = c_str(path) {
            auditor.on_remove(interpretation, &path, ret, errno.value());
        }
    });
}

#[no_mangle]
pub unsafe extern "C" fn link(old: *const c_char, new: *const c_char) -> c_int {
    let Some(original) = symbols::link() else {
        return unresolved(-1);
    };
    let ret = original(old, new);
    let errno = ErrnoGuard::save();
    audit_pair(
        PairKind::Link,
        Interpretation::Link,
        (None, old),
        (None, new),
        0,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn linkat(
    old_dirfd: c_int,
    old: *const c_char,
    new_dirfd: c_int,
    new: *const c_char,
    flags: c_int,
) -> c_int {
    let Some(original) = symbols::linkat() else {
        return unresolved(-1);
    };
    let ret = original(old_dirfd, old, new_dirfd, new, flags);
    let errno = ErrnoGuard::save();
    audit_pair(
        PairKind::Link,
        Interpretation::Linkat,
        (Some(old_dirfd), old),
        (Some(new_dirfd), new),
        flags as c_uint,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn symlink(target: *const c_char, linkpath: *const c_char) -> c_int {
    let Some(original) = symbols::symlink() else {
        return unresolved(-1);
    };
    let ret = original(target, linkpath);
    let errno = ErrnoGuard::save();
    audit_pair(
        PairKind::Link,
        Interpretation::Symlink,
        (None, target),
        (None, linkpath),
        0,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn symlinkat(
    target: *const c_char,
    new_dirfd: c_int,
    linkpath: *const c_char,
) -> c_int {
    let Some(original) = symbols::symlinkat() else {
        return unresolved(-1);
    };
    let ret = original(target, new_dirfd, linkpath);
    let errno = ErrnoGuard::save();
    audit_pair(
        PairKind::Link,
        Interpretation::Symlinkat,
        (None, target),
        (Some(new_dirfd), linkpath),
        0,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn rename(old: *const c_char, new: *const c_char) -> c_int {
    let Some(original) = symbols::rename() else {
        return unresolved(-1);
    };
    let ret = original(old, new);
    let errno = ErrnoGuard::save();
    audit_pair(
        PairKind::Rename,
        Interpretation::Rename,
        (None, old),
        (None, new),
        0,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn renameat(
    old_dirfd: c_int,
    old: *const c_char,
    new_dirfd: c_int,
    new: *const c_char,
) -> c_int {
    let Some(original) = symbols::renameat() else {
        return unresolved(-1);
    };
    let ret = original(old_dirfd, old, new_dirfd, new);
    let errno = ErrnoGuard::save();
    audit_pair(
        PairKind::Rename,
        Interpretation::Renameat,
        (Some(old_dirfd), old),
        (Some(new_dirfd), new),
        0,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn renameat2(
    old_dirfd: c_int,
    old: *const c_char,
    new_dirfd: c_int,
    new: *const c_char,
    flags: c_uint,
) -> c_int {
    let Some(original) = symbols::renameat2() else {
        return unresolved(-1);
    };
    let ret = original(old_dirfd, old, new_dirfd, new, flags);
    let errno = ErrnoGuard::save();
    audit_pair(
        PairKind::Rename,
        Interpretation::Renameat2,
        (Some(old_dirfd), old),
        (Some(new_dirfd), new),
        flags,
        ret,
        &errno,
    );
    ret
}

#[no_mangle]
pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    let Some(original) = symbols::unlink() else {
        return unresolved(-1);
    };
    let ret = original(path);
    let errno = ErrnoGuard::save();
    audit_removal(Interpretation::Unlink, path, ret, &errno);
    ret
}

#[no_mangle]
pub unsafe extern "C" fn rmdir(path: *const c_char) -> c_int {
    let Some(original) = symbols::rmdir() else {
        return unresolved(-1);
    };
    let ret = original(path);
    let errno = ErrnoGuard::save();
    audit_removal(Interpretation::Rmdir, path, ret, &errno);
    ret
}

#[no_mangle]
pub unsafe extern "C" fn remove(path: *const c_char) -> c_int {
    let Some(original) = symbols::remove() else {
        return unresolved(-1);
    };
    let ret = original(path);
    let errno = ErrnoGuard::save();
    audit_removal(Interpretation::Remove, path, ret, &errno);
    ret
}
