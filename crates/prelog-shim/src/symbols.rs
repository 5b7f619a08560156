//! Original implementations behind the exported wrappers.
//!
//! Each symbol is looked up once with `dlsym(RTLD_NEXT, ..)` and memoized,
//! including a failed lookup. The shared-memory calls fall back to
//! `librt.so.1` on older C libraries that keep them there.

use std::ffi::c_void;

use libc::{c_char, c_int, c_uint, mode_t, pid_t, DIR, FILE};
use once_cell::sync::OnceCell;

use crate::guard::ErrnoGuard;

const LIBRT: &[u8] = b"librt.so.1\0";

/// Resolve the next definition of a NUL-terminated symbol name.
fn next_symbol(name: &'static [u8]) -> Option<*mut c_void> {
    debug_assert_eq!(name.last(), Some(&0));
    // SAFETY: `name` is NUL-terminated and static.
    let ptr = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr().cast::<c_char>()) };
    (!ptr.is_null()).then_some(ptr)
}

/// Resolve a symbol from librt when the default search order misses it.
fn librt_symbol(name: &'static [u8]) -> Option<*mut c_void> {
    // SAFETY: both names are NUL-terminated and static. The handle is kept
    // open for the life of the process.
    unsafe {
        let handle = libc::dlopen(LIBRT.as_ptr().cast::<c_char>(), libc::RTLD_LAZY);
        if handle.is_null() {
            return None;
        }
        let ptr = libc::dlsym(handle, name.as_ptr().cast::<c_char>());
        (!ptr.is_null()).then_some(ptr)
    }
}

macro_rules! originals {
    ($(
        $(#[$meta:meta])*
        $name:ident = $symbol:literal $(or $fallback:ident)? : fn($($arg:ty),*) -> $ret:ty;
    )*) => {
        $(
            $(#[$meta])*
            pub(crate) fn $name() -> Option<unsafe extern "C" fn($($arg),*) -> $ret> {
                static CELL: OnceCell<Option<unsafe extern "C" fn($($arg),*) -> $ret>> =
                    OnceCell::new();
                *CELL.get_or_init(|| {
                    // The dynamic loader may set errno even when it succeeds.
                    let _errno = ErrnoGuard::save();
                    let name: &'static [u8] = concat!($symbol, "\0").as_bytes();
                    let ptr = next_symbol(name) $(.or_else(|| $fallback(name)))?;
                    // SAFETY: the symbol is the C library definition of this
                    // function, whose prototype matches the declared type.
                    ptr.map(|p| unsafe {
                        std::mem::transmute::<*mut c_void, unsafe extern "C" fn($($arg),*) -> $ret>(p)
                    })
                })
            }
        )*
    };
}

originals! {
    // `open` and friends are variadic in C. The optional mode is always
    // passed; the callee only reads it for O_CREAT and O_TMPFILE.
    open = "open": fn(*const c_char, c_int, mode_t) -> c_int;
    open64 = "open64": fn(*const c_char, c_int, mode_t) -> c_int;
    openat = "openat": fn(c_int, *const c_char, c_int, mode_t) -> c_int;
    openat64 = "openat64": fn(c_int, *const c_char, c_int, mode_t) -> c_int;
    creat = "creat": fn(*const c_char, mode_t) -> c_int;
    mkfifo = "mkfifo": fn(*const c_char, mode_t) -> c_int;
    mkfifoat = "mkfifoat": fn(c_int, *const c_char, mode_t) -> c_int;
    mkdir = "mkdir": fn(*const c_char, mode_t) -> c_int;
    mkdirat = "mkdirat": fn(c_int, *const c_char, mode_t) -> c_int;

    fopen = "fopen": fn(*const c_char, *const c_char) -> *mut FILE;
    freopen = "freopen": fn(*const c_char, *const c_char, *mut FILE) -> *mut FILE;
    popen = "popen": fn(*const c_char, *const c_char) -> *mut FILE;
    fdopen = "fdopen": fn(c_int, *const c_char) -> *mut FILE;
    fclose = "fclose": fn(*mut FILE) -> c_int;
    pclose = "pclose": fn(*mut FILE) -> c_int;

    dup = "dup": fn(c_int) -> c_int;
    dup2 = "dup2": fn(c_int, c_int) -> c_int;
    dup3 = "dup3": fn(c_int, c_int, c_int) -> c_int;
    close = "close": fn(c_int) -> c_int;

    link = "link": fn(*const c_char, *const c_char) -> c_int;
    linkat = "linkat": fn(c_int, *const c_char, c_int, *const c_char, c_int) -> c_int;
    symlink = "symlink": fn(*const c_char, *const c_char) -> c_int;
    symlinkat = "symlinkat": fn(*const c_char, c_int, *const c_char) -> c_int;
    rename = "rename": fn(*const c_char, *const c_char) -> c_int;
    renameat = "renameat": fn(c_int, *const c_char, c_int, *const c_char) -> c_int;
    renameat2 = "renameat2": fn(c_int, *const c_char, c_int, *const c_char, c_uint) -> c_int;
    unlink = "unlink": fn(*const c_char) -> c_int;
    rmdir = "rmdir": fn(*const c_char) -> c_int;
    remove = "remove": fn(*const c_char) -> c_int;

    opendir = "opendir": fn(*const c_char) -> *mut DIR;
    fdopendir = "fdopendir": fn(c_int) -> *mut DIR;
    closedir = "closedir": fn(*mut DIR) -> c_int;

    fork = "fork": fn() -> pid_t;

    socket = "socket": fn(c_int, c_int, c_int) -> c_int;
    socketpair = "socketpair": fn(c_int, c_int, c_int, *mut c_int) -> c_int;
    pipe = "pipe": fn(*mut c_int) -> c_int;
    pipe2 = "pipe2": fn(*mut c_int, c_int) -> c_int;
    shm_open = "shm_open" or librt_symbol: fn(*const c_char, c_int, mode_t) -> c_int;
    shm_unlink = "shm_unlink" or librt_symbol: fn(*const c_char) -> c_int;
}
