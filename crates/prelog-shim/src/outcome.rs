//! Subject texts and synthetic resource labels.

use libc::c_int;

/// `e<errno>` for a failed call, `e0` otherwise.
pub(crate) fn error_code(failed: bool, errno: c_int) -> String {
    if failed {
        format!("e{errno}")
    } else {
        "e0".to_string()
    }
}

/// Pointer rendered the way `%p` does.
pub(crate) fn pointer(handle: usize) -> String {
    if handle == 0 {
        "(nil)".to_string()
    } else {
        format!("{handle:#x}")
    }
}

pub(crate) fn descriptor_label(fd: c_int) -> String {
    format!("fd: {fd}")
}

/// Origin label for a path relative to a directory descriptor.
pub(crate) fn dirfd_origin(dirfd: c_int) -> String {
    format!("fd: {dirfd}")
}

pub(crate) fn stream_label(stream: usize) -> String {
    format!("FILE: {}", pointer(stream))
}

pub(crate) fn new_stream_label(stream: usize) -> String {
    format!("FILE {}", pointer(stream))
}

pub(crate) fn directory_label(dir: usize) -> String {
    format!("DIR: {}", pointer(dir))
}

pub(crate) fn new_directory_label(dir: usize) -> String {
    format!("DIR {}", pointer(dir))
}

pub(crate) fn open_text(ret: c_int, flags: c_int, errno: c_int) -> String {
    format!("fd {ret}: with flag {flags}, {}", error_code(ret < 0, errno))
}

pub(crate) fn stream_open_text(stream: usize, flags: c_int, errno: c_int) -> String {
    format!(
        "FILE {}: with flag {flags}, {}",
        pointer(stream),
        error_code(stream == 0, errno)
    )
}

pub(crate) fn flag_text(flags: impl std::fmt::Display, failed: bool, errno: c_int) -> String {
    format!("with flag {flags}, {}", error_code(failed, errno))
}

pub(crate) fn directory_open_text(dir: usize, errno: c_int) -> String {
    format!("DIR {}: {}", pointer(dir), error_code(dir == 0, errno))
}

pub(crate) fn duplicate_text(failed: bool, errno: c_int) -> String {
    format!("New fd: {}", error_code(failed, errno))
}

pub(crate) fn rename_text(flags: u32, failed: bool, errno: c_int) -> String {
    format!("New file: with flags {flags}, {}", error_code(failed, errno))
}

pub(crate) fn socket_text(
    fd: c_int,
    domain: c_int,
    kind: c_int,
    protocol: c_int,
    failed: bool,
    errno: c_int,
) -> String {
    format!(
        "socket {fd}: with domain {domain}, type {kind}, protocol {protocol}, {}",
        error_code(failed, errno)
    )
}

pub(crate) fn shm_open_text(ret: c_int, flags: c_int, mode: u32, errno: c_int) -> String {
    format!(
        "shm {ret}: with flag {flags} and mode {mode}: {}",
        error_code(ret < 0, errno)
    )
}

pub(crate) fn shm_unlink_text(failed: bool, errno: c_int) -> String {
    format!("shm: {}", error_code(failed, errno))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(false, 2, "e0" ; "success ignores errno")]
    #[test_case(true, 2, "e2" ; "failure")]
    #[test_case(true, 0, "e0" ; "failure without errno")]
    fn test_error_code(failed: bool, errno: c_int, expected: &str) {
        assert_eq!(error_code(failed, errno), expected);
    }

    #[test]
    fn test_pointer_rendering() {
        assert_eq!(pointer(0), "(nil)");
        assert_eq!(pointer(0x55d0_1234), "0x55d01234");
        assert_eq!(stream_label(0x10), "FILE: 0x10");
        assert_eq!(new_directory_label(0), "DIR (nil)");
    }

    #[test]
    fn test_open_texts() {
        assert_eq!(open_text(3, 1, 0), "fd 3: with flag 1, e0");
        assert_eq!(open_text(-1, 0, libc::ENOENT), "fd -1: with flag 0, e2");
        assert_eq!(
            stream_open_text(0, libc::O_RDONLY, libc::EACCES),
            "FILE (nil): with flag 0, e13"
        );
        assert_eq!(directory_open_text(0x20, 0), "DIR 0x20: e0");
    }

    #[test]
    fn test_pair_texts() {
        assert_eq!(duplicate_text(false, 0), "New fd: e0");
        assert_eq!(rename_text(1, true, libc::EEXIST), "New file: with flags 1, e17");
        assert_eq!(flag_text(0, false, 0), "with flag 0, e0");
    }

    #[test]
    fn test_ipc_texts() {
        assert_eq!(
            socket_text(5, libc::AF_UNIX, libc::SOCK_STREAM, 0, false, 0),
            "socket 5: with domain 1, type 1, protocol 0, e0"
        );
        assert_eq!(shm_open_text(7, 66, 0o600, 0), "shm 7: with flag 66 and mode 384: e0");
        assert_eq!(shm_unlink_text(true, libc::ENOENT), "shm: e2");
    }
}
