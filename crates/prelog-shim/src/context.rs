//! Process state consulted while auditing.

use std::path::PathBuf;

use libc::c_int;
use nix::unistd::{geteuid, getpid, Pid};

/// Identity and filesystem position of the audited process.
pub trait ProcessContext: Send + Sync {
    /// Effective uid checked against the privilege floor.
    fn euid(&self) -> u32;

    fn pid(&self) -> Pid;

    /// Current working directory, if it can be read.
    fn cwd(&self) -> Option<PathBuf>;

    /// Path of the directory behind an open descriptor.
    fn descriptor_path(&self, fd: c_int) -> Option<PathBuf>;
}

/// The real process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemContext;

impl ProcessContext for SystemContext {
    fn euid(&self) -> u32 {
        geteuid().as_raw()
    }

    fn pid(&self) -> Pid {
        getpid()
    }

    fn cwd(&self) -> Option<PathBuf> {
        std::env::current_dir().ok()
    }

    fn descriptor_path(&self, fd: c_int) -> Option<PathBuf> {
        std::fs::read_link(format!("/proc/self/fd/{fd}")).ok()
    }
}
