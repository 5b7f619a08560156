//! Test utilities for prelog crates.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tempfile::TempDir;

/// Log directory relative to a test home.
pub const LOG_SUBDIR: &str = ".local/share/prelog";

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Creates a temporary file with given content.
pub fn temp_file(content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join("test_file");
    std::fs::write(&path, content).expect("Failed to write temp file");
    (dir, path)
}

/// A throwaway home directory with the default log location beneath it.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self { dir: temp_dir() }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join(LOG_SUBDIR)
    }

    /// Create a marker file in the log directory.
    pub fn touch_lock(&self, name: &str) -> PathBuf {
        let dir = self.log_dir();
        std::fs::create_dir_all(&dir).expect("Failed to create log dir");
        let path = dir.join(name);
        std::fs::write(&path, b"").expect("Failed to write lock file");
        path
    }

    /// `*.log.gz` files in the log directory, sorted by name.
    pub fn log_files(&self) -> Vec<PathBuf> {
        log_files(&self.log_dir())
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

/// A fake procfs tree with `exe` links and `cmdline` files.
pub struct FakeProc {
    dir: TempDir,
}

impl FakeProc {
    pub fn new() -> Self {
        Self { dir: temp_dir() }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Add a process entry. `argv` is written NUL-separated.
    pub fn process(self, pid: i32, exe: &str, argv: &[&str]) -> Self {
        let pid_dir = self.dir.path().join(pid.to_string());
        std::fs::create_dir_all(&pid_dir).expect("Failed to create pid dir");
        std::os::unix::fs::symlink(exe, pid_dir.join("exe")).expect("Failed to link exe");
        let mut cmdline = Vec::new();
        for arg in argv {
            cmdline.extend_from_slice(arg.as_bytes());
            cmdline.push(0);
        }
        std::fs::write(pid_dir.join("cmdline"), cmdline).expect("Failed to write cmdline");
        self
    }
}

impl Default for FakeProc {
    fn default() -> Self {
        Self::new()
    }
}

/// `*.log.gz` files directly inside `dir`, sorted by name.
pub fn log_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.to_string_lossy().ends_with(".log.gz"))
        .collect();
    files.sort();
    files
}

/// Decompress a log and return its complete lines.
///
/// Streams that were sync-flushed but never finished (an open sink, or one
/// discarded after fork) have no trailer; everything decoded before the
/// truncation is still returned.
pub fn read_gz_lines(path: &Path) -> Vec<String> {
    let file = File::open(path).expect("Failed to open log");
    let mut decoder = MultiGzDecoder::new(file);
    let mut bytes = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => bytes.extend_from_slice(&chunk[..n]),
        }
    }
    let text = String::from_utf8_lossy(&bytes);
    text.split_inclusive('\n')
        .filter(|line| line.ends_with('\n'))
        .map(|line| line.trim_end_matches('\n').to_string())
        .collect()
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(_) => {}
        }
    };
}
