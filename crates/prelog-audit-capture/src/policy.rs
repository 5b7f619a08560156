//! Relevance filtering.
//!
//! Every predicate here is pure: callers pass the effective uid, the path as
//! the host process supplied it, and the base directory a relative path is
//! resolved against. Nothing touches the filesystem.

use std::path::{Component, Path, PathBuf};

use libc::c_int;

/// Default lowest effective uid that gets audited.
pub const DEFAULT_UID_FLOOR: u32 = 1000;

/// Coarse classification used by the interest filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Under `/home/` or under the current user's home directory.
    Home,
    /// Under a configured temporary directory.
    Temp,
    /// Non-empty and not starting with `/`.
    Relative,
    /// Anything else, including the empty path.
    Other,
}

/// A path argument together with the directory it is relative to.
#[derive(Debug, Clone, Copy)]
pub struct PathRef<'a> {
    /// Path exactly as the caller passed it.
    pub path: &'a str,
    /// Base for relative paths: the cwd, or `/proc/self/fd/<dirfd>`.
    pub base: Option<&'a Path>,
}

impl<'a> PathRef<'a> {
    /// A path with no known base.
    pub fn new(path: &'a str) -> Self {
        Self { path, base: None }
    }

    /// Attach the base directory used to resolve a relative path.
    pub fn relative_to(mut self, base: &'a Path) -> Self {
        self.base = Some(base);
        self
    }

    /// Absolute, lexically normalized form, when one can be derived.
    pub fn resolved(&self) -> Option<PathBuf> {
        if self.path.is_empty() {
            return None;
        }
        let path = Path::new(self.path);
        if path.is_absolute() {
            Some(normalize(path))
        } else {
            self.base.map(|base| normalize(base.join(path)))
        }
    }
}

/// Inputs for the open/create and stream-open decision.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    /// Effective uid of the caller.
    pub euid: u32,
    /// Target path.
    pub target: PathRef<'a>,
    /// `O_*` flags, or the translation of a stream mode.
    pub flags: c_int,
    /// Whether the operation is creating by definition (`creat`, `mkdir`, ...).
    pub creates: bool,
    /// errno of the original call, `None` on success.
    pub errno: Option<c_int>,
    /// Command-spawning stream open (`popen`): only the uid floor applies.
    pub command: bool,
}

impl<'a> OpenRequest<'a> {
    pub fn new(euid: u32, target: PathRef<'a>, flags: c_int) -> Self {
        Self {
            euid,
            target,
            flags,
            creates: false,
            errno: None,
            command: false,
        }
    }

    pub fn creating(mut self, creates: bool) -> Self {
        self.creates = creates;
        self
    }

    pub fn with_errno(mut self, errno: Option<c_int>) -> Self {
        self.errno = errno;
        self
    }

    pub fn command(mut self) -> Self {
        self.command = true;
        self
    }
}

/// Decides which operations are worth recording.
#[derive(Debug, Clone)]
pub struct RelevancePolicy {
    uid_floor: u32,
    home: Option<PathBuf>,
    temp_dirs: Vec<PathBuf>,
    forbidden: Vec<PathBuf>,
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_UID_FLOOR)
    }
}

impl RelevancePolicy {
    /// Policy with the given uid floor, `/tmp` as the only temp directory
    /// and nothing forbidden.
    pub fn new(uid_floor: u32) -> Self {
        Self {
            uid_floor,
            home: None,
            temp_dirs: vec![PathBuf::from("/tmp")],
            forbidden: Vec::new(),
        }
    }

    /// Set the user's home. `$HOME/.cache` becomes forbidden.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        let home = normalize(home.into());
        self.forbidden.push(home.join(".cache"));
        self.home = Some(home);
        self
    }

    /// Forbid the audit log directory so the shim never records its own writes.
    pub fn with_log_dir(self, log_dir: impl Into<PathBuf>) -> Self {
        self.forbid(log_dir)
    }

    /// Add another temporary directory (e.g. `$TMPDIR`).
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = normalize(dir.into());
        if dir.is_absolute() && !self.temp_dirs.contains(&dir) {
            self.temp_dirs.push(dir);
        }
        self
    }

    /// Add a forbidden directory prefix.
    pub fn forbid(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = normalize(dir.into());
        if dir.is_absolute() && !self.forbidden.contains(&dir) {
            self.forbidden.push(dir);
        }
        self
    }

    /// Service accounts below the floor are never audited.
    pub fn clears_privilege_floor(&self, euid: u32) -> bool {
        euid >= self.uid_floor
    }

    pub fn classify(&self, path: &str) -> PathClass {
        if path.is_empty() {
            return PathClass::Other;
        }
        if !path.starts_with('/') {
            return PathClass::Relative;
        }
        let path = normalize(path);
        if is_strictly_under(&path, Path::new("/home"))
            || self.home.as_deref().is_some_and(|home| is_strictly_under(&path, home))
        {
            return PathClass::Home;
        }
        if self.temp_dirs.iter().any(|dir| is_strictly_under(&path, dir)) {
            return PathClass::Temp;
        }
        PathClass::Other
    }

    /// Paths under home, under a temp directory, or relative.
    pub fn is_interesting(&self, path: &str) -> bool {
        self.classify(path) != PathClass::Other
    }

    /// Paths inside the log directory or the user's cache. Relative paths
    /// without a base cannot be placed and are not treated as forbidden.
    pub fn is_forbidden(&self, target: PathRef<'_>) -> bool {
        match target.resolved() {
            Some(path) => self.forbidden.iter().any(|dir| path.starts_with(dir)),
            None => false,
        }
    }

    /// open, openat, creat, mkdir, mkfifo, fopen, freopen, popen.
    pub fn should_log_open(&self, request: &OpenRequest<'_>) -> bool {
        if !self.clears_privilege_floor(request.euid) {
            return false;
        }
        if request.command {
            return true;
        }
        let exists = request.creates || request.errno != Some(libc::ENOENT);
        exists
            && (is_write_intent(request.flags) || self.is_interesting(request.target.path))
            && !self.is_forbidden(request.target)
    }

    /// link, symlink, rename and their *at variants.
    pub fn should_log_pair(&self, euid: u32, old: PathRef<'_>, new: PathRef<'_>) -> bool {
        self.clears_privilege_floor(euid)
            && (self.is_interesting(old.path) || self.is_interesting(new.path))
            && !(self.is_forbidden(old) || self.is_forbidden(new))
    }

    /// unlink, rmdir, remove.
    pub fn should_log_removal(&self, euid: u32, target: PathRef<'_>) -> bool {
        self.clears_privilege_floor(euid) && !self.is_forbidden(target)
    }

    /// opendir.
    pub fn should_log_opendir(&self, euid: u32, target: PathRef<'_>) -> bool {
        self.clears_privilege_floor(euid)
            && self.is_interesting(target.path)
            && !self.is_forbidden(target)
    }

    /// socket and socketpair: local-domain only.
    pub fn should_log_socket(&self, euid: u32, domain: c_int) -> bool {
        self.clears_privilege_floor(euid) && domain == libc::AF_UNIX
    }

    /// pipe, pipe2, shm_open, shm_unlink, fork.
    pub fn should_log_process_event(&self, euid: u32) -> bool {
        self.clears_privilege_floor(euid)
    }
}

/// Open flags requesting write access.
pub fn is_write_intent(flags: c_int) -> bool {
    flags & (libc::O_WRONLY | libc::O_RDWR) != 0
}

/// Map a stdio mode string to the equivalent `O_*` flags.
///
/// Only the first character and the presence of `+` matter; modifiers such
/// as `b`, `e`, `x` or `ccs=` are ignored.
pub fn translate_fopen_mode(mode: &str) -> c_int {
    let update = mode.contains('+');
    let base = match mode.as_bytes().first() {
        Some(b'w') => libc::O_CREAT | libc::O_TRUNC,
        Some(b'a') => libc::O_CREAT | libc::O_APPEND,
        _ => 0,
    };
    let access = match (mode.as_bytes().first(), update) {
        (_, true) => libc::O_RDWR,
        (Some(b'w' | b'a'), false) => libc::O_WRONLY,
        _ => libc::O_RDONLY,
    };
    base | access
}

/// Normalize a path by resolving `.` and `..` without hitting the filesystem.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut components = Vec::new();

    for component in path.as_ref().components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => {
                components.clear();
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(Component::ParentDir),
            },
            Component::Normal(c) => components.push(Component::Normal(c)),
        }
    }

    if components.is_empty() {
        PathBuf::from(".")
    } else {
        components.iter().collect()
    }
}

fn is_strictly_under(path: &Path, dir: &Path) -> bool {
    path != dir && path.starts_with(dir)
}
