//! Process identity resolution.
//!
//! The actor is derived from the basename of `/proc/<pid>/exe` and the
//! command line from `/proc/<pid>/cmdline`. Both are cached for the last pid
//! resolved, so a process pays for the lookups once and a forked child
//! resolves itself again on first use.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use nix::unistd::Pid;
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

/// Default upper bound on command line bytes read.
pub const DEFAULT_CMDLINE_LIMIT: usize = 4096;

const ACTOR_SCHEME: &str = "application://";
const ACTOR_SUFFIX: &str = ".desktop";
const DELETED_SUFFIX: &str = " (deleted)";

/// Appended to `<name>.desktop` to name the per-actor lock file.
pub const ACTOR_LOCK_SUFFIX: &str = ".lock";

/// Source of raw process information.
pub trait ProcessIntrospector: Send + Sync {
    /// Path of the executable backing `pid`.
    fn executable(&self, pid: Pid) -> io::Result<PathBuf>;

    /// At most `limit` bytes of the NUL-separated argument vector.
    fn cmdline(&self, pid: Pid, limit: usize) -> io::Result<Vec<u8>>;
}

/// Introspection through a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use a different mount point, e.g. a fake tree in tests.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry(&self, pid: Pid, name: &str) -> PathBuf {
        self.root.join(pid.as_raw().to_string()).join(name)
    }
}

impl ProcessIntrospector for ProcFs {
    fn executable(&self, pid: Pid) -> io::Result<PathBuf> {
        std::fs::read_link(self.entry(pid, "exe"))
    }

    fn cmdline(&self, pid: Pid, limit: usize) -> io::Result<Vec<u8>> {
        let file = File::open(self.entry(pid, "cmdline"))?;
        let mut buf = Vec::new();
        file.take(limit as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Placeholder actors for processes whose executable cannot be named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFallback {
    InvalidPid,
    UnreadableExecutable,
    UnnamedExecutable,
}

impl ActorFallback {
    fn label(self) -> &'static str {
        match self {
            Self::InvalidPid => "invalid-pid",
            Self::UnreadableExecutable => "unreadable-executable",
            Self::UnnamedExecutable => "unnamed-executable",
        }
    }

    pub fn actor(self) -> String {
        actor_from_name(self.label())
    }
}

/// Actor string and command line of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorIdentity {
    pub actor: String,
    pub cmdline: String,
}

impl ActorIdentity {
    /// `<name>.desktop`, the actor without its scheme.
    pub fn desktop_id(&self) -> &str {
        self.actor.strip_prefix(ACTOR_SCHEME).unwrap_or(&self.actor)
    }

    /// Name of the lock file that disables auditing for this actor.
    pub fn lock_file_name(&self) -> String {
        format!("{}{}", self.desktop_id(), ACTOR_LOCK_SUFFIX)
    }
}

#[derive(Debug)]
struct CachedIdentity {
    pid: Pid,
    identity: ActorIdentity,
}

/// Resolves and caches the identity of the calling process.
pub struct ActorResolver {
    introspector: Box<dyn ProcessIntrospector>,
    cmdline_limit: usize,
    cache: Mutex<Option<CachedIdentity>>,
}

/// Holds the resolver cache lock across `fork`.
#[must_use = "the cache is only protected while the guard is alive"]
pub struct ResolverForkGuard<'a> {
    _cache: MutexGuard<'a, Option<CachedIdentity>>,
}

impl std::fmt::Debug for ActorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorResolver")
            .field("cmdline_limit", &self.cmdline_limit)
            .field("cache", &*self.cache.lock())
            .finish_non_exhaustive()
    }
}

impl ActorResolver {
    /// Resolver reading the real `/proc`.
    pub fn new(cmdline_limit: usize) -> Self {
        Self::with_introspector(ProcFs::new(), cmdline_limit)
    }

    pub fn with_introspector(
        introspector: impl ProcessIntrospector + 'static,
        cmdline_limit: usize,
    ) -> Self {
        Self {
            introspector: Box::new(introspector),
            cmdline_limit,
            cache: Mutex::new(None),
        }
    }

    /// Identity of `pid`, served from cache when `pid` was the last one
    /// resolved.
    pub fn resolve(&self, pid: Pid) -> ActorIdentity {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref().filter(|c| c.pid == pid) {
            return cached.identity.clone();
        }

        let identity = ActorIdentity {
            actor: self.actor_for(pid),
            cmdline: self.cmdline_for(pid),
        };
        *cache = Some(CachedIdentity {
            pid,
            identity: identity.clone(),
        });
        identity
    }

    pub fn cached_pid(&self) -> Option<Pid> {
        self.cache.lock().as_ref().map(|c| c.pid)
    }

    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    pub fn lock_for_fork(&self) -> ResolverForkGuard<'_> {
        ResolverForkGuard {
            _cache: self.cache.lock(),
        }
    }

    fn actor_for(&self, pid: Pid) -> String {
        if pid.as_raw() <= 0 {
            return ActorFallback::InvalidPid.actor();
        }
        let exe = match self.introspector.executable(pid) {
            Ok(exe) => exe,
            Err(e) => {
                trace!(pid = pid.as_raw(), error = %e, "cannot read executable link");
                return ActorFallback::UnreadableExecutable.actor();
            }
        };
        match executable_name(&exe) {
            Some(name) => actor_from_name(&name),
            None => ActorFallback::UnnamedExecutable.actor(),
        }
    }

    fn cmdline_for(&self, pid: Pid) -> String {
        if pid.as_raw() <= 0 {
            return "(invalid pid)".to_string();
        }
        match self.introspector.cmdline(pid, self.cmdline_limit) {
            Ok(raw) => flatten_cmdline(&raw),
            Err(e) => {
                trace!(pid = pid.as_raw(), error = %e, "cannot read command line");
                format!("(unreadable cmdline: {})", e.kind())
            }
        }
    }
}

fn actor_from_name(name: &str) -> String {
    format!("{ACTOR_SCHEME}{name}{ACTOR_SUFFIX}")
}

fn executable_name(exe: &Path) -> Option<String> {
    let name = exe.file_name()?.to_string_lossy();
    let name = name.strip_suffix(DELETED_SUFFIX).unwrap_or(&name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Turn the NUL-separated argument vector into one printable line.
fn flatten_cmdline(raw: &[u8]) -> String {
    let text: String = String::from_utf8_lossy(raw)
        .chars()
        .map(|c| if c == '\0' || c == '\n' { ' ' } else { c })
        .collect();
    text.trim_end_matches(' ').to_string()
}
