//! The audit service behind the exported wrappers.
//!
//! Each `on_*` method receives the arguments and the outcome of a call that
//! has already completed, decides whether it is worth recording, builds the
//! event and updates the handle registry. Nothing here calls the original
//! implementations or touches errno; that is the wrapper's job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libc::{c_int, mode_t, pid_t};
use prelog_audit_capture::{
    translate_fopen_mode, ActorResolver, HandleKind, HandleRegistry, OpenRequest, PathRef,
    RegistryForkGuard, RelevancePolicy, ResolverForkGuard,
};
use prelog_audit_sink::{AuditSink, InsertOutcome, SinkForkGuard, SinkSettings};
use prelog_audit_types::{Event, Interpretation, Subject};
use prelog_common_config::ShimConfig;
use prelog_common_log::spans;
use tracing::{debug, trace, warn};

use crate::context::{ProcessContext, SystemContext};
use crate::outcome;

/// A path argument and the directory descriptor it is relative to.
#[derive(Debug, Clone, Copy)]
pub struct PathArg<'a> {
    /// `None` for calls without a directory argument.
    pub dirfd: Option<c_int>,
    pub path: &'a str,
}

impl<'a> PathArg<'a> {
    /// Relative to the working directory.
    pub fn cwd(path: &'a str) -> Self {
        Self { dirfd: None, path }
    }

    /// Relative to `dirfd`; `AT_FDCWD` and other negative values mean the
    /// working directory.
    pub fn at(dirfd: c_int, path: &'a str) -> Self {
        Self {
            dirfd: Some(dirfd),
            path,
        }
    }

    fn directory(&self) -> Option<c_int> {
        self.dirfd.filter(|fd| *fd >= 0)
    }
}

/// A completed call from the open/create family.
#[derive(Debug, Clone, Copy)]
pub struct OpenCall<'a> {
    pub interpretation: Interpretation,
    pub target: PathArg<'a>,
    pub flags: c_int,
    /// Creating by definition, whatever the flags say.
    pub creates: bool,
    /// Returned descriptor, or the return code for mkdir and mkfifo.
    pub ret: c_int,
}

/// All three capture locks, held across `fork`.
#[must_use = "the capture state is only protected while the barrier is alive"]
pub struct ForkBarrier<'a> {
    _registry: RegistryForkGuard<'a>,
    _sink: SinkForkGuard<'a>,
    _resolver: ResolverForkGuard<'a>,
}

/// Records intercepted operations into the audit sink.
pub struct Auditor {
    policy: RelevancePolicy,
    registry: Arc<HandleRegistry>,
    sink: Arc<AuditSink>,
    context: Box<dyn ProcessContext>,
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("policy", &self.policy)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

impl Auditor {
    pub fn new(
        policy: RelevancePolicy,
        registry: Arc<HandleRegistry>,
        sink: Arc<AuditSink>,
        context: impl ProcessContext + 'static,
    ) -> Self {
        Self {
            policy,
            registry,
            sink,
            context: Box::new(context),
        }
    }

    /// Build the process-wide auditor from resolved configuration.
    pub fn from_config(config: &ShimConfig, exit_hook: Option<extern "C" fn()>) -> Self {
        let settings = SinkSettings::from_config(config);
        let settings = match exit_hook {
            Some(hook) => settings.with_exit_hook(hook),
            None => settings,
        };

        let mut policy = RelevancePolicy::new(config.uid_floor);
        if let Some(home) = &config.home {
            policy = policy.with_home(home);
        }
        if let Some(log_dir) = &settings.log_dir {
            policy = policy.with_log_dir(log_dir);
        }
        for dir in &config.temp_dirs {
            policy = policy.with_temp_dir(dir);
        }

        let resolver = Arc::new(ActorResolver::new(config.cmdline_limit));
        Self::new(
            policy,
            Arc::new(HandleRegistry::new()),
            Arc::new(AuditSink::new(settings, resolver)),
            SystemContext,
        )
    }

    pub fn policy(&self) -> &RelevancePolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn sink(&self) -> &Arc<AuditSink> {
        &self.sink
    }

    /// open, open64, openat, openat64, creat, mkfifo, mkfifoat, mkdir, mkdirat.
    pub fn on_open(&self, call: OpenCall<'_>, errno: c_int) {
        let failed = call.ret < 0;
        let base = self.base(call.target);
        let request = OpenRequest::new(
            self.context.euid(),
            path_ref(call.target, base.as_deref()),
            call.flags,
        )
        .creating(call.creates || call.flags & libc::O_CREAT != 0)
        .with_errno(failed.then_some(errno));
        if !self.policy.should_log_open(&request) {
            return;
        }

        let text = outcome::open_text(call.ret, call.flags, errno);
        self.record(Event::new(call.interpretation).with_subject(self.path_subject(call.target, text)));

        if produces_descriptor(call.interpretation) {
            if let Ok(fd) = usize::try_from(call.ret) {
                self.registry.track(HandleKind::Descriptor, fd);
            }
        }
    }

    /// fopen, freopen with a path, popen.
    pub fn on_stream_open(
        &self,
        interpretation: Interpretation,
        path: &str,
        mode: &str,
        stream: usize,
        errno: c_int,
    ) {
        let failed = stream == 0;
        let flags = translate_fopen_mode(mode);
        let target = PathArg::cwd(path);
        let base = self.base(target);
        let mut request = OpenRequest::new(self.context.euid(), path_ref(target, base.as_deref()), flags)
            .creating(flags & libc::O_CREAT != 0)
            .with_errno(failed.then_some(errno));
        if interpretation == Interpretation::Popen {
            request = request.command();
        }
        if !self.policy.should_log_open(&request) {
            return;
        }

        let text = outcome::stream_open_text(stream, flags, errno);
        self.record(Event::new(interpretation).with_subject(self.path_subject(target, text)));
        if !failed {
            self.registry.track(HandleKind::Stream, stream);
        }
    }

    /// freopen. The previous stream is closed by the call whether or not it
    /// succeeds; a `None` path only changes the mode of the same file.
    pub fn on_freopen(
        &self,
        path: Option<&str>,
        mode: &str,
        previous: usize,
        stream: usize,
        errno: c_int,
    ) {
        let was_tracked = self.registry.untrack_one(HandleKind::Stream, previous);
        match path {
            Some(path) => self.on_stream_open(Interpretation::Freopen, path, mode, stream, errno),
            None if was_tracked && stream != 0 => self.registry.track(HandleKind::Stream, stream),
            None => {}
        }
    }

    /// fdopen: the stream takes over a tracked descriptor.
    pub fn on_fdopen(&self, fd: c_int, mode: &str, stream: usize, errno: c_int) {
        let Some(descriptor) = self.tracked_descriptor(fd) else {
            return;
        };
        let failed = stream == 0;
        if !failed {
            self.registry.track(HandleKind::Stream, stream);
            self.registry.untrack_one(HandleKind::Descriptor, descriptor);
        }
        if !self.policy.clears_privilege_floor(self.context.euid()) {
            return;
        }

        let flags = translate_fopen_mode(mode);
        let event = Event::new(Interpretation::Fdopen)
            .with_subject(label_subject(outcome::descriptor_label(fd), ""))
            .with_subject(label_subject(
                outcome::new_stream_label(stream),
                outcome::flag_text(flags, failed, errno),
            ));
        self.record(event);
    }

    /// dup, dup2, dup3. `newfd` is the requested target, or the result for
    /// plain dup.
    pub fn on_dup(
        &self,
        interpretation: Interpretation,
        oldfd: c_int,
        newfd: c_int,
        ret: c_int,
        errno: c_int,
    ) {
        let tracked = self.tracked_descriptor(oldfd).is_some();

        // The target's previous file, if any, was closed by the call.
        if let Ok(new) = usize::try_from(ret) {
            if ret != oldfd {
                self.registry.untrack_one(HandleKind::Descriptor, new);
                if tracked {
                    self.registry.track(HandleKind::Descriptor, new);
                }
            }
        }

        if !tracked || !self.policy.clears_privilege_floor(self.context.euid()) {
            return;
        }
        let event = Event::new(interpretation)
            .with_subject(label_subject(outcome::descriptor_label(oldfd), "Old fd"))
            .with_subject(label_subject(
                outcome::descriptor_label(newfd),
                outcome::duplicate_text(ret < 0, errno),
            ));
        self.record(event);
    }

    /// link, linkat, symlink, symlinkat.
    pub fn on_link(
        &self,
        interpretation: Interpretation,
        old: PathArg<'_>,
        new: PathArg<'_>,
        flags: c_int,
        ret: c_int,
        errno: c_int,
    ) {
        if !self.should_log_pair(old, new) {
            return;
        }
        let event = Event::new(interpretation)
            .with_subject(self.path_subject(old, String::new()))
            .with_subject(self.path_subject(new, outcome::flag_text(flags, ret < 0, errno)));
        self.record(event);
    }

    /// rename, renameat, renameat2.
    pub fn on_rename(
        &self,
        interpretation: Interpretation,
        old: PathArg<'_>,
        new: PathArg<'_>,
        flags: u32,
        ret: c_int,
        errno: c_int,
    ) {
        if !self.should_log_pair(old, new) {
            return;
        }
        let event = Event::new(interpretation)
            .with_subject(self.path_subject(old, "Old file".to_string()))
            .with_subject(self.path_subject(new, outcome::rename_text(flags, ret < 0, errno)));
        self.record(event);
    }

    /// unlink, rmdir, remove.
    pub fn on_remove(&self, interpretation: Interpretation, path: &str, ret: c_int, errno: c_int) {
        let target = PathArg::cwd(path);
        let base = self.base(target);
        if !self
            .policy
            .should_log_removal(self.context.euid(), path_ref(target, base.as_deref()))
        {
            return;
        }
        let text = outcome::error_code(ret < 0, errno);
        self.record(Event::new(interpretation).with_subject(self.path_subject(target, text)));
    }

    /// close: only descriptors this process decided to follow are logged.
    pub fn on_close(&self, fd: c_int, ret: c_int, errno: c_int) {
        let Ok(handle) = usize::try_from(fd) else {
            return;
        };
        self.on_handle_close(
            Interpretation::Close,
            HandleKind::Descriptor,
            handle,
            outcome::descriptor_label(fd),
            ret,
            errno,
        );
    }

    /// fclose, pclose.
    pub fn on_stream_close(
        &self,
        interpretation: Interpretation,
        stream: usize,
        ret: c_int,
        errno: c_int,
    ) {
        self.on_handle_close(
            interpretation,
            HandleKind::Stream,
            stream,
            outcome::stream_label(stream),
            ret,
            errno,
        );
    }

    pub fn on_closedir(&self, dir: usize, ret: c_int, errno: c_int) {
        self.on_handle_close(
            Interpretation::Closedir,
            HandleKind::Directory,
            dir,
            outcome::directory_label(dir),
            ret,
            errno,
        );
    }

    pub fn on_opendir(&self, path: &str, dir: usize, errno: c_int) {
        let target = PathArg::cwd(path);
        let base = self.base(target);
        if !self
            .policy
            .should_log_opendir(self.context.euid(), path_ref(target, base.as_deref()))
        {
            return;
        }
        let text = outcome::directory_open_text(dir, errno);
        self.record(Event::new(Interpretation::Opendir).with_subject(self.path_subject(target, text)));
        if dir != 0 {
            self.registry.track(HandleKind::Directory, dir);
        }
    }

    /// fdopendir: the directory stream takes over a tracked descriptor.
    pub fn on_fdopendir(&self, fd: c_int, dir: usize, errno: c_int) {
        let Some(descriptor) = self.tracked_descriptor(fd) else {
            return;
        };
        if dir != 0 {
            self.registry.track(HandleKind::Directory, dir);
            self.registry.untrack_one(HandleKind::Descriptor, descriptor);
        }
        if !self.policy.clears_privilege_floor(self.context.euid()) {
            return;
        }
        let event = Event::new(Interpretation::Fdopendir)
            .with_subject(label_subject(outcome::descriptor_label(fd), ""))
            .with_subject(label_subject(
                outcome::new_directory_label(dir),
                outcome::error_code(dir == 0, errno),
            ));
        self.record(event);
    }

    /// Parent side of fork, or a failed fork.
    pub fn on_fork(&self, child: pid_t, errno: c_int) {
        if !self.policy.should_log_process_event(self.context.euid()) {
            return;
        }
        let event = Event::new(Interpretation::Fork).with_subject(label_subject(
            format!("pid {child}"),
            outcome::error_code(child < 0, errno),
        ));
        self.record(event);
    }

    /// Take the registry, sink and resolver locks, in that order.
    pub fn lock_for_fork(&self) -> ForkBarrier<'_> {
        ForkBarrier {
            _registry: self.registry.lock_for_fork(),
            _sink: self.sink.lock_for_fork(),
            _resolver: self.sink.resolver().lock_for_fork(),
        }
    }

    /// Child side of fork, after the barrier is released.
    pub fn after_fork_child(&self) {
        self.sink.reset_for_fork();
    }

    pub fn on_socket(&self, domain: c_int, kind: c_int, protocol: c_int, ret: c_int, errno: c_int) {
        if !self.policy.should_log_socket(self.context.euid(), domain) {
            return;
        }
        let text = outcome::socket_text(ret, domain, kind, protocol, ret < 0, errno);
        self.record(Event::new(Interpretation::Socket).with_subject(label_subject("socket", text)));
        if let Ok(fd) = usize::try_from(ret) {
            self.registry.track(HandleKind::Descriptor, fd);
        }
    }

    /// socketpair: `Ok` carries both ends, `Err` the errno.
    pub fn on_socketpair(
        &self,
        domain: c_int,
        kind: c_int,
        protocol: c_int,
        result: Result<[c_int; 2], c_int>,
    ) {
        if !self.policy.should_log_socket(self.context.euid(), domain) {
            return;
        }
        let event = match result {
            // The vector itself was bad; nothing meaningful to report.
            Err(libc::EFAULT) => return,
            Err(errno) => Event::new(Interpretation::Socketpair)
                .with_subject(label_subject("socket", ""))
                .with_subject(label_subject(
                    "socket",
                    outcome::socket_text(-1, domain, kind, protocol, true, errno),
                )),
            Ok([first, second]) => {
                for fd in [first, second] {
                    if let Ok(fd) = usize::try_from(fd) {
                        self.registry.track(HandleKind::Descriptor, fd);
                    }
                }
                Event::new(Interpretation::Socketpair)
                    .with_subject(label_subject(format!("socket {first}"), ""))
                    .with_subject(label_subject(
                        format!("socket {second}"),
                        outcome::socket_text(second, domain, kind, protocol, false, 0),
                    ))
            }
        };
        self.record(event);
    }

    /// pipe, pipe2. Only successful calls are recorded.
    pub fn on_pipe(&self, interpretation: Interpretation, fds: Option<[c_int; 2]>) {
        let Some([read, write]) = fds else {
            return;
        };
        if !self.policy.should_log_process_event(self.context.euid()) {
            return;
        }
        let event = Event::new(interpretation)
            .with_subject(label_subject(format!("read fd {read}"), ""))
            .with_subject(label_subject(format!("write fd {write}"), ""));
        self.record(event);
        for fd in [read, write] {
            if let Ok(fd) = usize::try_from(fd) {
                self.registry.track(HandleKind::Descriptor, fd);
            }
        }
    }

    pub fn on_shm_open(&self, name: &str, flags: c_int, mode: mode_t, ret: c_int, errno: c_int) {
        if !self.policy.should_log_process_event(self.context.euid()) {
            return;
        }
        let text = outcome::shm_open_text(ret, flags, mode, errno);
        self.record(Event::new(Interpretation::ShmOpen).with_subject(label_subject(name, text)));
        if let Ok(fd) = usize::try_from(ret) {
            self.registry.track(HandleKind::Descriptor, fd);
        }
    }

    pub fn on_shm_unlink(&self, name: &str, ret: c_int, errno: c_int) {
        if !self.policy.should_log_process_event(self.context.euid()) {
            return;
        }
        let text = outcome::shm_unlink_text(ret < 0, errno);
        self.record(Event::new(Interpretation::ShmUnlink).with_subject(label_subject(name, text)));
    }

    /// Flush and close the log for good.
    pub fn shutdown(&self) {
        if let Err(e) = self.sink.shutdown() {
            warn!(error = %e, "closing audit log failed");
        }
    }

    fn on_handle_close(
        &self,
        interpretation: Interpretation,
        kind: HandleKind,
        handle: usize,
        label: String,
        ret: c_int,
        errno: c_int,
    ) {
        if !self.registry.untrack_one(kind, handle) {
            return;
        }
        if !self.policy.clears_privilege_floor(self.context.euid()) {
            return;
        }
        let text = outcome::error_code(ret < 0, errno);
        self.record(Event::new(interpretation).with_subject(label_subject(label, text)));
    }

    fn should_log_pair(&self, old: PathArg<'_>, new: PathArg<'_>) -> bool {
        let old_base = self.base(old);
        let new_base = self.base(new);
        self.policy.should_log_pair(
            self.context.euid(),
            path_ref(old, old_base.as_deref()),
            path_ref(new, new_base.as_deref()),
        )
    }

    fn tracked_descriptor(&self, fd: c_int) -> Option<usize> {
        usize::try_from(fd)
            .ok()
            .filter(|handle| self.registry.is_tracked(HandleKind::Descriptor, *handle))
    }

    /// Directory a relative path in `target` is resolved against.
    fn base(&self, target: PathArg<'_>) -> Option<PathBuf> {
        if target.path.starts_with('/') {
            return None;
        }
        match target.directory() {
            Some(fd) => self.context.descriptor_path(fd),
            None => self.context.cwd(),
        }
    }

    /// Subject for a path argument. Relative paths carry their origin: the
    /// working directory, or the directory descriptor they were given with.
    fn path_subject(&self, target: PathArg<'_>, text: String) -> Subject {
        let origin = if target.path.starts_with('/') {
            None
        } else {
            match target.directory() {
                Some(fd) => Some(outcome::dirfd_origin(fd)),
                None => self.context.cwd().map(|cwd| cwd.display().to_string()),
            }
        };
        Subject::new()
            .with_uri(target.path)
            .with_text(text)
            .with_origin_opt(origin)
    }

    fn record(&self, event: Event) {
        let Some(interpretation) = event.interpretation else {
            return;
        };
        let span = spans::audit_span(interpretation.as_str());
        let _enter = span.enter();

        match self.sink.insert_event_as(event, self.context.pid()) {
            InsertOutcome::Written => trace!("event written"),
            InsertOutcome::Suppressed(decision) => debug!(%decision, "event suppressed"),
            other => debug!(outcome = ?other, "event dropped"),
        }
    }
}

fn path_ref<'a>(target: PathArg<'a>, base: Option<&'a Path>) -> PathRef<'a> {
    match base {
        Some(base) => PathRef::new(target.path).relative_to(base),
        None => PathRef::new(target.path),
    }
}

fn label_subject(uri: impl Into<String>, text: impl Into<String>) -> Subject {
    Subject::new().with_uri(uri).with_text(text)
}

/// Calls whose return value is a new descriptor.
fn produces_descriptor(interpretation: Interpretation) -> bool {
    matches!(
        interpretation,
        Interpretation::Open
            | Interpretation::Open64
            | Interpretation::Openat
            | Interpretation::Openat64
            | Interpretation::Creat
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use nix::unistd::Pid;
    use prelog_audit_capture::ProcFs;
    use prelog_test_utils::{read_gz_lines, FakeProc, TestHome};

    const PID: i32 = 4200;
    const USER: u32 = 1000;

    struct FakeContext {
        euid: u32,
        cwd: PathBuf,
        dirs: HashMap<c_int, PathBuf>,
    }

    impl ProcessContext for FakeContext {
        fn euid(&self) -> u32 {
            self.euid
        }

        fn pid(&self) -> Pid {
            Pid::from_raw(PID)
        }

        fn cwd(&self) -> Option<PathBuf> {
            Some(self.cwd.clone())
        }

        fn descriptor_path(&self, fd: c_int) -> Option<PathBuf> {
            self.dirs.get(&fd).cloned()
        }
    }

    struct Fixture {
        home: TestHome,
        _proc: FakeProc,
        auditor: Auditor,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_euid(USER)
        }

        fn with_euid(euid: u32) -> Self {
            let home = TestHome::new();
            let proc_fs = FakeProc::new().process(PID, "/usr/bin/gedit", &["gedit", "notes.txt"]);
            let resolver = ActorResolver::with_introspector(ProcFs::with_root(proc_fs.root()), 4096);
            let sink = AuditSink::new(
                SinkSettings::default().with_log_dir(home.log_dir()),
                Arc::new(resolver),
            );
            let policy = RelevancePolicy::new(1000)
                .with_home("/home/u")
                .with_log_dir(home.log_dir());
            let context = FakeContext {
                euid,
                cwd: PathBuf::from("/home/u"),
                dirs: HashMap::from([(9, PathBuf::from("/home/u/.cache"))]),
            };
            let auditor = Auditor::new(policy, Arc::new(HandleRegistry::new()), Arc::new(sink), context);
            Self {
                home,
                _proc: proc_fs,
                auditor,
            }
        }

        /// Event lines written so far, without the header and timestamps.
        fn events(&self) -> Vec<String> {
            self.auditor.shutdown();
            let Some(file) = self.home.log_files().into_iter().next() else {
                return Vec::new();
            };
            read_gz_lines(&file)
                .into_iter()
                .skip(1)
                .map(|line| line.split_once('|').map(|(_, rest)| rest.to_string()).unwrap_or(line))
                .collect()
        }

        fn descriptors(&self) -> Vec<usize> {
            self.auditor.registry().snapshot(HandleKind::Descriptor)
        }
    }

    fn open(path: &str, flags: c_int, ret: c_int) -> OpenCall<'_> {
        OpenCall {
            interpretation: Interpretation::Open,
            target: PathArg::cwd(path),
            flags,
            creates: false,
            ret,
        }
    }

    #[test]
    fn test_open_write_in_home() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/doc.txt", libc::O_WRONLY, 3), 0);
        assert_eq!(fx.descriptors(), vec![3]);
        assert_eq!(fx.events(), vec!["open|/home/u/doc.txt|fd 3: with flag 1, e0|"]);
    }

    #[test]
    fn test_open_below_floor_records_nothing() {
        let fx = Fixture::with_euid(999);
        fx.auditor.on_open(open("/home/u/doc.txt", libc::O_WRONLY, 3), 0);
        assert!(fx.descriptors().is_empty());
        assert!(fx.home.log_files().is_empty());
    }

    #[test]
    fn test_open_missing_file_is_dropped() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/nope", libc::O_RDONLY, -1), libc::ENOENT);
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_open_failure_is_recorded_but_not_tracked() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/secret", libc::O_RDONLY, -1), libc::EACCES);
        assert!(fx.descriptors().is_empty());
        assert_eq!(fx.events(), vec!["open|/home/u/secret|fd -1: with flag 0, e13|"]);
    }

    #[test]
    fn test_open_relative_carries_origin() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("notes.txt", libc::O_RDONLY, 4), 0);
        assert_eq!(fx.events(), vec!["open|notes.txt|fd 4: with flag 0, e0|/home/u"]);
    }

    #[test]
    fn test_openat_relative_to_forbidden_directory() {
        let fx = Fixture::new();
        let call = OpenCall {
            interpretation: Interpretation::Openat,
            target: PathArg::at(9, "thumb.png"),
            flags: libc::O_WRONLY | libc::O_CREAT,
            creates: false,
            ret: 5,
        };
        fx.auditor.on_open(call, 0);
        assert!(fx.descriptors().is_empty());
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_openat_origin_names_the_descriptor() {
        let fx = Fixture::new();
        let call = OpenCall {
            interpretation: Interpretation::Openat,
            target: PathArg::at(7, "doc.txt"),
            flags: libc::O_RDONLY,
            creates: false,
            ret: 5,
        };
        fx.auditor.on_open(call, 0);
        assert_eq!(fx.events(), vec!["openat|doc.txt|fd 5: with flag 0, e0|fd: 7"]);
    }

    #[test]
    fn test_mkdir_is_not_tracked() {
        let fx = Fixture::new();
        let call = OpenCall {
            interpretation: Interpretation::Mkdir,
            target: PathArg::cwd("/home/u/new"),
            flags: libc::O_CREAT,
            creates: true,
            ret: 0,
        };
        fx.auditor.on_open(call, 0);
        assert!(fx.descriptors().is_empty());
        assert_eq!(fx.events(), vec!["mkdir|/home/u/new|fd 0: with flag 64, e0|"]);
    }

    #[test]
    fn test_log_dir_writes_are_never_recorded() {
        let fx = Fixture::new();
        let inside = fx.home.log_dir().join("x.log.gz");
        let inside = inside.to_string_lossy();
        fx.auditor.on_open(open(&inside, libc::O_WRONLY | libc::O_CREAT, 3), 0);
        assert!(fx.descriptors().is_empty());
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_close_of_untracked_descriptor_is_silent() {
        let fx = Fixture::new();
        fx.auditor.on_close(42, 0, 0);
        assert!(fx.home.log_files().is_empty());
    }

    #[test]
    fn test_close_of_tracked_descriptor() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/doc.txt", libc::O_RDWR, 3), 0);
        fx.auditor.on_close(3, 0, 0);
        fx.auditor.on_close(3, -1, libc::EBADF);
        assert_eq!(
            fx.events(),
            vec!["open|/home/u/doc.txt|fd 3: with flag 2, e0|", "close|fd: 3|e0|"]
        );
    }

    #[test]
    fn test_fopen_and_fclose() {
        let fx = Fixture::new();
        fx.auditor
            .on_stream_open(Interpretation::Fopen, "/home/u/a.txt", "w", 0x5000, 0);
        fx.auditor.on_stream_close(Interpretation::Fclose, 0x5000, 0, 0);
        fx.auditor.on_stream_close(Interpretation::Fclose, 0x6000, 0, 0);
        assert_eq!(
            fx.events(),
            vec![
                "fopen|/home/u/a.txt|FILE 0x5000: with flag 577, e0|",
                "fclose|FILE: 0x5000|e0|",
            ]
        );
    }

    #[test]
    fn test_fopen_of_missing_file_for_reading_is_dropped() {
        let fx = Fixture::new();
        fx.auditor
            .on_stream_open(Interpretation::Fopen, "/home/u/none", "r", 0, libc::ENOENT);
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_popen_is_a_command() {
        let fx = Fixture::new();
        fx.auditor
            .on_stream_open(Interpretation::Popen, "ls /etc", "r", 0x7000, 0);
        assert_eq!(
            fx.events(),
            vec!["popen|ls /etc|FILE 0x7000: with flag 0, e0|/home/u"]
        );
        assert!(fx.auditor.registry().is_tracked(HandleKind::Stream, 0x7000));
    }

    #[test]
    fn test_freopen_replaces_tracked_stream() {
        let fx = Fixture::new();
        fx.auditor
            .on_stream_open(Interpretation::Fopen, "/home/u/a.txt", "r", 0x5000, 0);
        fx.auditor.on_freopen(Some("/etc/hosts"), "r", 0x5000, 0x5000, 0);
        assert!(!fx.auditor.registry().is_tracked(HandleKind::Stream, 0x5000));
        fx.auditor.on_freopen(None, "r", 0x5000, 0x5000, 0);
        assert!(!fx.auditor.registry().is_tracked(HandleKind::Stream, 0x5000));
    }

    #[test]
    fn test_fdopen_transfers_ownership() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/doc.txt", libc::O_RDWR, 3), 0);
        fx.auditor.on_fdopen(3, "r+", 0x8000, 0);
        fx.auditor.on_close(3, 0, 0);
        assert!(fx.descriptors().is_empty());
        assert!(fx.auditor.registry().is_tracked(HandleKind::Stream, 0x8000));
        assert_eq!(fx.events()[1], "fdopen|fd: 3|||FILE 0x8000|with flag 2, e0|");
    }

    #[test]
    fn test_dup_of_tracked_descriptor() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/doc.txt", libc::O_RDWR, 3), 0);
        fx.auditor.on_dup(Interpretation::Dup, 3, 4, 4, 0);
        fx.auditor.on_dup(Interpretation::Dup, 10, 11, 11, 0);
        assert_eq!(fx.descriptors(), vec![4, 3]);
        assert_eq!(fx.events()[1], "dup|fd: 3|Old fd||fd: 4|New fd: e0|");
    }

    #[test]
    fn test_dup2_over_tracked_target() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/a", libc::O_RDWR, 3), 0);
        fx.auditor.on_open(open("/home/u/b", libc::O_RDWR, 5), 0);
        // 5 now refers to an untracked file.
        fx.auditor.on_dup(Interpretation::Dup2, 8, 5, 5, 0);
        assert_eq!(fx.descriptors(), vec![3]);
        fx.auditor.on_dup(Interpretation::Dup2, 3, 5, 5, 0);
        assert_eq!(fx.auditor.registry().count(HandleKind::Descriptor, 5), 1);
        fx.auditor.on_dup(Interpretation::Dup2, 3, 3, 3, 0);
        assert_eq!(fx.auditor.registry().count(HandleKind::Descriptor, 3), 1);
    }

    #[test]
    fn test_rename_two_subjects_in_order() {
        let fx = Fixture::new();
        fx.auditor.on_rename(
            Interpretation::Rename,
            PathArg::cwd("/tmp/a"),
            PathArg::cwd("/tmp/b"),
            0,
            0,
            0,
        );
        assert_eq!(
            fx.events(),
            vec!["rename|/tmp/a|Old file||/tmp/b|New file: with flags 0, e0|"]
        );
    }

    #[test]
    fn test_rename_between_system_paths_is_ignored() {
        let fx = Fixture::new();
        fx.auditor.on_rename(
            Interpretation::Rename,
            PathArg::cwd("/etc/a"),
            PathArg::cwd("/etc/b"),
            0,
            0,
            0,
        );
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_linkat_into_forbidden_directory() {
        let fx = Fixture::new();
        fx.auditor.on_link(
            Interpretation::Linkat,
            PathArg::at(libc::AT_FDCWD, "/home/u/a"),
            PathArg::at(9, "b"),
            0,
            0,
            0,
        );
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_symlink_failure() {
        let fx = Fixture::new();
        fx.auditor.on_link(
            Interpretation::Symlink,
            PathArg::cwd("/home/u/a"),
            PathArg::cwd("/home/u/b"),
            0,
            -1,
            libc::EEXIST,
        );
        assert_eq!(
            fx.events(),
            vec!["symlink|/home/u/a|||/home/u/b|with flag 0, e17|"]
        );
    }

    #[test]
    fn test_unlink_outside_home_is_recorded() {
        let fx = Fixture::new();
        fx.auditor.on_remove(Interpretation::Unlink, "/etc/obsolete", 0, 0);
        fx.auditor.on_remove(Interpretation::Unlink, "/home/u/.cache/x", 0, 0);
        assert_eq!(fx.events(), vec!["unlink|/etc/obsolete|e0|"]);
    }

    #[test]
    fn test_directory_handles() {
        let fx = Fixture::new();
        fx.auditor.on_opendir("/home/u/Music", 0x9000, 0);
        fx.auditor.on_opendir("/usr/share", 0xa000, 0);
        fx.auditor.on_closedir(0x9000, 0, 0);
        fx.auditor.on_closedir(0xa000, 0, 0);
        assert_eq!(
            fx.events(),
            vec![
                "opendir|/home/u/Music|DIR 0x9000: e0|",
                "closedir|DIR: 0x9000|e0|",
            ]
        );
    }

    #[test]
    fn test_fdopendir_of_tracked_descriptor() {
        let fx = Fixture::new();
        fx.auditor.on_open(open("/home/u/Music", libc::O_RDONLY, 6), 0);
        fx.auditor.on_fdopendir(6, 0xb000, 0);
        assert!(fx.descriptors().is_empty());
        assert!(fx.auditor.registry().is_tracked(HandleKind::Directory, 0xb000));
        assert_eq!(fx.events()[1], "fdopendir|fd: 6|||DIR 0xb000|e0|");
    }

    #[test]
    fn test_fork_parent_event() {
        let fx = Fixture::new();
        fx.auditor.on_fork(4300, 0);
        fx.auditor.on_fork(-1, libc::EAGAIN);
        assert_eq!(fx.events(), vec!["fork|pid 4300|e0|", "fork|pid -1|e11|"]);
    }

    #[test]
    fn test_fork_barrier_releases() {
        let fx = Fixture::new();
        {
            let _barrier = fx.auditor.lock_for_fork();
        }
        fx.auditor.after_fork_child();
        fx.auditor.on_fork(4300, 0);
        assert_eq!(fx.events().len(), 1);
    }

    #[test]
    fn test_local_sockets_only() {
        let fx = Fixture::new();
        fx.auditor
            .on_socket(libc::AF_INET, libc::SOCK_STREAM, 0, 7, 0);
        fx.auditor
            .on_socket(libc::AF_UNIX, libc::SOCK_STREAM, 0, 8, 0);
        assert_eq!(fx.descriptors(), vec![8]);
        assert_eq!(
            fx.events(),
            vec!["socket|socket|socket 8: with domain 1, type 1, protocol 0, e0|"]
        );
    }

    #[test]
    fn test_socketpair_outcomes() {
        let fx = Fixture::new();
        fx.auditor
            .on_socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, Ok([10, 11]));
        fx.auditor
            .on_socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, Err(libc::EFAULT));
        fx.auditor
            .on_socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, Err(libc::EMFILE));
        assert_eq!(fx.descriptors(), vec![11, 10]);
        assert_eq!(
            fx.events(),
            vec![
                "socketpair|socket 10|||socket 11|socket 11: with domain 1, type 1, protocol 0, e0|",
                "socketpair|socket|||socket|socket -1: with domain 1, type 1, protocol 0, e24|",
            ]
        );
    }

    #[test]
    fn test_pipe_recorded_on_success_only() {
        let fx = Fixture::new();
        fx.auditor.on_pipe(Interpretation::Pipe, None);
        fx.auditor.on_pipe(Interpretation::Pipe2, Some([12, 13]));
        assert_eq!(fx.descriptors(), vec![13, 12]);
        assert_eq!(fx.events(), vec!["pipe2|read fd 12|||write fd 13||"]);
    }

    #[test]
    fn test_shared_memory() {
        let fx = Fixture::new();
        fx.auditor
            .on_shm_open("/prelog-test", libc::O_RDWR | libc::O_CREAT, 0o600, 14, 0);
        fx.auditor.on_shm_unlink("/prelog-test", -1, libc::ENOENT);
        assert_eq!(fx.descriptors(), vec![14]);
        assert_eq!(
            fx.events(),
            vec![
                "shm_open|/prelog-test|shm 14: with flag 66 and mode 384: e0|",
                "shm_unlink|/prelog-test|shm: e2|",
            ]
        );
    }

    #[test]
    fn test_gate_discards_without_error() {
        let fx = Fixture::new();
        fx.home.touch_lock("LOGGING-FORBIDDEN.lock");
        fx.auditor.on_open(open("/home/u/doc.txt", libc::O_WRONLY, 3), 0);
        assert!(fx.home.log_files().is_empty());
        // The handle is still followed.
        assert_eq!(fx.descriptors(), vec![3]);
    }

    #[test]
    fn test_from_config_forbids_log_dir() {
        let config = ShimConfig {
            home: Some(PathBuf::from("/home/u")),
            temp_dirs: vec![PathBuf::from("/tmp"), PathBuf::from("/var/tmp/u")],
            ..Default::default()
        };
        let auditor = Auditor::from_config(&config, None);
        assert!(auditor
            .policy()
            .is_forbidden(PathRef::new("/home/u/.local/share/prelog/a.log.gz")));
        assert!(auditor.policy().is_interesting("/var/tmp/u/x"));
        assert_eq!(
            auditor.sink().settings().log_dir,
            Some(PathBuf::from("/home/u/.local/share/prelog"))
        );
    }
}
