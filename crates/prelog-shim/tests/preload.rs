//! The built library loaded into real processes with `LD_PRELOAD`.
//!
//! Each test either drives a shell or re-runs this test binary with the
//! library preloaded, then reads back the logs written under a temporary
//! home.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use prelog_test_utils::{read_gz_lines, TestHome};

/// Set in a re-run of this binary that executes under the library.
const PRELOADED_RUN: &str = "PRELOG_TEST_PRELOADED_RUN";

const SENTINEL_ERRNO: i32 = 4242;

fn library() -> PathBuf {
    let exe = std::env::current_exe().expect("test binary path");
    let deps = exe.parent().expect("deps directory");
    [deps.join("libprelog.so"), deps.join("../libprelog.so")]
        .into_iter()
        .find(|path| path.exists())
        .expect("libprelog.so is built next to the tests")
}

fn environment(command: &mut Command, home: &TestHome, preload: bool) {
    command
        .env("HOME", home.path())
        .env("PRELOG_MIN_UID", "0")
        .env_remove("PRELOG_DISABLE")
        .env_remove("PRELOG_LOG_DIR")
        .env_remove("PRELOG_CONFIG_PATH")
        .env_remove("PRELOG_DIAG_FILE")
        .env_remove("LD_PRELOAD");
    if preload {
        command.env("LD_PRELOAD", library());
    }
}

/// Run a single test of this binary again, with the library preloaded.
fn rerun_preloaded(test: &str, home: &TestHome) -> Output {
    let mut command = Command::new(std::env::current_exe().expect("test binary path"));
    command.args(["--exact", test, "--nocapture", "--test-threads=1"]);
    environment(&mut command, home, true);
    command.env(PRELOADED_RUN, "1");
    command.output().expect("failed to run preloaded test binary")
}

fn in_preloaded_run() -> bool {
    std::env::var_os(PRELOADED_RUN).is_some()
}

/// Event lines of every log, split into fields, tagged with the file's header.
fn logged_events(home: &TestHome) -> Vec<(String, Vec<String>)> {
    let mut events = Vec::new();
    for file in home.log_files() {
        let lines = read_gz_lines(&file);
        let Some((header, rest)) = lines.split_first() else {
            continue;
        };
        assert!(header.starts_with("@application://"), "bad header {header:?}");
        for line in rest {
            events.push((header.clone(), line.split('|').map(str::to_string).collect()));
        }
    }
    events
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

fn set_errno(value: i32) {
    unsafe { *libc::__errno_location() = value };
}

fn c_path(path: &Path) -> CString {
    CString::new(path.as_os_str().as_bytes()).expect("path without NUL")
}

#[test]
fn test_shell_session_behaves_the_same_and_is_logged() {
    let home = TestHome::new();
    let work = home.path().join("work");
    std::fs::create_dir(&work).unwrap();
    let script = r#"echo hi > "$1/out.txt" && mv "$1/out.txt" "$1/renamed.txt" && cat "$1/renamed.txt" && ls "$1/missing""#;

    let run = |preload: bool| {
        let _ = std::fs::remove_file(work.join("renamed.txt"));
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script).arg("sh").arg(&work);
        environment(&mut command, &home, preload);
        command.output().expect("failed to run /bin/sh")
    };

    let plain = run(false);
    assert!(home.log_files().is_empty());
    let preloaded = run(true);

    assert_ne!(plain.status.code(), Some(0));
    assert_eq!(preloaded.status.code(), plain.status.code());
    assert_eq!(preloaded.stdout, b"hi\n");
    assert_eq!(preloaded.stdout, plain.stdout);
    assert_eq!(preloaded.stderr, plain.stderr);

    let events = logged_events(&home);
    let out = work.join("out.txt").display().to_string();
    let renamed = work.join("renamed.txt").display().to_string();
    assert!(
        events.iter().any(|(_, f)| f[1].starts_with("open") && f[2] == out),
        "no open of {out}: {events:?}"
    );
    assert!(
        events
            .iter()
            .any(|(_, f)| f[1].starts_with("rename") && f[2] == out && f[5] == renamed),
        "no rename of {out}: {events:?}"
    );
    assert!(events.iter().all(|(_, f)| !f.iter().any(|field| field.contains("missing"))));
}

#[test]
fn test_calls_keep_return_values_and_errno() {
    if !in_preloaded_run() {
        let home = TestHome::new();
        let output = rerun_preloaded("test_calls_keep_return_values_and_errno", &home);
        assert!(
            output.status.success(),
            "preloaded run failed:\n{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        let events = logged_events(&home);
        let created = home.path().join("created.txt").display().to_string();
        let missing = home.path().join("missing.txt").display().to_string();
        assert!(events.iter().any(|(_, f)| f[1].starts_with("open") && f[2] == created));
        assert!(events.iter().any(|(_, f)| f[1] == "close" && f[2].starts_with("fd: ")));
        assert!(events.iter().any(|(_, f)| f[1] == "rename"
            && f[2] == missing
            && f[6].ends_with(&format!("e{}", libc::ENOENT))));
        // Failed probes for files that do not exist are not worth recording.
        assert!(events
            .iter()
            .all(|(_, f)| !(f[1].starts_with("open") || f[1] == "fopen") || f[2] != missing));

        // The fork is recorded by the parent; the child writes its own file.
        let (parent, fork) = events
            .iter()
            .find(|(_, f)| f[1] == "fork")
            .expect("fork recorded");
        assert!(fork[2].starts_with("pid "));
        assert!(events
            .iter()
            .any(|(header, f)| header != parent && f[1].starts_with("open") && f[2] == created));
        assert_eq!(home.log_files().len(), 2);
        return;
    }

    let home = PathBuf::from(std::env::var_os("HOME").expect("HOME set for the preloaded run"));
    let created = c_path(&home.join("created.txt"));
    let missing = c_path(&home.join("missing.txt"));
    let renamed = c_path(&home.join("renamed.txt"));
    let read_mode = CString::new("r").unwrap();

    unsafe {
        // A successful call leaves errno as the caller last set it, even
        // though the first audited call builds the whole runtime.
        set_errno(SENTINEL_ERRNO);
        let fd = libc::open(
            created.as_ptr(),
            libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            0o600 as libc::c_uint,
        );
        let after = errno();
        assert!(fd >= 0);
        assert_eq!(after, SENTINEL_ERRNO);

        set_errno(SENTINEL_ERRNO);
        let ret = libc::close(fd);
        let after = errno();
        assert_eq!(ret, 0);
        assert_eq!(after, SENTINEL_ERRNO);

        let ret = libc::open(missing.as_ptr(), libc::O_RDONLY);
        let after = errno();
        assert_eq!(ret, -1);
        assert_eq!(after, libc::ENOENT);

        let ret = libc::close(-1);
        let after = errno();
        assert_eq!(ret, -1);
        assert_eq!(after, libc::EBADF);

        let ret = libc::rename(missing.as_ptr(), renamed.as_ptr());
        let after = errno();
        assert_eq!(ret, -1);
        assert_eq!(after, libc::ENOENT);

        let ret = libc::dup2(-1, 100);
        let after = errno();
        assert_eq!(ret, -1);
        assert_eq!(after, libc::EBADF);

        let stream = libc::fopen(missing.as_ptr(), read_mode.as_ptr());
        let after = errno();
        assert!(stream.is_null());
        assert_eq!(after, libc::ENOENT);

        let pid = libc::fork();
        if pid == 0 {
            let fd = libc::open(created.as_ptr(), libc::O_WRONLY | libc::O_APPEND);
            libc::_exit(if fd >= 0 { 7 } else { 1 });
        }
        assert!(pid > 0);
        let mut status = 0;
        assert_eq!(libc::waitpid(pid, &mut status, 0), pid);
        assert!(libc::WIFEXITED(status));
        assert_eq!(libc::WEXITSTATUS(status), 7);
    }
}
