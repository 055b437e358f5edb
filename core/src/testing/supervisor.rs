//! Spawns the candidate program for one testcase and measures it.
//!
//! The memory ceiling is an address-space limit (`RLIMIT_AS`) set in the child
//! right before `exec`. It only approximates a memory limit: virtual mappings
//! count against it even when they are never touched, and nothing else about
//! the child is isolated.

use std::{
    io,
    mem::MaybeUninit,
    path::{Path, PathBuf},
    os::unix::process::CommandExt as _,
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use super::outcome::*;
use crate::{cmdline::CommandLine, problem::TestCase};

pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error(transparent)]
    Artifact(#[from] fsutil::Error),

    #[error("Failed to spawn '{0}': {1}")]
    Spawn(String, #[source] io::Error),
}

#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    cmd: CommandLine,
    memory_limit_bytes: u64,
    current_dir: Option<PathBuf>,
}

/// A running child. Consumed by [`SupervisedProcess::wait`].
#[derive(Debug)]
pub struct SupervisedProcess {
    pid: libc::pid_t,
    testcase_id: u32,
    started_at: Instant,
    time_limit: Duration,
}

impl ProcessSupervisor {
    pub fn new(cmd: CommandLine) -> Self {
        Self {
            cmd,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            current_dir: None,
        }
    }

    pub fn memory_limit_bytes(mut self, limit: u64) -> Self {
        self.memory_limit_bytes = limit;
        self
    }

    /// Working directory of the child. A relative program path containing a
    /// slash (e.g. `./Solution/Sol`) is resolved against it too.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn get_command(&self) -> &CommandLine {
        &self.cmd
    }

    pub fn get_memory_limit_bytes(&self) -> u64 {
        self.memory_limit_bytes
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Bare names are left for `PATH` lookup.
    fn program_path(&self) -> PathBuf {
        let program = Path::new(&self.cmd.program);
        match &self.current_dir {
            Some(dir) if program.is_relative() && program.components().count() > 1 => {
                dir.join(program)
            }
            _ => program.to_owned(),
        }
    }

    /// Starts the program with stdin from the testcase input and stdout/stderr
    /// into the capture files. The capture files are created before anything
    /// else can fail, so they exist even when spawning does not succeed.
    ///
    /// The child leads a new process group so that the whole group can be killed.
    pub fn spawn(
        &self,
        testcase: &TestCase,
        time_limit: Duration,
    ) -> Result<SupervisedProcess, SpawnError> {
        let stdout = fsutil::create_file(&testcase.captured_stdout)?;
        let stderr = fsutil::create_file(&testcase.captured_stderr)?;
        let stdin = fsutil::open_file(&testcase.input)?;

        let mut cmd = Command::new(self.program_path());
        cmd.args(&self.cmd.args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let limit = self.memory_limit_bytes as libc::rlim_t;
        unsafe {
            cmd.pre_exec(move || {
                let rlim = libc::rlimit {
                    rlim_cur: limit,
                    rlim_max: limit,
                };
                if libc::setrlimit(libc::RLIMIT_AS, &rlim) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let started_at = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| SpawnError::Spawn(self.cmd.program.clone(), e))?;

        // Reaped by `wait4` in `SupervisedProcess::wait`, never through `child`.
        let pid = child.id() as libc::pid_t;
        drop(child);

        Ok(SupervisedProcess {
            pid,
            testcase_id: testcase.id,
            started_at,
            time_limit,
        })
    }
}

impl SupervisedProcess {
    pub fn pid(&self) -> u32 {
        self.pid as u32
    }

    pub fn testcase_id(&self) -> u32 {
        self.testcase_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Blocks until the child exits and collects its resource usage.
    pub fn wait(self) -> RunOutcome {
        let mut status: libc::c_int = 0;
        let mut usage = MaybeUninit::<libc::rusage>::zeroed();

        loop {
            let ret = unsafe { libc::wait4(self.pid, &mut status, 0, usage.as_mut_ptr()) };
            if ret == self.pid {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            log::warn!("wait4(pid={}) failed: {}", self.pid, err);
            return RunOutcome {
                testcase_id: self.testcase_id,
                elapsed: self.started_at.elapsed(),
                peak_memory_kib: 0,
                exit: ProcessExit::Unknown,
                raw_status: RawStatus::RuntimeError,
            };
        }
        let elapsed = self.started_at.elapsed();

        // SAFETY: wait4 succeeded, so the kernel filled `usage`.
        let usage = unsafe { usage.assume_init() };
        let exit = ProcessExit::from_wait_status(status);

        RunOutcome {
            testcase_id: self.testcase_id,
            elapsed,
            peak_memory_kib: RssUnit::NATIVE.to_kib(usage.ru_maxrss as i64),
            exit,
            raw_status: raw_status(exit, elapsed, self.time_limit),
        }
    }
}

pub fn raw_status(exit: ProcessExit, elapsed: Duration, time_limit: Duration) -> RawStatus {
    if !exit.success() {
        RawStatus::RuntimeError
    } else if elapsed > time_limit {
        RawStatus::TimedOut
    } else {
        RawStatus::Success
    }
}

/// Unit of `rusage::ru_maxrss`, which differs between platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RssUnit {
    KiB,
    Bytes,
}

impl RssUnit {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    pub const NATIVE: RssUnit = RssUnit::Bytes;

    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    pub const NATIVE: RssUnit = RssUnit::KiB;

    pub fn to_kib(self, maxrss: i64) -> u64 {
        let maxrss = maxrss.max(0) as u64;
        match self {
            RssUnit::KiB => maxrss,
            RssUnit::Bytes => maxrss / 1024,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmdline;

    fn testcase_in(dir: &std::path::Path, input: &str) -> TestCase {
        let t = TestCase::new(1, dir);
        fsutil::write(&t.input, input).unwrap();
        t
    }

    fn supervisor(cmd: &str) -> ProcessSupervisor {
        ProcessSupervisor::new(cmdline::split(cmd).unwrap())
    }

    #[test]
    fn rss_unit_conversion() {
        assert_eq!(RssUnit::KiB.to_kib(2048), 2048);
        assert_eq!(RssUnit::Bytes.to_kib(2048 * 1024), 2048);
        assert_eq!(RssUnit::Bytes.to_kib(1000), 0);
        assert_eq!(RssUnit::KiB.to_kib(-1), 0);
    }

    #[test]
    fn raw_status_precedence() {
        let limit = Duration::from_millis(100);
        let fast = Duration::from_millis(10);
        let slow = Duration::from_millis(150);
        assert_eq!(raw_status(ProcessExit::Code(0), fast, limit), RawStatus::Success);
        assert_eq!(raw_status(ProcessExit::Code(0), limit, limit), RawStatus::Success);
        assert_eq!(raw_status(ProcessExit::Code(0), slow, limit), RawStatus::TimedOut);
        assert_eq!(raw_status(ProcessExit::Code(1), fast, limit), RawStatus::RuntimeError);
        assert_eq!(raw_status(ProcessExit::Signal(9), slow, limit), RawStatus::RuntimeError);
    }

    #[test]
    fn captures_stdout_and_stderr_to_files() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase_in(tmp.path(), "hello\n");
        let proc = supervisor("sh -c 'read x; echo out_$x; echo err_$x >&2'")
            .spawn(&t, Duration::from_secs(5))
            .unwrap();
        assert!(proc.pid() > 0);

        let res = proc.wait();
        assert_eq!(res.testcase_id, 1);
        assert_eq!(res.exit, ProcessExit::Code(0));
        assert_eq!(res.raw_status, RawStatus::Success);
        assert!(res.peak_memory_kib > 0);
        assert_eq!(fsutil::read_to_string(&t.captured_stdout).unwrap(), "out_hello\n");
        assert_eq!(fsutil::read_to_string(&t.captured_stderr).unwrap(), "err_hello\n");
    }

    #[test]
    fn nonzero_exit_is_runtime_error() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase_in(tmp.path(), "");
        let res = supervisor("sh -c 'exit 3'")
            .spawn(&t, Duration::from_secs(5))
            .unwrap()
            .wait();
        assert_eq!(res.exit, ProcessExit::Code(3));
        assert_eq!(res.raw_status, RawStatus::RuntimeError);
    }

    #[test]
    fn slow_exit_is_timed_out() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase_in(tmp.path(), "");
        let res = supervisor("sleep 0.2")
            .spawn(&t, Duration::from_millis(50))
            .unwrap()
            .wait();
        assert_eq!(res.exit, ProcessExit::Code(0));
        assert_eq!(res.raw_status, RawStatus::TimedOut);
        assert!(res.elapsed >= Duration::from_millis(200));
    }

    #[test]
    fn spawn_failure_still_creates_capture_files() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase_in(tmp.path(), "");
        let err = supervisor("./definitely-not-a-program")
            .spawn(&t, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, SpawnError::Spawn(..)));
        assert!(t.captured_stdout.is_file());
        assert!(t.captured_stderr.is_file());
    }

    #[test]
    fn missing_input_is_artifact_error() {
        let tmp = tempfile::tempdir().unwrap();
        let t = TestCase::new(9, tmp.path());
        let err = supervisor("cat").spawn(&t, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SpawnError::Artifact(_)));
    }

    #[test]
    fn runs_in_current_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        fsutil::mkdir_all(&work).unwrap();
        let t = testcase_in(tmp.path(), "");
        let res = supervisor("sh -c pwd")
            .current_dir(&work)
            .spawn(&t, Duration::from_secs(5))
            .unwrap()
            .wait();
        assert_eq!(res.raw_status, RawStatus::Success);
        let pwd = fsutil::read_to_string(&t.captured_stdout).unwrap();
        assert_eq!(
            Path::new(pwd.trim()).canonicalize().unwrap(),
            work.canonicalize().unwrap()
        );
    }

    #[test]
    fn relative_program_resolves_against_current_dir() {
        use std::os::unix::fs::PermissionsExt as _;

        let tmp = tempfile::tempdir().unwrap();
        let sol = tmp.path().join("Solution/Sol");
        fsutil::write_with_mkdir(&sol, "#!/bin/sh\necho 42\n").unwrap();
        std::fs::set_permissions(&sol, std::fs::Permissions::from_mode(0o755)).unwrap();

        let t = testcase_in(tmp.path(), "");
        let s = supervisor("./Solution/Sol").current_dir(tmp.path());
        assert_eq!(s.program_path(), tmp.path().join("./Solution/Sol"));
        assert_eq!(supervisor("cat").current_dir(tmp.path()).program_path(), Path::new("cat"));

        let res = s.spawn(&t, Duration::from_secs(5)).unwrap().wait();
        assert_eq!(res.exit, ProcessExit::Code(0));
        assert_eq!(fsutil::read_to_string(&t.captured_stdout).unwrap(), "42\n");
    }

    #[test]
    fn address_space_limit_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase_in(tmp.path(), "");
        let res = supervisor("sh -c 'ulimit -v'")
            .memory_limit_bytes(64 * 1024 * 1024)
            .spawn(&t, Duration::from_secs(5))
            .unwrap()
            .wait();
        assert_eq!(res.raw_status, RawStatus::Success);
        // `ulimit -v` reports KiB.
        assert_eq!(
            fsutil::read_to_string(&t.captured_stdout).unwrap().trim(),
            (64 * 1024).to_string()
        );
    }
}
