use std::time::Duration;

use serde::Serialize;

/// Status of a run before its output is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RawStatus {
    /// Exited with code 0 within the time limit. Not judged yet.
    Success,
    TimedOut,
    RuntimeError,
}

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessExit {
    Code(i32),
    Signal(i32),
    /// The process could not be spawned, or was not waited for.
    Unknown,
}

impl ProcessExit {
    pub fn success(self) -> bool {
        self == ProcessExit::Code(0)
    }

    pub(crate) fn from_wait_status(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            ProcessExit::Code(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            ProcessExit::Signal(libc::WTERMSIG(status))
        } else {
            ProcessExit::Unknown
        }
    }
}

/// Raw measurements of a single run. Produced once per testcase and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub testcase_id: u32,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub peak_memory_kib: u64,
    pub exit: ProcessExit,
    pub raw_status: RawStatus,
}

impl RunOutcome {
    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Outcome of a process that could not be started at all.
    pub fn spawn_failure(testcase_id: u32, elapsed: Duration) -> Self {
        Self {
            testcase_id,
            elapsed,
            peak_memory_kib: 0,
            exit: ProcessExit::Unknown,
            raw_status: RawStatus::RuntimeError,
        }
    }
}

pub(crate) fn serialize_millis<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(d.as_millis() as u64)
}
