use std::{io, time::Duration};

use super::{outcome::*, supervisor::ProcessSupervisor};
use crate::problem::TestCase;

pub const DEFAULT_GRACE: Duration = Duration::from_millis(100);
pub const DEFAULT_TIMEOUT_PENALTY: Duration = Duration::from_millis(50);

/// Bounds a supervised run by `time_limit + grace`, measured from the moment
/// just before spawn. An overrunning process group is killed with `SIGKILL`.
#[derive(Debug, Clone)]
pub struct TimeoutWatchdog {
    grace: Duration,
    timeout_penalty: Duration,
}

impl Default for TimeoutWatchdog {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
            timeout_penalty: DEFAULT_TIMEOUT_PENALTY,
        }
    }
}

impl TimeoutWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn timeout_penalty(mut self, penalty: Duration) -> Self {
        self.timeout_penalty = penalty;
        self
    }

    /// Runs one testcase to completion. Never fails: spawn failures become
    /// `RuntimeError`, overruns become `TimedOut` with the penalty time.
    pub async fn supervise(
        &self,
        supervisor: &ProcessSupervisor,
        testcase: &TestCase,
        time_limit: Duration,
    ) -> RunOutcome {
        let id = testcase.id;
        let proc = match supervisor.spawn(testcase, time_limit) {
            Ok(proc) => proc,
            Err(e) => {
                log::warn!("Testcase {}: {:#}", id, e);
                return RunOutcome::spawn_failure(id, Duration::ZERO);
            }
        };

        let pid = proc.pid();
        let deadline = proc.started_at() + time_limit + self.grace;
        log::debug!("Testcase {}: pid={}, limit={:?}", id, pid, time_limit);

        let mut worker = tokio::task::spawn_blocking(move || proc.wait());

        match tokio::time::timeout_at(deadline.into(), &mut worker).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                log::warn!("Testcase {}: supervision task failed: {}", id, e);
                RunOutcome::spawn_failure(id, time_limit)
            }
            Err(_) => {
                kill_process_group(pid);

                // Joining reaps the child; the worker returns as soon as it dies.
                let exit = match worker.await {
                    Ok(killed) => killed.exit,
                    Err(e) => {
                        log::warn!("Testcase {}: supervision task failed: {}", id, e);
                        ProcessExit::Unknown
                    }
                };
                RunOutcome {
                    testcase_id: id,
                    elapsed: time_limit + self.timeout_penalty,
                    peak_memory_kib: 0,
                    exit,
                    raw_status: RawStatus::TimedOut,
                }
            }
        }
    }
}

/// Kills the process group led by `pid`. Descendants that moved to another
/// group or session survive.
fn kill_process_group(pid: u32) {
    let pid = pid as libc::pid_t;
    if unsafe { libc::killpg(pid, libc::SIGKILL) } == 0 {
        return;
    }
    log::debug!(
        "killpg({}) failed: {}; killing the process only",
        pid,
        io::Error::last_os_error()
    );
    if unsafe { libc::kill(pid, libc::SIGKILL) } != 0 {
        log::warn!(
            "Failed to kill TLE process {}: {}",
            pid,
            io::Error::last_os_error()
        );
    }
}
