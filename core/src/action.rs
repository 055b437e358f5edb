pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::Path;

use chrono::Local;
use error::*;
use tokio::process::Command;

use crate::accept_code;
use crate::calibrate::{CalibrationResult, SpeedCalibrator};
use crate::cmdline::{self, CommandLine};
use crate::config::Config;
use crate::problem::ProblemSpec;
use crate::report::{self, JudgeSummary, TestReport};
use crate::testing::{ProcessSupervisor, ResultAggregator, TimeoutWatchdog, VerdictClassifier};

#[derive(Debug, Clone)]
pub struct JudgeCommand {
    /// Build recipe run through `/bin/sh -c` in the solution dir. `None` skips compilation.
    pub compile: Option<String>,
    pub execute: String,
}

#[derive(Debug, thiserror::Error)]
#[error("Compilation failed: {0}")]
pub struct CompileError(pub String);

/// Progress notifications, in order of occurrence.
#[derive(Debug)]
pub enum JudgeEvent<'a> {
    ProblemLoaded(&'a ProblemSpec),
    Compiling(&'a str),
    Calibrating,
    Calibrated(&'a CalibrationResult),
    Judged {
        report: &'a TestReport,
        total: u32,
    },
}

const SHELL: &str = "/bin/sh";

pub async fn compile_solution(cmd: &str, solution_dir: impl AsRef<Path>) -> Result<()> {
    let solution_dir = solution_dir.as_ref();
    let status = Command::new(SHELL)
        .args(["-c", cmd])
        .current_dir(solution_dir)
        .status()
        .await
        .with_context(|| format!("Failed to spawn '{} -c {}'", SHELL, cmd))?;

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(CompileError(format!("exitcode={}", code)).into()),
        None => Err(CompileError("process terminated by signal".to_owned()).into()),
    }
}

/// Calibrates, then runs and judges every testcase in order.
/// Per-testcase failures end up in verdicts; only calibration and
/// bookkeeping errors abort.
pub async fn judge_all(
    problem: &ProblemSpec,
    execute: &CommandLine,
    cfg: &Config,
    mut on_event: impl FnMut(JudgeEvent),
) -> Result<JudgeSummary> {
    on_event(JudgeEvent::Calibrating);
    let calibrator = SpeedCalibrator::new(cfg.calibration.clone());
    let calibration = tokio::task::spawn_blocking(move || calibrator.calibrate())
        .await
        .context("Calibration task failed")?
        .context("Failed to fix the time limit")?;
    on_event(JudgeEvent::Calibrated(&calibration));

    let multiplier = calibration.multiplier;
    let time_limit = problem.effective_time_limit(multiplier);
    log::info!(
        "Time limit: {}ms (raw {}ms × {:.3})",
        time_limit.as_millis(),
        problem.raw_time_limit_ms,
        multiplier
    );

    let supervisor = ProcessSupervisor::new(execute.clone())
        .memory_limit_bytes(cfg.limits.memory_bytes)
        .current_dir(&cfg.work_dir);
    let watchdog = TimeoutWatchdog::new()
        .grace(cfg.limits.grace())
        .timeout_penalty(cfg.limits.timeout_penalty());
    let classifier = VerdictClassifier::new().mle_markers(cfg.judge.mle_markers.iter().cloned());

    let mut aggregator = ResultAggregator::new(problem.testcase_count as usize);
    let mut tests = Vec::with_capacity(problem.testcase_count as usize);

    for t in problem.testcases() {
        let outcome = watchdog.supervise(&supervisor, &t, time_limit).await;
        let verdict = classifier.classify(&outcome, &t);
        log::debug!(
            "Testcase {}: {:?} -> {} [{}ms, {}KB]",
            t.id,
            outcome.raw_status,
            verdict.judge,
            outcome.elapsed_millis(),
            outcome.peak_memory_kib
        );
        aggregator.push(verdict)?;

        let report = TestReport::new(verdict.judge, outcome, multiplier);
        on_event(JudgeEvent::Judged {
            report: &report,
            total: problem.testcase_count,
        });
        tests.push(report);
    }

    let aggregate = aggregator.finish()?;
    let accept_code = aggregate.all_correct().then(accept_code::generate);

    Ok(JudgeSummary {
        judged_at: Local::now(),
        problem: problem.clone(),
        calibration,
        effective_time_limit: time_limit,
        tests,
        aggregate,
        accept_code,
    })
}

/// The whole pipeline: load the problem, compile, judge, write the report file.
pub async fn do_judge(
    cmd: &JudgeCommand,
    cfg: &Config,
    mut on_event: impl FnMut(JudgeEvent),
) -> Result<JudgeSummary> {
    let execute = cmdline::split(&cmd.execute)
        .with_context(|| format!("Invalid execute command '{}'", cmd.execute))?;

    let problem = ProblemSpec::from_testcase_dir(&cfg.testcase_dir)
        .context("Failed to load problem metadata")?;
    on_event(JudgeEvent::ProblemLoaded(&problem));

    if let Some(compile) = &cmd.compile {
        on_event(JudgeEvent::Compiling(compile));
        log::info!("Compiling in {}: {}", cfg.solution_dir.display(), compile);
        compile_solution(compile, &cfg.solution_dir).await?;
    }

    log::info!("Running: {}", execute);
    let summary = judge_all(&problem, &execute, cfg, &mut on_event).await?;

    let banner = report::load_banner(&cfg.banner_dir, &summary.aggregate.headline().to_string());
    report::write_report(&cfg.report_file, &summary, banner.as_deref())
        .context("Failed to write report")?;
    Ok(summary)
}
