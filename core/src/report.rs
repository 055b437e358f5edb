use std::{fmt::Write as _, path::Path, time::Duration};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{
    calibrate::CalibrationResult,
    problem::ProblemSpec,
    testing::{outcome::serialize_millis, AggregateResult, JudgeCode, RunOutcome},
};

/// Verdict of one testcase together with the measurements it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub judge: JudgeCode,
    pub outcome: RunOutcome,
    /// Elapsed time scaled back to the reference machine, in ms.
    pub normalized_time_ms: u64,
}

impl TestReport {
    pub fn new(judge: JudgeCode, outcome: RunOutcome, multiplier: f64) -> Self {
        let normalized_time_ms = (outcome.elapsed.as_millis() as f64 / multiplier) as u64;
        Self {
            judge,
            outcome,
            normalized_time_ms,
        }
    }

    pub fn testcase_id(&self) -> u32 {
        self.outcome.testcase_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeSummary {
    pub judged_at: DateTime<Local>,
    pub problem: ProblemSpec,
    pub calibration: CalibrationResult,
    #[serde(serialize_with = "serialize_millis")]
    pub effective_time_limit: Duration,
    pub tests: Vec<TestReport>,
    pub aggregate: AggregateResult,
    pub accept_code: Option<String>,
}

/// Reads `<dir>/<CODE>` (e.g. `Result/TLE`) if it exists.
pub fn load_banner(dir: impl AsRef<Path>, name: &str) -> Option<String> {
    let path = dir.as_ref().join(name);
    if !path.is_file() {
        return None;
    }
    fsutil::read_to_string(&path)
        .map_err(|e| log::warn!("{}", e))
        .ok()
}

/// Plain-text report, the content of `output.info`.
pub fn render_text(summary: &JudgeSummary, banner: Option<&str>) -> String {
    let mut s = String::new();
    let p = &summary.problem;
    let agg = &summary.aggregate;

    // Writing to a String cannot fail.
    let _ = writeln!(s, "Problem ID : {}", p.problem_id);
    let _ = writeln!(s, "There're {} testcases.", p.testcase_count);
    let _ = writeln!(s, "Judged at : {}", summary.judged_at.format("%Y-%m-%d %H:%M:%S"));
    match banner {
        Some(banner) => s += banner,
        None => {
            let _ = writeln!(s, "{}", agg.headline());
        }
    }
    if !s.ends_with('\n') {
        s.push('\n');
    }

    let _ = writeln!(s, "For each testcase : \n");
    for t in &summary.tests {
        let _ = writeln!(
            s,
            "{:>3}. {:>4}  Execution time : {:>8} ms  Memory : {:>4} KB",
            t.testcase_id(),
            t.judge.to_string(),
            t.normalized_time_ms,
            t.outcome.peak_memory_kib,
        );
    }

    let _ = writeln!(s, "\nTotal score : {:.2}", agg.score_percent);
    if let Some(code) = &summary.accept_code {
        let _ = writeln!(s, "\nAC code : {}", code);
    }
    s
}

pub fn write_report(
    path: impl AsRef<Path>,
    summary: &JudgeSummary,
    banner: Option<&str>,
) -> fsutil::Result<()> {
    fsutil::write_with_mkdir(path, render_text(summary, banner))
}
