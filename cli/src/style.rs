use std::time::Duration;

use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};
use runjudge_core::{
    calibrate::CalibrationResult,
    problem::ProblemSpec,
    report::{JudgeSummary, TestReport},
    testing::JudgeCode,
};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for JudgeCode {
    fn color(&self) -> Color {
        use JudgeCode::*;
        if !self::is_truecolor_supported() {
            return match self {
                AC => Color::Green,
                WA => Color::Red,
                TLE => Color::Cyan,
                RE => Color::Magenta,
                MLE => Color::Blue,
            };
        }

        let (r, g, b) = match self {
            AC => (0x7A, 0xFF, 0x77),
            WA => (0xFF, 0x41, 0x41),
            TLE => (0x9F, 0xE2, 0xFF),
            RE => (0xAE, 0x9F, 0xFF),
            MLE => (0x99, 0xE8, 0xE6),
        };
        Color::TrueColor { r, g, b }
    }
}

pub fn judge_icon(judge: JudgeCode) -> ColoredString {
    format!(" {:<3} ", judge.to_string())
        .on_color(judge.color())
        .bold()
        .black()
}

fn terminal_cols() -> usize {
    let (cols, _) = terminal::size().unwrap_or((80, 24));
    cols.min(80) as usize
}

fn rule() -> String {
    "─".repeat(terminal_cols())
}

pub fn spinner(msg: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(msg);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

pub fn testcase_progress_bar() -> ProgressBar {
    let style = ProgressStyle::with_template("Running TestCase: {wide_bar} {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(0).with_style(style)
}

pub fn print_problem_header(problem: &ProblemSpec) {
    println!("{}", rule().bright_black());
    println!("Problem ID : {}", problem.problem_id.bold());
    println!("There're {} testcases.", problem.testcase_count);
    println!("{}", rule().bright_black());
}

pub fn print_calibration(res: &CalibrationResult) {
    match res.measured_secs {
        Some(secs) => println!(
            "Your computer runs {} times as slow as the judge ({:.4}s per run).",
            format!("{:.3}", res.multiplier).bold(),
            secs
        ),
        None => println!(
            "Using fixed time-limit multiplier {}.",
            format!("{:.3}", res.multiplier).bold()
        ),
    }
}

pub fn testcase_line(t: &TestReport) -> String {
    format!(
        "{:>3}. {} Time: {:>6} ms  Memory: {:>7} KB",
        t.testcase_id(),
        judge_icon(t.judge),
        t.normalized_time_ms,
        t.outcome.peak_memory_kib,
    )
}

pub fn print_summary(summary: &JudgeSummary, banner: Option<&str>) {
    let agg = &summary.aggregate;
    let headline = agg.headline();

    println!();
    match banner {
        Some(banner) => print!("{}", banner.color(headline.color())),
        None => println!("{}", judge_icon(headline)),
    }
    if banner.is_some_and(|b| !b.ends_with('\n')) {
        println!();
    }

    println!("{}", rule().bright_black());
    println!("For each testcase:");
    for t in &summary.tests {
        println!("{}", self::testcase_line(t));
    }
    println!("{}", rule().bright_black());

    let score = format!("Total score: {}", agg.score_text()).bold();
    if agg.all_correct() {
        println!("{}", score.green());
    } else {
        println!(
            "{} ({}/{} accepted)",
            score.bright_red(),
            agg.correct_count,
            agg.testcase_count
        );
    }
    if let Some(code) = &summary.accept_code {
        println!("AC code : {}", code.bold());
    }
}
