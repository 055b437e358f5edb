use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Serialize;

pub type Result<T> = std::result::Result<T, ProblemError>;

#[derive(Debug, thiserror::Error)]
pub enum ProblemError {
    #[error(transparent)]
    Read(#[from] fsutil::Error),

    #[error("Missing {0} in problem metadata")]
    MissingField(&'static str),

    #[error("Invalid {0} in problem metadata: '{1}'")]
    InvalidField(&'static str, String),
}

/// Problem metadata, loaded once from `log.txt` in the testcase directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemSpec {
    pub problem_id: String,
    pub testcase_count: u32,
    pub raw_time_limit_ms: u64,
    #[serde(skip)]
    pub testcase_dir: PathBuf,
}

impl ProblemSpec {
    pub const FILENAME: &'static str = "log.txt";

    pub fn from_testcase_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let s = fsutil::read_to_string(dir.join(Self::FILENAME))?;
        Self::parse(&s, dir)
    }

    /// Three `label value` pairs, in order: testcase count, time limit (ms), problem id.
    /// Labels are not checked.
    pub fn parse(s: &str, testcase_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut tokens = s.split_whitespace();

        fn value<'s>(
            tokens: &mut impl Iterator<Item = &'s str>,
            field: &'static str,
        ) -> Result<&'s str> {
            let _label = tokens.next().ok_or(ProblemError::MissingField(field))?;
            tokens.next().ok_or(ProblemError::MissingField(field))
        }

        fn positive<T>(s: &str, field: &'static str) -> Result<T>
        where
            T: FromStr + PartialOrd + Default,
        {
            match s.parse::<T>() {
                Ok(v) if v > T::default() => Ok(v),
                _ => Err(ProblemError::InvalidField(field, s.to_owned())),
            }
        }

        let testcase_count = positive(value(&mut tokens, "testcase count")?, "testcase count")?;
        let raw_time_limit_ms = positive(value(&mut tokens, "time limit")?, "time limit")?;
        let problem_id = value(&mut tokens, "problem id")?.to_owned();

        Ok(Self {
            problem_id,
            testcase_count,
            raw_time_limit_ms,
            testcase_dir: testcase_dir.into(),
        })
    }

    pub fn raw_time_limit(&self) -> Duration {
        Duration::from_millis(self.raw_time_limit_ms)
    }

    /// `raw_time_limit × multiplier`, truncated to whole milliseconds and never below 1ms.
    pub fn effective_time_limit(&self, multiplier: f64) -> Duration {
        let ms = (self.raw_time_limit_ms as f64 * multiplier) as u64;
        if ms == 0 {
            log::warn!(
                "Time limit {}ms × {} rounds down to 0ms; using 1ms",
                self.raw_time_limit_ms,
                multiplier
            );
            return Duration::from_millis(1);
        }
        Duration::from_millis(ms)
    }

    pub fn testcases(&self) -> impl Iterator<Item = TestCase> + '_ {
        (1..=self.testcase_count).map(|id| TestCase::new(id, &self.testcase_dir))
    }
}

/// Artifact locations of one testcase. All four paths derive from the numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: u32,
    pub input: PathBuf,
    pub expected_output: PathBuf,
    pub captured_stdout: PathBuf,
    pub captured_stderr: PathBuf,
}

impl TestCase {
    pub fn new(id: u32, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            id,
            input: dir.join(format!("{}.in", id)),
            expected_output: dir.join(format!("{}.out", id)),
            captured_stdout: dir.join(format!("sol{}.out", id)),
            captured_stderr: dir.join(format!("err{}.err", id)),
        }
    }
}
