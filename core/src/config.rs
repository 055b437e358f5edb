use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::Context as _;
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::calibrate::CalibrationConfig;
use crate::testing::{
    DEFAULT_GRACE, DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIMEOUT_PENALTY, BAD_ALLOC_MARKER,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    /// Directory the relative paths were resolved against. The solution runs here.
    #[serde(skip, default = "default_work_dir")]
    pub work_dir: PathBuf,
    pub testcase_dir: PathBuf,
    pub solution_dir: PathBuf,
    pub banner_dir: PathBuf,
    pub report_file: PathBuf,
    pub limits: LimitConfig,
    pub calibration: CalibrationConfig,
    pub judge: JudgeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    pub memory_bytes: u64,
    pub grace_ms: u64,
    pub timeout_penalty_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub mle_markers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_config_file: None,
            work_dir: default_work_dir(),
            testcase_dir: "./TestCase".into(),
            solution_dir: "./Solution".into(),
            banner_dir: "./Result".into(),
            report_file: "output.info".into(),
            limits: LimitConfig::default(),
            calibration: CalibrationConfig::default(),
            judge: JudgeConfig::default(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            memory_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            grace_ms: DEFAULT_GRACE.as_millis() as u64,
            timeout_penalty_ms: DEFAULT_TIMEOUT_PENALTY.as_millis() as u64,
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            mle_markers: vec![BAD_ALLOC_MARKER.to_owned()],
        }
    }
}

impl LimitConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn timeout_penalty(&self) -> Duration {
        Duration::from_millis(self.timeout_penalty_ms)
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &'static str = "runjudge.toml";

    pub fn example_toml() -> String {
        let file = Asset::get(Self::FILENAME).unwrap();
        std::str::from_utf8(file.data.as_ref()).unwrap().to_owned()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        let base_dir = filepath.parent().unwrap_or(Path::new(".")).to_owned();
        let mut cfg = cfg.rebase(base_dir);
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Loads the nearest `runjudge.toml` in `cur_dir` or its ancestors,
    /// or the defaults (relative to `cur_dir`) when there is none.
    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let cur_dir = cur_dir.as_ref();
        match fsutil::find_file_in_ancestors(cur_dir, Self::FILENAME) {
            Some(filepath) => Self::from_toml_file(filepath),
            None => {
                log::debug!("No {} found; using defaults", Self::FILENAME);
                Ok(Self::default().rebase(cur_dir))
            }
        }
    }

    /// Makes every relative path relative to `base_dir` instead, and runs
    /// the solution from there.
    pub fn rebase(mut self, base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        self.work_dir = fsutil::normalize_path(base_dir);
        for path in [
            &mut self.testcase_dir,
            &mut self.solution_dir,
            &mut self.banner_dir,
            &mut self.report_file,
        ] {
            if path.is_relative() {
                *path = fsutil::normalize_path(base_dir.join(&*path));
            }
        }
        self
    }
}
