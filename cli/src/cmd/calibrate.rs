use anyhow::Context as _;
use runjudge_core::calibrate::SpeedCalibrator;

use crate::style;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Number of times the workload runs
    #[arg(short = 'n', long)]
    repetitions: Option<u32>,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let mut cfg = global_args.load_config()?.calibration;
    cfg.fixed_multiplier = None;
    if let Some(n) = args.repetitions {
        cfg.repetitions = n;
    }

    let spinner = style::spinner("Fixing the time limit...");
    let res = SpeedCalibrator::new(cfg).calibrate();
    spinner.finish_and_clear();

    let res = res.context("Failed to fix the time limit")?;
    style::print_calibration(&res);
    Ok(())
}
