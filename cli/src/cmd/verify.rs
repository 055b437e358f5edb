use anyhow::bail;
use runjudge_core::accept_code;

use crate::print_success;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// AC code printed by `runjudge test`
    code: String,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    if !accept_code::verify(&args.code) {
        bail!("Invalid AC code: {}", args.code);
    }
    print_success!("Valid AC code: {}", args.code);
    Ok(())
}
