use anyhow::ensure;
use runjudge_core::Config;
use std::path::PathBuf;

use crate::print_success;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,
}

/// Writes the example `runjudge.toml` into `dir`.
pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let path = args.dir.join(Config::FILENAME);
    ensure!(!path.exists(), "{} already exists", path.display());
    fsutil::write_with_mkdir(&path, Config::example_toml())?;
    print_success!("Successfully created {}", path.to_string_lossy());
    Ok(())
}
