pub mod calibrate;
pub mod init;
pub mod verify;

use std::path::PathBuf;

use anyhow::Context as _;
use runjudge_core::Config;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file [default: nearest runjudge.toml in the current dir or its ancestors]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Calibrate(calibrate::Args),
    Init(init::Args),

    #[command(alias("t"))]
    Test(test::Args),

    Verify(verify::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Calibrate(args) => calibrate::exec(args, self),
            Init(args) => init::exec(args, self),
            Test(args) => test::exec(args, self).await,
            Verify(args) => verify::exec(args, self),
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::from_toml_file(path.clone())
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => Config::from_file_finding_in_ancestors(util::current_dir()),
        }
    }
}
