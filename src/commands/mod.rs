pub mod init;
pub mod parse;
pub mod replay;
pub mod run;
pub mod schema;

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::config::Config;

/// `--config` shared by commands that read the config file.
#[derive(Debug, Args)]
pub struct ConfigArg {
    /// Config file (default: ./.signal-bang.toml, then the user config dir)
    #[arg(long, short = 'c', env = "SIGNAL_BANG_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConfigArg {
    pub fn load(&self) -> anyhow::Result<Config> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        Config::discover(self.config.as_deref(), &cwd)
    }
}
