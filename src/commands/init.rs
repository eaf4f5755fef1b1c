use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{self, Config, ProcessorConfig};
use crate::error::ExitError;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Where to write the config (default: ./.signal-bang.toml)
    #[arg(long, conflicts_with = "user")]
    pub path: Option<PathBuf>,
    /// Write to the per-user config dir instead
    #[arg(long)]
    pub user: bool,
    /// Account (E.164) to put in the config
    #[arg(long, short = 'u')]
    pub account: Option<String>,
    /// Program to use as an exec processor (default: builtin processor)
    #[arg(long)]
    pub exec: Option<String>,
    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn execute(&self) -> Result<()> {
        let path = self.target()?;
        if path.exists() && !self.force {
            return Err(ExitError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            ))
            .into());
        }

        let config = self.build_config()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, config.to_toml()?)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Generated {}", path.display());
        Ok(())
    }

    fn target(&self) -> Result<PathBuf> {
        if self.user {
            return config::user_config_path()
                .ok_or_else(|| ExitError::Config("no user config directory on this platform".into()).into());
        }
        Ok(self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(config::CONFIG_FILE)))
    }

    fn build_config(&self) -> Result<Config> {
        let mut config = Config::default();
        if let Some(account) = &self.account {
            config::validate_account(account)?;
            config.signal.account = Some(account.clone());
        }
        if let Some(program) = &self.exec {
            config.processor = ProcessorConfig::Exec {
                program: program.clone(),
                args: config::default_exec_args(),
                timeout_secs: Some(30),
            };
        }
        Ok(config)
    }
}
