use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Args;

use super::ConfigArg;
use crate::error::ExitError;
use crate::supervisor::Supervisor;

/// Exit status used when a second Ctrl-C forces an immediate exit.
const FORCED_EXIT: i32 = 130;

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,
    /// Account to run as (E.164), overrides signal.account
    #[arg(long, short = 'u')]
    pub account: Option<String>,
    /// signal-cli binary, overrides signal.binary
    #[arg(long)]
    pub binary: Option<String>,
    /// Event-loop subcommand, overrides signal.subcommand
    #[arg(long)]
    pub subcommand: Option<String>,
}

impl RunArgs {
    pub fn execute(&self) -> Result<()> {
        let mut config = self.config.load()?;
        if let Some(account) = &self.account {
            config.signal.account = Some(account.clone());
        }
        if let Some(binary) = &self.binary {
            config.signal.binary.clone_from(binary);
        }
        if let Some(subcommand) = &self.subcommand {
            config.signal.subcommand.clone_from(subcommand);
        }

        let account = config.account()?;
        let processor = config.processor.build()?;
        tracing::debug!(processor = config.processor.kind(), "processor ready");

        let supervisor = Supervisor::new(&config.signal.binary, account, processor)
            .subcommand(&config.signal.subcommand)
            .attachment(&config.dispatch.attachment_placeholder);
        install_interrupt_handler(supervisor.interrupt_flag());

        let report = supervisor.run().map_err(ExitError::from)?;
        if report.clean() {
            Ok(())
        } else {
            Err(ExitError::ToolFailed {
                tool: config.signal.binary,
                code: report.exit_code.unwrap_or(-1),
                message: "event loop exited abnormally".into(),
            }
            .into())
        }
    }
}

/// First Ctrl-C: note it and keep draining (signal-cli gets the same signal
/// through the process group). Second Ctrl-C: exit now.
fn install_interrupt_handler(flag: Arc<AtomicBool>) {
    let installed = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            tracing::warn!("second interrupt, exiting");
            std::process::exit(FORCED_EXIT);
        }
        tracing::info!("interrupt received, waiting for the event loop to close");
    });
    if let Err(e) = installed {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
}
