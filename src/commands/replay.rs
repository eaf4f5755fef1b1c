use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::ConfigArg;
use crate::processor::{BuiltinProcessor, Processor};
use crate::session::Session;

/// Feed recorded event lines through the session loop without signal-cli.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// File of newline-delimited events; `-` reads stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,
    #[command(flatten)]
    pub config: ConfigArg,
    /// Use the builtin processor regardless of config
    #[arg(long)]
    pub builtin: bool,
    /// Print the session summary as JSON on stderr when done
    #[arg(long)]
    pub summary: bool,
}

impl ReplayArgs {
    pub fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let processor: Box<dyn Processor> = if self.builtin {
            Box::new(BuiltinProcessor)
        } else {
            config.processor.build()?
        };

        let reader: Box<dyn BufRead> = if self.input.as_os_str() == "-" {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(&self.input)
                .with_context(|| format!("opening {}", self.input.display()))?;
            Box::new(BufReader::new(file))
        };

        let session = Session::new(processor.as_ref())
            .with_attachment(&config.dispatch.attachment_placeholder);
        let summary = session
            .run(reader, io::stdout().lock())
            .context("reading events")?;

        tracing::info!(
            lines = summary.lines,
            replies = summary.replies,
            dropped = summary.dropped,
            "replay finished"
        );
        if self.summary {
            eprintln!("{}", serde_json::to_string(&summary)?);
        }
        Ok(())
    }
}
