//! Owns the signal-cli child process for the lifetime of one session.

use std::io::{BufReader, BufWriter};
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::processor::{NO_ATTACHMENT, Processor};
use crate::session::{Session, SessionSummary};
use crate::subprocess::{Tool, ToolError};

/// Subcommand that puts signal-cli into JSON event-loop mode.
pub const DEFAULT_SUBCOMMAND: &str = "jsonevtloop";

/// How a supervised session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub summary: SessionSummary,
    /// Child exit code; `None` if it died from a signal.
    pub exit_code: Option<i32>,
    /// An interrupt was requested while the session ran.
    pub interrupted: bool,
}

impl RunReport {
    /// Clean exit, or any exit after an interrupt was asked for.
    pub const fn clean(&self) -> bool {
        self.interrupted || matches!(self.exit_code, Some(0))
    }
}

/// Spawns `<binary> -u <account> <subcommand>` and drives a [`Session`] over
/// its pipes until the child closes stdout.
pub struct Supervisor {
    binary: String,
    account: String,
    subcommand: String,
    attachment: String,
    processor: Box<dyn Processor>,
    interrupted: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(binary: &str, account: &str, processor: Box<dyn Processor>) -> Self {
        Self {
            binary: binary.to_string(),
            account: account.to_string(),
            subcommand: DEFAULT_SUBCOMMAND.to_string(),
            attachment: NO_ATTACHMENT.to_string(),
            processor,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn subcommand(mut self, subcommand: &str) -> Self {
        self.subcommand = subcommand.to_string();
        self
    }

    #[must_use]
    pub fn attachment(mut self, attachment: &str) -> Self {
        self.attachment = attachment.to_string();
        self
    }

    /// Flag an interrupt handler can set. The session keeps draining until
    /// the child closes its stdout; the flag only changes how the end is
    /// reported.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    fn tool(&self) -> Tool {
        Tool::new(&self.binary)
            .arg("-u")
            .arg(&self.account)
            .arg(&self.subcommand)
    }

    /// Run until end-of-stream, then reap the child.
    ///
    /// Spawn failures and a failing read on the child's stdout are errors;
    /// everything that goes wrong with a single message is counted in the
    /// summary instead.
    pub fn run(self) -> Result<RunReport, ToolError> {
        let tool = self.tool();
        tracing::info!(
            binary = %self.binary,
            account = %self.account,
            subcommand = %self.subcommand,
            "starting event loop"
        );
        let piped = tool.spawn_piped()?;
        let mut child = piped.child;
        tracing::debug!(pid = child.id(), "child running");

        let io_error = |source| ToolError::Io {
            program: self.binary.clone(),
            source,
        };

        let session = Session::new(self.processor.as_ref()).with_attachment(&self.attachment);
        let result = session.run(BufReader::new(piped.stdout), BufWriter::new(piped.stdin));

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "reading from child failed; stopping it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(io_error(e));
            }
        };

        // stdin was dropped with the session's writer, so the child sees EOF too.
        let status = child.wait().map_err(io_error)?;
        let report = RunReport {
            summary,
            exit_code: status.code(),
            interrupted: self.interrupted.load(Ordering::SeqCst),
        };
        log_report(&report, status);
        Ok(report)
    }
}

fn log_report(report: &RunReport, status: ExitStatus) {
    let s = &report.summary;
    if report.clean() {
        tracing::info!(
            %status,
            interrupted = report.interrupted,
            lines = s.lines,
            replies = s.replies,
            no_reply = s.no_reply,
            ignored = s.ignored,
            dropped = s.dropped,
            "event loop terminated"
        );
    } else {
        tracing::warn!(
            %status,
            lines = s.lines,
            replies = s.replies,
            no_reply = s.no_reply,
            ignored = s.ignored,
            dropped = s.dropped,
            "event loop exited abnormally"
        );
    }
}
