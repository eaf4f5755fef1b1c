use std::process::ExitCode;

use crate::conversation::ResolveError;
use crate::processor::ProcessorError;
use crate::wire::DecodeError;

/// Errors that cause signal-bang to exit with a specific code.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed (exit {code}): {message}")]
    ToolFailed {
        tool: String,
        code: i32,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl ExitError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::from(2),
            Self::ToolNotFound { .. } => ExitCode::from(3),
            Self::ToolFailed { .. } => ExitCode::from(4),
            Self::Other(_) => ExitCode::from(1),
        }
    }
}

/// Why a single inbound line was dropped. None of these stop the session.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("undecodable line: {0}")]
    Decode(#[from] DecodeError),

    #[error("unresolvable conversation: {0}")]
    Resolve(#[from] ResolveError),

    #[error("processor failed for !{verb}: {source}")]
    Dispatch {
        verb: String,
        #[source]
        source: ProcessorError,
    },

    #[error("reply not delivered: {0}")]
    Write(#[source] std::io::Error),
}

impl MessageError {
    /// Short, stable label used in logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Resolve(_) => "resolve",
            Self::Dispatch { .. } => "dispatch",
            Self::Write(_) => "write",
        }
    }
}
