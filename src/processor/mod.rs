//! Command processors: whatever turns a bang command into a reply body.

mod builtin;
mod exec;
mod http;

pub use builtin::BuiltinProcessor;
pub use exec::ExecProcessor;
pub use http::HttpProcessor;

use serde::Serialize;

use crate::subprocess::ToolError;

/// Attachment value passed along when a message's files are not stored.
pub const NO_ATTACHMENT: &str = "noFile";

/// Everything a processor gets to see about one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Request<'a> {
    pub sender: &'a str,
    pub conversation_id: &'a str,
    pub verb: &'a str,
    pub argument: &'a str,
    pub attachment: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("argument template {template:?}: {source}")]
    Template {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("POST {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Turns a command into an optional reply body.
///
/// `Ok(None)` means the processor has nothing to say; it is not an error.
/// Calls are synchronous and the session waits for them.
pub trait Processor {
    fn process(&self, request: &Request<'_>) -> Result<Option<String>, ProcessorError>;
}

impl<F> Processor for F
where
    F: Fn(&Request<'_>) -> Result<Option<String>, ProcessorError>,
{
    fn process(&self, request: &Request<'_>) -> Result<Option<String>, ProcessorError> {
        self(request)
    }
}

/// Hand a command to the processor, once. Blank bodies count as no reply.
pub fn dispatch(
    processor: &dyn Processor,
    request: &Request<'_>,
) -> Result<Option<String>, ProcessorError> {
    Ok(processor
        .process(request)?
        .filter(|body| !body.trim().is_empty()))
}
