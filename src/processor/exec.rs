use std::time::Duration;

use minijinja::Environment;

use super::{Processor, ProcessorError, Request};
use crate::subprocess::Tool;

/// Runs an external program once per command.
///
/// Each configured argument is a minijinja template rendered against the
/// [`Request`] (`{{ sender }}`, `{{ conversation_id }}`, `{{ verb }}`,
/// `{{ argument }}`, `{{ attachment }}`). The same fields are exported as
/// `SIGNAL_BANG_*` environment variables. Trimmed stdout is the reply.
#[derive(Debug)]
pub struct ExecProcessor {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    env: Environment<'static>,
}

impl ExecProcessor {
    /// Build the processor, rejecting argument templates that don't compile.
    pub fn new(
        program: &str,
        args: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProcessorError> {
        let check = Environment::new();
        for template in &args {
            check
                .template_from_str(template)
                .map_err(|source| ProcessorError::Template {
                    template: template.clone(),
                    source,
                })?;
        }
        Ok(Self {
            program: program.to_string(),
            args,
            timeout,
            env: Environment::new(),
        })
    }

    fn render_args(&self, request: &Request<'_>) -> Result<Vec<String>, ProcessorError> {
        self.args
            .iter()
            .map(|template| {
                self.env
                    .render_str(template, request)
                    .map_err(|source| ProcessorError::Template {
                        template: template.clone(),
                        source,
                    })
            })
            .collect()
    }
}

impl Processor for ExecProcessor {
    fn process(&self, request: &Request<'_>) -> Result<Option<String>, ProcessorError> {
        let args = self.render_args(request)?;
        let mut tool = Tool::new(&self.program)
            .args(&args)
            .env("SIGNAL_BANG_SENDER", request.sender)
            .env("SIGNAL_BANG_CONVERSATION", request.conversation_id)
            .env("SIGNAL_BANG_VERB", request.verb)
            .env("SIGNAL_BANG_ARGUMENT", request.argument)
            .env("SIGNAL_BANG_ATTACHMENT", request.attachment);
        if let Some(timeout) = self.timeout {
            tool = tool.timeout(timeout);
        }

        tracing::debug!(program = %self.program, ?args, "running exec processor");
        let output = tool.run_ok()?;
        let reply = output.stdout.trim();
        Ok((!reply.is_empty()).then(|| reply.to_string()))
    }
}
