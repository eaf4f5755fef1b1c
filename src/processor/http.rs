use std::time::Duration;

use serde::Deserialize;

use super::{Processor, ProcessorError, Request};

/// POSTs each command as JSON and reads `{"reply": ...}` back.
#[derive(Debug)]
pub struct HttpProcessor {
    url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct HttpReply {
    #[serde(default)]
    reply: Option<String>,
}

impl HttpProcessor {
    pub fn new(url: &str, timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build();
        Self {
            url: url.to_string(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    fn http_error(&self, source: ureq::Error) -> ProcessorError {
        ProcessorError::Http {
            url: self.url.clone(),
            source,
        }
    }
}

impl Processor for HttpProcessor {
    fn process(&self, request: &Request<'_>) -> Result<Option<String>, ProcessorError> {
        tracing::debug!(url = %self.url, verb = request.verb, "posting to http processor");
        let mut response = self
            .agent
            .post(&self.url)
            .send_json(request)
            .map_err(|e| self.http_error(e))?;
        let body: HttpReply = response
            .body_mut()
            .read_json()
            .map_err(|e| self.http_error(e))?;
        Ok(body.reply)
    }
}
