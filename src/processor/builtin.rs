use super::{Processor, ProcessorError, Request};

/// A handful of self-contained commands, enough to check a deployment end to
/// end without a real processor behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProcessor;

impl BuiltinProcessor {
    pub const VERBS: &'static [&'static str] = &["ping", "echo", "help"];
}

impl Processor for BuiltinProcessor {
    fn process(&self, request: &Request<'_>) -> Result<Option<String>, ProcessorError> {
        let reply = match request.verb {
            "ping" => Some("pong".to_string()),
            "echo" => Some(request.argument.to_string()),
            "help" => Some(format!(
                "commands: {}",
                Self::VERBS
                    .iter()
                    .map(|v| format!("!{v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            _ => None,
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::NO_ATTACHMENT;

    fn run(verb: &str, argument: &str) -> Option<String> {
        BuiltinProcessor
            .process(&Request {
                sender: "+1555",
                conversation_id: "singleUser",
                verb,
                argument,
                attachment: NO_ATTACHMENT,
            })
            .unwrap()
    }

    #[test]
    fn ping_pong() {
        assert_eq!(run("ping", "").as_deref(), Some("pong"));
    }

    #[test]
    fn echo_argument() {
        assert_eq!(run("echo", "say \"hi\"").as_deref(), Some("say \"hi\""));
    }

    #[test]
    fn help_lists_verbs() {
        assert_eq!(run("help", "").as_deref(), Some("commands: !ping, !echo, !help"));
    }

    #[test]
    fn unknown_verb_is_silent() {
        assert_eq!(run("launch", "rockets"), None);
    }
}
