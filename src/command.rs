use serde::Serialize;

/// Marker that opens a directive.
pub const DIRECTIVE_MARKER: char = '!';

/// Stand-in for `"` so senders don't have to escape quotes on the way in.
pub const QUOTE_SUBSTITUTE: &str = "¬¬¬";

/// A parsed bang command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Lowercased, never empty.
    pub verb: String,
    /// Trimmed; may be empty.
    pub argument: String,
}

/// Parse a message body into a command.
///
/// Returns `None` when the trimmed body does not start with `!` or when the
/// verb is empty once the markers are stripped (e.g. a bare `!!`).
pub fn parse_command(text: &str) -> Option<Command> {
    let normalized = text.replace(QUOTE_SUBSTITUTE, "\"");
    let trimmed = normalized.trim();
    if !trimmed.starts_with(DIRECTIVE_MARKER) {
        return None;
    }

    // Index-based split: the argument is whatever follows the first token,
    // even if the verb reappears inside it.
    let (token, rest) = trimmed
        .split_once(char::is_whitespace)
        .unwrap_or((trimmed, ""));

    let verb: String = token
        .chars()
        .filter(|&c| c != DIRECTIVE_MARKER)
        .collect::<String>()
        .to_lowercase();
    if verb.is_empty() {
        return None;
    }

    Some(Command {
        verb,
        argument: rest.trim().to_string(),
    })
}
