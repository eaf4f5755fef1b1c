use anyhow::Result;
use clap::Args;

use crate::command::parse_command;

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Message text, e.g. "!roll 2d6"
    pub text: String,
}

impl ParseArgs {
    /// Print the parsed command as JSON, or `not a command`.
    pub fn execute(&self) -> Result<()> {
        match parse_command(&self.text) {
            Some(command) => println!("{}", serde_json::to_string(&command)?),
            None => println!("not a command"),
        }
        Ok(())
    }
}
