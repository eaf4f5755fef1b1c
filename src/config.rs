use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ExitError;
use crate::processor::{BuiltinProcessor, ExecProcessor, HttpProcessor, NO_ATTACHMENT, Processor};
use crate::supervisor::DEFAULT_SUBCOMMAND;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE: &str = ".signal-bang.toml";

/// Find the config file, in priority order:
/// 1. `./.signal-bang.toml`
/// 2. `$XDG_CONFIG_HOME/signal-bang/config.toml` (platform config dir)
///
/// Returns None if neither exists.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    let local = dir.join(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    let user = user_config_path()?;
    user.exists().then_some(user)
}

/// Per-user config location, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("signal-bang").join("config.toml"))
}

/// Top-level .signal-bang.toml config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
}

/// How to launch the signal-cli event loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SignalConfig {
    /// Path or name of the signal-cli binary.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Account (E.164 number) passed as `-u`.
    #[serde(default)]
    pub account: Option<String>,
    /// Subcommand that starts the JSON event loop.
    #[serde(default = "default_subcommand")]
    pub subcommand: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DispatchConfig {
    /// Value handed to processors in place of an attachment.
    #[serde(default = "default_attachment")]
    pub attachment_placeholder: String,
}

/// Which processor answers commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorConfig {
    /// `!ping`, `!echo`, `!help`.
    #[default]
    Builtin,
    /// Run a program per command; args are minijinja templates.
    Exec {
        program: String,
        #[serde(default = "default_exec_args")]
        args: Vec<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    /// POST the command as JSON to a URL.
    Http {
        url: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            account: None,
            subcommand: default_subcommand(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            attachment_placeholder: default_attachment(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            signal: SignalConfig::default(),
            dispatch: DispatchConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

// Default value functions for serde
fn default_version() -> String { "1".into() }
fn default_binary() -> String { "signal-cli".into() }
fn default_subcommand() -> String { DEFAULT_SUBCOMMAND.into() }
fn default_attachment() -> String { NO_ATTACHMENT.into() }
/// Exec args that pass every request field, in order.
pub fn default_exec_args() -> Vec<String> {
    ["sender", "conversation_id", "verb", "argument", "attachment"]
        .iter()
        .map(|field| format!("{{{{ {field} }}}}"))
        .collect()
}

fn re_account() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^\+[1-9][0-9]{1,14}$").expect("static regex"))
}

/// Check that an account looks like an E.164 phone number.
pub fn validate_account(account: &str) -> Result<(), ExitError> {
    if re_account().is_match(account) {
        Ok(())
    } else {
        Err(ExitError::Config(format!(
            "account {account:?} is not an E.164 number (e.g. +12025550123)"
        )))
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse_toml(&contents)
    }

    /// Load from an explicit path, or the first file `find_config` turns up,
    /// or fall back to defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => find_config(dir).map_or_else(|| Ok(Self::default()), |p| Self::load(&p)),
        }
    }

    /// Parse config from a TOML string.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).map_err(|e| {
            ExitError::Config(format!("invalid {CONFIG_FILE}: {e}")).into()
        })
    }

    /// Serialize config to a TOML string with helpful comments.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        let raw = toml::to_string_pretty(self)
            .context("serializing config to TOML")?;

        let mut doc: toml_edit::DocumentMut = raw.parse()
            .context("parsing generated TOML for comment injection")?;

        doc.decor_mut().set_prefix("# signal-bang configuration\n\n");

        fn set_table_comment(doc: &mut toml_edit::DocumentMut, key: &str, comment: &str) {
            if let Some(tbl) = doc.get_mut(key).and_then(|item| item.as_table_mut()) {
                tbl.decor_mut().set_prefix(comment);
            }
        }

        set_table_comment(&mut doc, "signal", "\n# signal-cli invocation: <binary> -u <account> <subcommand>\n");
        set_table_comment(&mut doc, "dispatch", "\n# What processors receive besides the command itself\n");
        set_table_comment(
            &mut doc,
            "processor",
            "\n# Who answers commands: kind = \"builtin\" | \"exec\" | \"http\"\n\
             # exec args are templates over sender, conversation_id, verb, argument, attachment\n",
        );

        Ok(doc.to_string())
    }

    /// The account to run as, validated.
    pub fn account(&self) -> Result<&str, ExitError> {
        let account = self.signal.account.as_deref().ok_or_else(|| {
            ExitError::Config("no account configured (set signal.account or pass --account)".into())
        })?;
        validate_account(account)?;
        Ok(account)
    }
}

impl ProcessorConfig {
    /// Build the configured processor.
    pub fn build(&self) -> anyhow::Result<Box<dyn Processor>> {
        Ok(match self {
            Self::Builtin => Box::new(BuiltinProcessor),
            Self::Exec {
                program,
                args,
                timeout_secs,
            } => Box::new(
                ExecProcessor::new(program, args.clone(), timeout_secs.map(Duration::from_secs))
                    .map_err(|e| ExitError::Config(format!("processor: {e}")))?,
            ),
            Self::Http { url, timeout_secs } => {
                Box::new(HttpProcessor::new(url, timeout_secs.map(Duration::from_secs)))
            }
        })
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Exec { .. } => "exec",
            Self::Http { .. } => "http",
        }
    }
}
