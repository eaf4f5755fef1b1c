use std::process::ExitCode;

use clap::{Parser, Subcommand};

use signal_bang::commands::{self, init::InitArgs, parse::ParseArgs, replay::ReplayArgs, run::RunArgs};
use signal_bang::error::ExitError;
use signal_bang::telemetry::{self, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "signal-bang",
    version,
    about = "Answer !commands arriving through signal-cli's JSON event loop"
)]
struct Cli {
    /// Log output format (logs go to stderr; filter with SIGNAL_BANG_LOG)
    #[arg(long, global = true, value_enum, env = "SIGNAL_BANG_LOG_FORMAT", default_value_t)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start signal-cli and answer commands until it exits
    Run(RunArgs),
    /// Run recorded event lines through the loop, replies to stdout
    Replay(ReplayArgs),
    /// Show how a message would be parsed as a command
    Parse(ParseArgs),
    /// Print the JSON Schema for .signal-bang.toml
    Schema,
    /// Write a commented default config
    Init(InitArgs),
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Replay(_) => "replay",
            Self::Parse(_) => "parse",
            Self::Schema => "schema",
            Self::Init(_) => "init",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _telemetry = telemetry::init(cli.log_format);

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Run(args) => args.execute(),
        Commands::Replay(args) => args.execute(),
        Commands::Parse(args) => args.execute(),
        Commands::Schema => commands::schema::run_schema(),
        Commands::Init(args) => args.execute(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<ExitError>() {
                eprintln!("error: {exit_err}");
                exit_err.exit_code()
            } else {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
