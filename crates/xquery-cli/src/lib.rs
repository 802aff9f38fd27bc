//! `xqcore`: resolve XQuery modules and try casts from the command line.

mod commands;
mod util;

use anyhow::anyhow;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

pub use commands::cast::CastArgs;
pub use commands::check::CheckArgs;

#[derive(Parser, Debug)]
#[command(name = "xqcore", version, about = "XQuery module resolution and casting tools")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a module and its imports, then summarise the bindings.
    Check(CheckArgs),
    /// Cast a lexical value to an atomic type.
    Cast(CastArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = execute(&cli.command)?;
    println!("{output}");
    Ok(())
}

/// Runs one subcommand and returns what it would print.
pub fn execute(command: &Command) -> anyhow::Result<String> {
    let result = match command {
        Command::Check(args) => commands::check::run(args),
        Command::Cast(args) => commands::cast::run(args),
    };
    result.map_err(|err| anyhow!(err.to_string()))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
