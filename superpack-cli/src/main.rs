//! Superpack CLI - Command-line interface
//!
//! Builds and inspects superpack archives and fetches packs from a pack
//! server through the pack manager.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use console::style;
use superpack::logging::init_logging;

use commands::{build, deps, fetch, inspect};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "superpack", version, about = "Build, inspect and fetch asset superpacks")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pack a directory into a superpack archive
    Build(build::BuildArgs),
    /// Show footer, integrity and file table of an archive
    Inspect(inspect::InspectArgs),
    /// List the packs a request would download, in order
    Deps(deps::DepsArgs),
    /// Download, verify and mount packs from a server
    Fetch(fetch::FetchArgs),
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "superpack=info,superpack_cli=info",
        2 => "superpack=debug,superpack_cli=debug",
        _ => "trace",
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Build(args) => build::run(args),
        Commands::Inspect(args) => inspect::run(args),
        Commands::Deps(args) => deps::run(args),
        Commands::Fetch(args) => fetch::run(args),
    }
}

fn main() {
    let cli = Cli::parse();

    let _log_guard = match init_logging(log_filter(cli.verbose), cli.log_file.as_deref()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {}", style("warning:").yellow().bold(), e);
            None
        }
    };

    if let Err(e) = run(cli.command) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        process::exit(1);
    }
}
