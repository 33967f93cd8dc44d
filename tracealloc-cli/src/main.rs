//! Tracealloc CLI - Command-line interface
//!
//! Provides command-line access to workload replay and trace analysis.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracealloc_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "tracealloc")]
#[command(about = "Allocator trace analysis and synthetic workload replay")]
struct Cli {
    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for a full trace-level log of the run
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

/// Exit status for input the user can correct.
const USER_ERROR_EXIT: u8 = 2;

fn run(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.log_level.as_tracing_level(), cli.log_dir.as_deref())
        .context("Failed to initialize logging")?;

    commands::handle_command(cli.command)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:?}");
            if commands::is_user_error(&error) {
                ExitCode::from(USER_ERROR_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_log_level_after_subcommand() {
        let cli = Cli::try_parse_from(["tracealloc", "params", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, CliLogLevel::Debug);
    }

    #[test]
    fn test_simulate_flags_parse() {
        let cli = Cli::try_parse_from([
            "tracealloc",
            "simulate",
            "--events",
            "100",
            "--seed",
            "7",
            "--allocator",
            "first-fit",
            "--heap-size",
            "4096",
        ])
        .unwrap();

        let commands::Commands::Simulate(args) = cli.command else {
            panic!("expected simulate command");
        };
        assert_eq!(args.events, Some(100));
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.allocator, commands::AllocatorKind::FirstFit);
        assert_eq!(args.heap_size, 4096);
    }
}
