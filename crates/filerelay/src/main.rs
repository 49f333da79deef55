//! filerelay launcher
//!
//! Runs one reconciliation pass per invocation; meant to be scheduled
//! (cron, systemd timer) rather than kept running.

use anyhow::Result;
use clap::{Parser, Subcommand};
use filerelay_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "filerelay", about = "Attach inbound SFTP files to their records", version)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Settings file
    #[arg(long, global = true, env = "FILERELAY_CONFIG", default_value = "filerelay.toml")]
    config: PathBuf,

    /// Directory for log files (default: ~/.filerelay/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the live directory once, then purge the archive
    Run {
        /// Resolve records without downloading, uploading or moving files
        #[arg(long)]
        dry_run: bool,

        /// Output the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the settings file and list the rules (no network access)
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(cmd: &Commands) -> bool {
    match cmd {
        Commands::Run { json, .. } | Commands::Check { json } => *json,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    let _log_guard = match init_logging(LogConfig {
        app_name: "filerelay",
        verbose: cli.verbose,
        log_dir: cli.log_dir.clone(),
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { dry_run, json } => cli::run::run(cli::run::RunArgs {
            config: cli.config,
            dry_run,
            json,
        }),
        Commands::Check { json } => cli::check::run(cli::check::CheckArgs {
            config: cli.config,
            json,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from(["filerelay", "--config", "x.toml", "run", "--dry-run", "--json"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.command, Commands::Run { dry_run: true, json: true }));
        assert!(command_wants_json(&cli.command));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["filerelay", "check", "-v", "--log-dir", "/tmp/logs"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/logs")));
    }
}
