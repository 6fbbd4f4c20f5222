//! CLI type definitions
//!
//! Clap structures for the `mimic` command line.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mimic")]
#[command(
    about = "Mimic - persona-driven shopper simulations for recommendation agents",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .mimic/
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one simulation from a persona seed
    Run(RunArgs),

    /// Run one simulation per line of a seeds file
    Batch(BatchArgs),

    /// Inspect stored simulation sessions
    #[command(subcommand)]
    Sessions(SessionCommands),

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Free-text persona seed
    #[arg(short, long)]
    pub seed: String,

    /// Override simulation.max_steps (1-30)
    #[arg(short, long)]
    pub max_steps: Option<u32>,

    /// Write the run artifact to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Use scripted oracle and agent doubles instead of network services
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// File with one persona seed per line (blank lines and # comments skipped)
    #[arg(long, value_name = "FILE")]
    pub seeds_file: PathBuf,

    /// Directory receiving one `<run_id>.json` artifact per run
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override batch.max_concurrent_runs
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override simulation.max_steps (1-30)
    #[arg(short, long)]
    pub max_steps: Option<u32>,

    /// Use scripted oracle and agent doubles instead of network services
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List sessions, newest first
    List {
        /// Filter by status (running, completed, failed, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one session and its run summary
    Show {
        /// Session ID
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::try_parse_from([
            "mimic", "run", "--seed", "budget SUV shopper", "--max-steps", "4", "--dry-run",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.seed, "budget SUV shopper");
                assert_eq!(args.max_steps, Some(4));
                assert!(args.dry_run);
                assert!(args.output.is_none());
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_sessions_list_defaults() {
        let cli = Cli::try_parse_from(["mimic", "sessions", "list"]).unwrap();
        match cli.command {
            Commands::Sessions(SessionCommands::List { status, limit }) => {
                assert!(status.is_none());
                assert_eq!(limit, 20);
            }
            other => panic!("expected sessions list, got {other:?}"),
        }
    }

    #[test]
    fn test_run_requires_seed() {
        assert!(Cli::try_parse_from(["mimic", "run"]).is_err());
    }
}
