mod commands;
mod config;
mod context;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::context::Credentials;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Randomize newly created CRM contacts into trial groups.
#[derive(Parser)]
#[command(
    name = "cohort",
    version,
    about = "Randomize newly created CRM contacts into trial groups"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export, normalize, allocate, record and dispatch yesterday's contacts
    Run {
        /// Path to the run configuration TOML
        #[arg(long)]
        config: PathBuf,
        /// Run date override (YYYY-MM-DD); contacts created the day before are processed
        #[arg(long)]
        today: Option<String>,
        /// Use a local export CSV instead of requesting one from the CRM
        #[arg(long)]
        export_file: Option<PathBuf>,
        /// Allocate and diff against the store, but record and dispatch nothing
        #[arg(long)]
        dry_run: bool,
        /// Exit with status 2 if any dispatch failed
        #[arg(long)]
        strict: bool,
    },

    /// Preview a seeded partition of contact IDs
    Allocate {
        /// File with one ID per line, or a CSV with a VanID column
        input: PathBuf,
        /// Comma-separated group labels, in order
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,
        /// Shuffle seed
        #[arg(long, default_value_t = cohort_core::DEFAULT_SEED)]
        seed: u64,
    },

    /// Check a run configuration without contacting any service
    Validate {
        /// Path to the run configuration TOML
        config: PathBuf,
    },

    /// List recorded assignments
    History {
        /// Path to the run configuration TOML
        #[arg(long)]
        config: PathBuf,
        /// Only show this group
        #[arg(long)]
        label: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.quiet);

    match cli.command {
        Commands::Run {
            config,
            today,
            export_file,
            dry_run,
            strict,
        } => {
            commands::cmd_run(
                commands::RunOptions {
                    config: &config,
                    today: today.as_deref(),
                    export_file: export_file.as_deref(),
                    dry_run,
                    strict,
                },
                Credentials::from_env(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Allocate {
            input,
            labels,
            seed,
        } => {
            commands::cmd_allocate(&input, &labels, seed, cli.output, cli.quiet);
        }
        Commands::Validate { config } => {
            commands::cmd_validate(&config, cli.output, cli.quiet);
        }
        Commands::History { config, label } => {
            commands::cmd_history(&config, label.as_deref(), cli.output, cli.quiet);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
