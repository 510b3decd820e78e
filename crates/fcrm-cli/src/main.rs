//! # fcrm CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fcrm_cli::check::{run_validate, ValidateArgs};
use fcrm_cli::code::{run_next_code, NextCodeArgs};
use fcrm_cli::entity::{run_create, run_history, run_transition, CreateArgs, HistoryArgs, TransitionArgs};
use fcrm_cli::table::{run_table, TableArgs};

/// Fleet CRM lifecycle engine.
///
/// Inspects transition tables, computes reference codes, validates status
/// changes, and creates and moves records.
#[derive(Parser, Debug)]
#[command(name = "fcrm", version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the transition table of a kind.
    Table(TableArgs),

    /// Compute the next reference code in a scope.
    NextCode(NextCodeArgs),

    /// Check a transition against the table.
    Validate(ValidateArgs),

    /// Create a record with a fresh reference code.
    Create(CreateArgs),

    /// Move a record to another status.
    Transition(TransitionArgs),

    /// Show a record's audit log, status timeline and SLA breaches.
    History(HistoryArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let result = match &cli.command {
        Commands::Table(args) => run_table(args),
        Commands::NextCode(args) => run_next_code(args),
        Commands::Validate(args) => run_validate(args),
        Commands::Create(args) => run_create(args),
        Commands::Transition(args) => run_transition(args),
        Commands::History(args) => run_history(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
