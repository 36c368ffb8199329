//! Forms CLI - load, inspect and submit dynamic form definitions.
//!
//! Commands:
//! - `forms check <file>`: Build the form and bind every dependency
//! - `forms show <file> [--set PATH=VALUE]... [--json]`: Print field states
//! - `forms submit <file> [--set PATH=VALUE]...`: Print the submitted value
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error, including an invalid form on submit

use clap::Parser;
use tracing_subscriber::EnvFilter;

use forms::commands;
use forms::{Cli, Commands};

/// Map a command result to an exit code, reporting errors on stderr.
fn handle_result(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("swissarmyhammer_forms=debug,forms=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Check { file } => handle_result(commands::run_check(&file)),
        Commands::Show { file, sets, json } => {
            handle_result(commands::run_show(&file, &sets, json))
        }
        Commands::Submit { file, sets } => handle_result(commands::run_submit(&file, &sets)),
    };

    std::process::exit(exit_code);
}
