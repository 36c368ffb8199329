//! CLI definition for the forms command-line interface.
//!
//! Only depends on `clap` and `std`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Forms - load and drive dynamic form definitions.
///
/// A definition is a YAML (.yaml, .yml) or JSON (.json) file with a form
/// name, a list of fields and an optional initial model. Dependencies
/// between fields are written as CEL expressions over `value` (the source
/// field) and `form` (the whole form value).
#[derive(Parser, Debug)]
#[command(name = "forms")]
#[command(version)]
#[command(about = "Load, inspect and submit dynamic form definitions")]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a definition, build the form and bind every dependency
    Check {
        /// Form definition file
        file: PathBuf,
    },

    /// Print the state of every field after applying edits
    Show {
        /// Form definition file
        file: PathBuf,
        /// Edit a field before printing, as PATH=VALUE (repeatable, applied in order)
        #[arg(long = "set", value_name = "PATH=VALUE")]
        sets: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the submitted form value after applying edits
    Submit {
        /// Form definition file
        file: PathBuf,
        /// Edit a field before submitting, as PATH=VALUE (repeatable, applied in order)
        #[arg(long = "set", value_name = "PATH=VALUE")]
        sets: Vec<String>,
    },
}
