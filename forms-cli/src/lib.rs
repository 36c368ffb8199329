//! Forms CLI - load, inspect and submit dynamic form definitions.
//!
//! The binary is a thin consumer of `swissarmyhammer-forms`: it builds a form
//! from a YAML or JSON definition, starts dependency tracking, applies
//! `--set PATH=VALUE` edits as user input and prints the result.

pub mod cli;
pub mod commands;
pub mod table;

pub use cli::{Cli, Commands};
