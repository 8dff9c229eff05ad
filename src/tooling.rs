//! Tooling
//!
//! Command-line front end over the library: argument parsing, command
//! execution and human-readable output.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
