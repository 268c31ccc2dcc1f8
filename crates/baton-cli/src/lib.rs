//! Baton CLI library.
//!
//! Configuration resolution, command implementations and terminal output for
//! the `baton` binary.

pub mod commands;
pub mod output;

pub use output::OutputFormat;

/// Environment variable pointing at a default configuration file
pub const ENV_CONFIG_PATH: &str = "BATON_CONFIG_PATH";
