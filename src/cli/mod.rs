//! Command-line interface for lessonforge.
//!
//! Provides commands for question generation, text editing and listing
//! saved blocks.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
