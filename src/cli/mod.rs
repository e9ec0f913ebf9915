//! CLI layer for aegis.
//!
//! Provides the command-line interface using clap: an interactive chat
//! by default, plus one-shot `ask` and helper commands.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{ReplCommand, build_config, execute, run_repl};
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
