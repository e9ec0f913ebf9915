//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aegis: web-search augmented assistant for local language models.
///
/// Plans search queries for each question, searches the web, drafts
/// answers from several perspectives in parallel and synthesizes them.
/// Runs an interactive chat when no subcommand is given.
#[derive(Parser, Debug)]
#[command(name = "aegis")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging on stderr).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Model to use. Selected automatically when omitted.
    #[arg(short, long, global = true, env = "AEGIS_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible model endpoint.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to the config file.
    ///
    /// Defaults to `$AEGIS_CONFIG_PATH` or `~/.config/aegis/config.toml`.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory containing prompt template files.
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// Language the answers should be written in.
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Answer with a single model call instead of several drafts plus a
    /// synthesis. Planning and search still run.
    #[arg(long, global = true)]
    pub single_agent: bool,

    /// Append search and response events to this file as JSON lines.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// The subcommand to execute. Starts a chat when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session.
    ///
    /// Type a question and press enter. `history` lists recent searches,
    /// `models` lists available models, `roles` the drafting agents,
    /// `status` the session state, `test` times a few short prompts
    /// against the model. `exit` or `quit` ends the session.
    Chat,

    /// Ask a single question and print the answer.
    #[command(after_help = r#"Examples:
  aegis ask "what changed in rust 1.85?"
  aegis ask --model llama3.1:8b how do I rotate ssh keys
  aegis --format json ask "capital of brazil" | jq .answer
"#)]
    Ask {
        /// The question. Multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// List models available on the model service.
    #[command(after_help = r#"Examples:
  aegis models
  aegis models --test            # Time three short prompts against the model
  aegis -m llama3.1:8b models --test
"#)]
    Models {
        /// Send three short prompts to the selected model and time each reply.
        #[arg(long)]
        test: bool,
    },

    /// Show the configured drafting roles.
    Roles,

    /// Write default prompt templates to a directory.
    ///
    /// Existing files are not overwritten.
    #[command(after_help = r#"Examples:
  aegis init-prompts                      # Write to ~/.config/aegis/prompts/
  aegis init-prompts --dir ./my-prompts   # Write to custom directory
"#)]
    InitPrompts {
        /// Target directory (default: ~/.config/aegis/prompts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Write an example config file.
    ///
    /// An existing file is left untouched.
    InitConfig {
        /// Target path (default: the config file location).
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

impl Cli {
    /// Returns the question of an `ask` command as a single string.
    #[must_use]
    pub fn question(&self) -> Option<String> {
        match &self.command {
            Some(Commands::Ask { question }) => Some(question.join(" ")),
            _ => None,
        }
    }
}
