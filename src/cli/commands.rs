//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::format_push_string)]

use std::fmt::Write as FmtWrite;
use std::io::{self, BufRead, Write as IoWrite};
use std::path::Path;

use tokio::runtime::Runtime;

use crate::agent::config::{AgentConfig, default_config_path, write_example_config};
use crate::agent::prompt::PromptSet;
use crate::agent::{Session, create_provider, resolve_model, smoke_test};
use crate::cli::output::{
    OutputFormat, StatusInfo, format_models, format_report, format_roles, format_search_history,
    format_smoke_test, format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::error::{AgentError, CommandError, Result};

/// Number of searches shown by the `history` chat command.
const HISTORY_DISPLAY_COUNT: usize = 5;

/// Executes the CLI command.
///
/// Chat output is written to stdout as the session runs; every other
/// command returns its output for the caller to print.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the model service
/// cannot be reached or has no usable model, or a file cannot be written.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        None | Some(Commands::Chat) => cmd_chat(cli, format),
        Some(Commands::Ask { question }) => cmd_ask(cli, &question.join(" "), format),
        Some(Commands::Models { test }) => cmd_models(cli, *test, format),
        Some(Commands::Roles) => cmd_roles(cli, format),
        Some(Commands::InitPrompts { dir }) => cmd_init_prompts(dir.as_deref(), format),
        Some(Commands::InitConfig { path }) => cmd_init_config(path.as_deref(), format),
    }
}

/// Resolves configuration from CLI flags, environment and config file.
///
/// Flags win over environment variables, which win over the file.
///
/// # Errors
///
/// Returns [`AgentError::InvalidConfig`] if the config file is malformed
/// or the resolved values fail validation.
pub fn build_config(cli: &Cli) -> std::result::Result<AgentConfig, AgentError> {
    let mut builder = AgentConfig::builder();
    if let Some(model) = &cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(url) = &cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(dir) = &cli.prompt_dir {
        builder = builder.prompt_dir(dir.clone());
    }
    if let Some(language) = &cli.language {
        builder = builder.language(language.clone());
    }
    if cli.single_agent {
        builder = builder.multi_agent(false);
    }
    if let Some(path) = &cli.log_file {
        builder = builder.log_file(path.clone());
    }

    let builder = builder.from_env();
    let builder = match &cli.config {
        Some(path) => builder.from_file(path)?,
        None => builder.from_default_file()?,
    };
    builder.build()
}

fn runtime() -> Result<Runtime> {
    Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn connect(rt: &Runtime, config: AgentConfig) -> Result<Session> {
    Ok(rt.block_on(Session::builder(config).connect())?)
}

fn cmd_ask(cli: &Cli, question: &str, format: OutputFormat) -> Result<String> {
    let config = build_config(cli)?;
    let rt = runtime()?;
    let mut session = connect(&rt, config)?;
    let report = rt.block_on(session.ask_with_report(question))?;
    Ok(format_report(&report, format))
}

fn cmd_models(cli: &Cli, test: bool, format: OutputFormat) -> Result<String> {
    let config = build_config(cli)?;
    let provider = create_provider(&config)?;
    let rt = runtime()?;
    if test {
        let model = rt.block_on(resolve_model(&*provider, &config))?;
        let results = rt.block_on(smoke_test(&*provider, &model, config.stage_timeout));
        return Ok(format_smoke_test(&model, &results, format));
    }
    let models = rt.block_on(provider.list_models())?;
    Ok(format_models(&models, config.model.as_deref(), format))
}

fn cmd_roles(cli: &Cli, format: OutputFormat) -> Result<String> {
    let config = build_config(cli)?;
    Ok(format_roles(&config.roles, format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target = match dir {
        Some(d) => d.to_path_buf(),
        None => PromptSet::default_dir().ok_or_else(|| {
            CommandError::ExecutionFailed("Cannot determine home directory".to_string())
        })?,
    };

    let written = PromptSet::write_defaults(&target)?;

    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            if written.is_empty() {
                let _ = writeln!(
                    output,
                    "All prompt templates already exist in: {}",
                    target.display()
                );
            } else {
                let _ = writeln!(
                    output,
                    "Wrote {} prompt template(s) to: {}",
                    written.len(),
                    target.display()
                );
                for path in &written {
                    let _ = writeln!(output, "  {}", path.display());
                }
            }
            Ok(output)
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let files: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
            let json = serde_json::json!({
                "directory": target.display().to_string(),
                "written": files,
                "count": files.len(),
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_init_config(path: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path().ok_or_else(|| {
            CommandError::ExecutionFailed("Cannot determine config directory".to_string())
        })?,
    };

    let written = write_example_config(&target)?;

    match format {
        OutputFormat::Text => Ok(if written {
            format!("Config file created at: {}\n", target.display())
        } else {
            format!(
                "Config file already exists at: {} (left unchanged)\n",
                target.display()
            )
        }),
        OutputFormat::Json | OutputFormat::Ndjson => Ok(format.to_json(&serde_json::json!({
            "path": target.display().to_string(),
            "written": written,
        }))),
    }
}

fn cmd_chat(cli: &Cli, format: OutputFormat) -> Result<String> {
    let config = build_config(cli)?;
    let rt = runtime()?;
    let mut session = connect(&rt, config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_repl(&rt, &mut session, stdin.lock(), stdout.lock(), format)?;
    Ok(String::new())
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// End the session.
    Exit,
    /// Show recent searches.
    History,
    /// List available models.
    Models,
    /// Show drafting roles.
    Roles,
    /// Show session status.
    Status,
    /// Time a few short prompts against the model.
    Test,
    /// Blank line.
    Empty,
    /// Anything else is a question.
    Question(String),
}

impl ReplCommand {
    /// Classifies an input line. Commands are case-insensitive.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Self::Empty,
            "exit" | "quit" | "sair" | "/exit" | "/quit" => Self::Exit,
            "history" | "/history" => Self::History,
            "models" | "/models" => Self::Models,
            "roles" | "/roles" => Self::Roles,
            "status" | "/status" => Self::Status,
            "test" | "teste" | "/test" => Self::Test,
            _ => Self::Question(trimmed.to_string()),
        }
    }
}

/// Runs the interactive loop until `exit` or end of input.
///
/// Each question runs to completion before the next line is read. Ctrl-C
/// while a question is running abandons that turn and leaves the
/// conversation unchanged. Errors from a single turn are printed and the
/// loop continues.
///
/// # Errors
///
/// Returns an error only when reading input or writing output fails.
pub fn run_repl<R: BufRead, W: IoWrite>(
    rt: &Runtime,
    session: &mut Session,
    mut input: R,
    mut output: W,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Text {
        let names: Vec<&str> = session.roles().iter().map(|r| r.name.as_str()).collect();
        writeln!(
            output,
            "aegis ready. Model: {} | Agents: {}\n\
             Commands: history, models, roles, status, test, exit (or Ctrl-D)\n",
            session.model(),
            names.join(", ")
        )?;
    }

    let mut line = String::new();
    loop {
        if format == OutputFormat::Text {
            write!(output, "> ")?;
        }
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Exit => break,
            ReplCommand::History => {
                let records = session.search_log().recent(HISTORY_DISPLAY_COUNT);
                write!(output, "{}", format_search_history(&records, format))?;
            }
            ReplCommand::Models => {
                let text = match rt.block_on(session.list_models()) {
                    Ok(models) => format_models(&models, Some(session.model()), format),
                    Err(e) => format!("Error: {e}\n"),
                };
                write!(output, "{text}")?;
            }
            ReplCommand::Roles => {
                write!(output, "{}", format_roles(session.roles(), format))?;
            }
            ReplCommand::Test => {
                let results = rt.block_on(session.test_model());
                write!(output, "{}", format_smoke_test(session.model(), &results, format))?;
            }
            ReplCommand::Status => {
                let config = session.config();
                let status = StatusInfo {
                    model: session.model(),
                    provider: session.provider_name(),
                    base_url: &config.base_url,
                    search_provider: session.search_provider_name(),
                    roles: &config.roles,
                    multi_agent: config.multi_agent,
                    searches: session.search_log().len(),
                    history_turns: session.history().len(),
                };
                write!(output, "{}", format_status(&status, format))?;
            }
            ReplCommand::Question(question) => {
                let turn = session.ask_with_report(&question);
                let outcome = rt.block_on(async {
                    tokio::select! {
                        result = turn => Some(result),
                        _ = tokio::signal::ctrl_c() => None,
                    }
                });
                match outcome {
                    Some(Ok(report)) => writeln!(output, "{}", format_report(&report, format))?,
                    Some(Err(e)) => writeln!(output, "Error: {e}\n")?,
                    None => writeln!(output, "\nInterrupted; question abandoned.\n")?,
                }
            }
        }
    }

    if format == OutputFormat::Text {
        writeln!(output, "Bye.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("exit", ReplCommand::Exit ; "exit")]
    #[test_case("  QUIT \n", ReplCommand::Exit ; "quit uppercase")]
    #[test_case("sair", ReplCommand::Exit ; "sair")]
    #[test_case("history", ReplCommand::History ; "history")]
    #[test_case("/models", ReplCommand::Models ; "slash models")]
    #[test_case("roles", ReplCommand::Roles ; "roles")]
    #[test_case("status", ReplCommand::Status ; "status")]
    #[test_case("teste", ReplCommand::Test ; "test alias")]
    #[test_case("/TEST", ReplCommand::Test ; "slash test")]
    #[test_case("   \n", ReplCommand::Empty ; "blank")]
    fn test_repl_command_parse(line: &str, expected: ReplCommand) {
        assert_eq!(ReplCommand::parse(line), expected);
    }

    #[test]
    fn test_repl_question_is_trimmed() {
        assert_eq!(
            ReplCommand::parse("  what is the history of rome?\n"),
            ReplCommand::Question("what is the history of rome?".to_string())
        );
    }

    #[test]
    fn test_build_config_flags_win() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"from-file\"\nmax_queries = 2\n")
            .unwrap_or_else(|_| unreachable!());
        let path_arg = path.display().to_string();

        let cli = Cli::try_parse_from(["aegis", "--model", "from-flag", "--config", &path_arg])
            .unwrap_or_else(|_| unreachable!());
        let config = build_config(&cli).unwrap_or_else(|_| unreachable!());
        assert_eq!(config.model.as_deref(), Some("from-flag"));
        assert_eq!(config.max_queries, 2);
    }

    #[test]
    fn test_build_config_bad_file() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "no_such_option = 1\n").unwrap_or_else(|_| unreachable!());
        let path_arg = path.display().to_string();

        let cli = Cli::try_parse_from(["aegis", "--config", &path_arg])
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            build_config(&cli),
            Err(AgentError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_init_prompts_writes_then_skips() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let out = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.starts_with("Wrote 3 prompt template(s)"));
        assert!(dir.path().join("planner.md").exists());

        let again = cmd_init_prompts(Some(dir.path()), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value = serde_json::from_str(&again).unwrap_or_default();
        assert_eq!(value["count"], 0);
    }

    #[test]
    fn test_init_config_never_overwrites() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("nested").join("config.toml");

        let out = cmd_init_config(Some(&path), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.starts_with("Config file created at:"));

        std::fs::write(&path, "# mine\n").unwrap_or_else(|_| unreachable!());
        let out = cmd_init_config(Some(&path), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.contains("left unchanged"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap_or_default(),
            "# mine\n"
        );
    }
}
