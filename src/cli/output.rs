//! Output formatting for CLI commands.
//!
//! Every formatter renders either human-readable text or JSON.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::client::SmokeResult;
use crate::agent::config::AgentRole;
use crate::agent::state::TurnReport;
use crate::monitor::SearchRecord;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format's JSON flavor, newline-terminated.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        let mut out = rendered.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
        out.push('\n');
        out
    }
}

/// Snapshot of a session for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo<'a> {
    /// Model in use.
    pub model: &'a str,
    /// Language-model provider name.
    pub provider: &'a str,
    /// Model service endpoint.
    pub base_url: &'a str,
    /// Search provider name.
    pub search_provider: &'a str,
    /// Configured roles.
    pub roles: &'a [AgentRole],
    /// Whether answers come from every role plus a synthesis.
    pub multi_agent: bool,
    /// Searches made so far.
    pub searches: usize,
    /// Turns recorded in history.
    pub history_turns: usize,
}

/// Formats a completed turn.
///
/// Text output is the answer followed by a one-line diagnostics footer.
#[must_use]
pub fn format_report(report: &TurnReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = report.answer.clone();
            let failed_drafts = report.drafts.iter().filter(|d| d.failed).count();
            let _ = write!(
                out,
                "\n\n---\nModel: {} | Queries: {} | Sources: {} ({} failed searches) | \
                 Drafts: {} ok, {} failed | Tokens: {} | Time: {:.1}s",
                report.model,
                report.queries.len(),
                report.results,
                report.search_errors,
                report.drafts.len() - failed_drafts,
                failed_drafts,
                report.total_tokens,
                report.elapsed.as_secs_f64()
            );
            if !report.recorded {
                out.push_str("\nThe answer failed; this turn was not added to the conversation.");
            }
            out.push('\n');
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(report),
    }
}

/// Formats the configured roles.
#[must_use]
pub fn format_roles(roles: &[AgentRole], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!("Collaborative agents ({}):\n", roles.len());
            for role in roles {
                let _ = writeln!(
                    out,
                    "  {} (temperature {:.2})\n    {}",
                    role.name, role.temperature, role.focus
                );
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(roles),
    }
}

/// Formats the list of available models, marking the one in use.
#[must_use]
pub fn format_models(models: &[String], current: Option<&str>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if models.is_empty() {
                return "No models available.\n".to_string();
            }
            let mut out = format!("Available models ({}):\n", models.len());
            for model in models {
                let marker = if Some(model.as_str()) == current { "*" } else { " " };
                let _ = writeln!(out, " {marker} {model}");
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(&serde_json::json!({
            "models": models,
            "current": current,
        })),
    }
}

/// Formats recent searches, oldest first.
#[must_use]
pub fn format_search_history(records: &[SearchRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                return "No searches yet.\n".to_string();
            }
            let mut out = format!("Recent searches ({}):\n", records.len());
            for record in records {
                let _ = writeln!(
                    out,
                    "  [{}] {} ({} results)",
                    record.timestamp.format("%H:%M:%S"),
                    record.query,
                    record.result_count
                );
                for source in record.sources.iter().take(3) {
                    let _ = writeln!(out, "      {source}");
                }
                if record.sources.len() > 3 {
                    let _ = writeln!(out, "      ... (+{})", record.sources.len() - 3);
                }
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(records),
    }
}

/// Formats the results of a model smoke test.
#[must_use]
pub fn format_smoke_test(model: &str, results: &[SmokeResult], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!("Testing model {model}...\n");
            for (i, result) in results.iter().enumerate() {
                let _ = writeln!(out, "\nTest {}: {}", i + 1, result.prompt);
                let secs = result.elapsed.as_secs_f64();
                match (&result.reply, &result.error) {
                    (Some(reply), _) => {
                        let _ = writeln!(out, "OK ({secs:.1}s)\n{reply}");
                    }
                    (None, error) => {
                        let _ = writeln!(
                            out,
                            "FAILED ({secs:.1}s): {}",
                            error.as_deref().unwrap_or("no reply")
                        );
                    }
                }
            }
            let passed = results.iter().filter(|r| r.passed()).count();
            let _ = writeln!(out, "\n{passed}/{} prompts answered.", results.len());
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(&serde_json::json!({
            "model": model,
            "results": results,
        })),
    }
}

/// Formats session status.
#[must_use]
pub fn format_status(status: &StatusInfo<'_>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let names: Vec<&str> = status.roles.iter().map(|r| r.name.as_str()).collect();
            let agents = if status.multi_agent {
                names.join(", ")
            } else {
                "single answer".to_string()
            };
            format!(
                "Model: {}\nProvider: {} ({})\nSearch: {}\nAgents: {}\n\
                 Searches made: {}\nTurns in history: {}\n",
                status.model,
                status.provider,
                status.base_url,
                status.search_provider,
                agents,
                status.searches,
                status.history_turns
            )
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(status),
    }
}
