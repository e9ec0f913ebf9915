//! Conversation session.
//!
//! A [`Session`] owns the conversation [`History`] and runs the pipeline
//! once per question. The model is resolved when the session connects; a
//! service with no usable model fails there rather than on the first
//! question.

use std::sync::Arc;
use std::time::Instant;

use super::client::{SmokeResult, create_provider, resolve_model, smoke_test};
use super::config::{AgentConfig, AgentRole};
use super::history::History;
use super::orchestrator::Orchestrator;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::state::{TurnReport, TurnState};
use crate::error::AgentError;
use crate::monitor::{FileMonitor, Monitor, MonitorSet, SearchLog, TracingMonitor};
use crate::search::{SearchProvider, create_search_provider};

/// Longest question accepted, in bytes.
pub const MAX_QUESTION_LEN: usize = 10_000;

/// A conversation with the assistant.
///
/// `ask` takes `&mut self`, so calls on one session are serialized.
pub struct Session {
    orchestrator: Orchestrator,
    history: History,
    search_log: Arc<SearchLog>,
}

impl Session {
    /// Creates a builder for a session using `config`.
    #[must_use]
    pub fn builder(config: AgentConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            provider: None,
            search: None,
            prompts: None,
            monitors: Vec::new(),
        }
    }

    /// Asks a question and returns the answer text.
    ///
    /// Partial failures (planning, searches, individual drafts, the final
    /// synthesis) still produce text. See [`Session::ask_with_report`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for an empty or oversized
    /// question. History is left untouched.
    pub async fn ask(&mut self, question: &str) -> Result<String, AgentError> {
        self.ask_with_report(question).await.map(|report| report.answer)
    }

    /// Asks a question and returns the answer with turn diagnostics.
    ///
    /// The exchange is appended to history only when synthesis succeeded;
    /// an error answer is returned but not recorded.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for an empty or oversized
    /// question. History is left untouched.
    pub async fn ask_with_report(&mut self, question: &str) -> Result<TurnReport, AgentError> {
        let question = validate_question(question)?;
        let start = Instant::now();

        let window = self.orchestrator.config().history_window_turns;
        let mut state = TurnState::new(question, self.history.recent(window));
        self.orchestrator.run(&mut state).await?;

        let recorded = !state.aggregation_failed();
        if recorded {
            self.history
                .push_exchange(state.question(), state.final_answer());
        } else {
            tracing::warn!("turn not recorded in history because no answer was produced");
        }

        Ok(TurnReport::from_state(
            &state,
            self.orchestrator.model(),
            recorded,
            start.elapsed(),
        ))
    }

    /// Conversation so far.
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// Every search made during this session.
    #[must_use]
    pub fn search_log(&self) -> &SearchLog {
        &self.search_log
    }

    /// Model used for every stage.
    #[must_use]
    pub fn model(&self) -> &str {
        self.orchestrator.model()
    }

    /// Name of the language-model provider.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.orchestrator.provider().name()
    }

    /// Name of the search provider.
    #[must_use]
    pub fn search_provider_name(&self) -> &'static str {
        self.orchestrator.search_provider().name()
    }

    /// Configured drafting roles.
    #[must_use]
    pub fn roles(&self) -> &[AgentRole] {
        &self.orchestrator.config().roles
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        self.orchestrator.config()
    }

    /// Lists the models the service has available.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] when the service cannot be reached.
    pub async fn list_models(&self) -> Result<Vec<String>, AgentError> {
        self.orchestrator.provider().list_models().await
    }

    /// Times a few short prompts against the session's model.
    ///
    /// Does not touch the conversation or the search log.
    pub async fn test_model(&self) -> Vec<SmokeResult> {
        smoke_test(
            self.orchestrator.provider(),
            self.orchestrator.model(),
            self.orchestrator.config().stage_timeout,
        )
        .await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("orchestrator", &self.orchestrator)
            .field("history", &self.history.len())
            .field("searches", &self.search_log.len())
            .finish()
    }
}

fn validate_question(question: &str) -> Result<&str, AgentError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AgentError::Orchestration {
            message: "Question cannot be empty".to_string(),
        });
    }
    if question.len() > MAX_QUESTION_LEN {
        return Err(AgentError::Orchestration {
            message: format!(
                "Question exceeds maximum length ({} bytes, max {MAX_QUESTION_LEN})",
                question.len()
            ),
        });
    }
    Ok(trimmed)
}

/// Builder for [`Session`].
///
/// Providers not supplied explicitly are created from the configuration.
pub struct SessionBuilder {
    config: AgentConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    prompts: Option<PromptSet>,
    monitors: Vec<Arc<dyn Monitor>>,
}

impl SessionBuilder {
    /// Uses `provider` instead of creating one from the configuration.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Uses `search` instead of creating one from the configuration.
    #[must_use]
    pub fn search_provider(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Uses `prompts` instead of loading them from the prompt directory.
    #[must_use]
    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Adds a monitor that receives search and response events.
    #[must_use]
    pub fn monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitors.push(monitor);
        self
    }

    /// Resolves the model and creates the session.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ModelUnavailable`] when the service lists no
    /// usable model, [`AgentError::ApiRequest`] when it cannot be reached,
    /// and [`AgentError::UnsupportedProvider`] or
    /// [`AgentError::InvalidConfig`] for unknown provider names.
    pub async fn connect(self) -> Result<Session, AgentError> {
        let provider: Arc<dyn LlmProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::from(create_provider(&self.config)?),
        };
        let search: Arc<dyn SearchProvider> = match self.search {
            Some(search) => search,
            None => Arc::from(create_search_provider(&self.config).map_err(|e| {
                AgentError::InvalidConfig {
                    message: e.to_string(),
                }
            })?),
        };

        let model = resolve_model(&*provider, &self.config).await?;
        let prompts = self
            .prompts
            .unwrap_or_else(|| PromptSet::load(self.config.prompt_dir.as_deref()));

        let search_log = Arc::new(SearchLog::new());
        let mut monitors = MonitorSet::new()
            .with(Arc::new(TracingMonitor))
            .with(Arc::clone(&search_log) as Arc<dyn Monitor>);
        if let Some(path) = &self.config.log_file {
            let file = FileMonitor::open(path).map_err(|e| AgentError::InvalidConfig {
                message: format!("cannot open log file {}: {e}", path.display()),
            })?;
            monitors = monitors.with(Arc::new(file));
        }
        for monitor in self.monitors {
            monitors = monitors.with(monitor);
        }

        let orchestrator = Orchestrator::new(
            provider,
            search,
            Arc::new(monitors),
            self.config,
            prompts,
            model,
        );

        Ok(Session {
            orchestrator,
            history: History::new(),
            search_log,
        })
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .field("search", &self.search.as_ref().map(|s| s.name()))
            .field("monitors", &self.monitors.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_question() {
        assert_eq!(validate_question("  hi  ").unwrap_or_default(), "hi");
        assert!(validate_question("   \n").is_err());
        assert!(validate_question(&"a".repeat(MAX_QUESTION_LEN)).is_ok());
        assert!(validate_question(&"a".repeat(MAX_QUESTION_LEN + 1)).is_err());
    }
}
