//! Drafting agent.
//!
//! One instance per configured [`AgentRole`]. Each drafts an answer from
//! its role's perspective over the shared question, history and sources.
//! The orchestrator runs all of them concurrently.

use std::time::Duration;

use async_trait::async_trait;

use super::config::{AgentConfig, AgentRole};
use super::prompt::role_system_prompt;
use super::provider::LlmProvider;
use super::state::Draft;
use super::traits::{Agent, AgentResponse};
use crate::error::AgentError;

/// Agent that drafts an answer for a single role.
pub struct DraftAgent {
    role: AgentRole,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    system_prompt: String,
}

impl DraftAgent {
    /// Creates a drafting agent for `role`.
    ///
    /// `base_prompt` is the shared drafter template; the role's name and
    /// focus are appended to it.
    #[must_use]
    pub fn new(config: &AgentConfig, role: AgentRole, model: &str, base_prompt: &str) -> Self {
        let system_prompt = role_system_prompt(base_prompt, &role, config.language.as_deref());
        Self {
            role,
            model: model.to_string(),
            max_tokens: config.draft_max_tokens,
            timeout: config.stage_timeout,
            system_prompt,
        }
    }

    /// The role this agent drafts for.
    #[must_use]
    pub const fn role(&self) -> &AgentRole {
        &self.role
    }

    /// Runs the model call for this role within the stage timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the call fails or times out.
    pub async fn answer(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        self.execute_within(provider, user_msg, self.timeout).await
    }

    /// Produces this role's draft.
    ///
    /// Never fails: a model error or timeout becomes a draft whose content
    /// names the role and the error. The model response is returned
    /// alongside when the call succeeded.
    pub async fn draft(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> (Draft, Option<AgentResponse>) {
        match self.answer(provider, user_msg).await {
            Ok(response) => {
                if response.finish_reason.as_deref() == Some("length") {
                    tracing::debug!(
                        role = %self.role.name,
                        max_tokens = self.max_tokens,
                        "draft truncated at token limit"
                    );
                }
                (Draft::success(&self.role.name, &response.content), Some(response))
            }
            Err(e) => {
                tracing::warn!(role = %self.role.name, error = %e, "draft failed");
                (Draft::failure(&self.role.name, &e), None)
            }
        }
    }
}

#[async_trait]
impl Agent for DraftAgent {
    fn name(&self) -> &str {
        &self.role.name
    }

    fn stage(&self) -> &'static str {
        "draft"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        self.role.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::prompt::DRAFTER_SYSTEM_PROMPT;

    #[test]
    fn test_agent_properties() {
        let config = AgentConfig::builder()
            .draft_max_tokens(321)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let role = AgentRole::new("caveats-limitations", "Point out limits.", 0.2);
        let agent = DraftAgent::new(&config, role, "m", DRAFTER_SYSTEM_PROMPT);
        assert_eq!(agent.name(), "caveats-limitations");
        assert_eq!(agent.stage(), "draft");
        assert_eq!(agent.max_tokens(), 321);
        assert!((agent.temperature() - 0.2).abs() < f32::EPSILON);
        assert!(agent.system_prompt().contains("Your role: caveats-limitations"));
        assert!(!agent.json_mode());
    }
}
