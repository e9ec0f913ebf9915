//! Aggregator agent.
//!
//! Merges every role's draft into the final answer. Runs only after all
//! drafts are in.

use std::time::Duration;

use async_trait::async_trait;

use super::config::AgentConfig;
use super::prompt::with_language;
use super::provider::LlmProvider;
use super::traits::{Agent, AgentResponse};
use crate::error::AgentError;

/// Agent that synthesizes drafts into a final answer.
pub struct AggregatorAgent {
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    system_prompt: String,
}

impl AggregatorAgent {
    /// Creates a new aggregator with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, model: &str, system_prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: config.aggregator_max_tokens,
            temperature: config.aggregator_temperature,
            timeout: config.stage_timeout,
            system_prompt: with_language(system_prompt, config.language.as_deref()),
        }
    }

    /// Synthesizes the final answer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the model call fails, times out or
    /// returns nothing.
    pub async fn aggregate(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let response = self.execute_within(provider, user_msg, self.timeout).await?;
        if response.content.is_empty() {
            return Err(AgentError::ResponseParse {
                message: "aggregator returned an empty answer".to_string(),
                content: String::new(),
            });
        }
        Ok(response)
    }
}

/// The text shown to the user when aggregation fails.
#[must_use]
pub fn aggregation_error_message(error: &AgentError) -> String {
    format!("Failed to synthesize the agents' answers: {error}")
}

#[async_trait]
impl Agent for AggregatorAgent {
    fn name(&self) -> &str {
        "aggregator"
    }

    fn stage(&self) -> &'static str {
        "aggregate"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
