//! Agent trait definition.
//!
//! The planner, each drafting role and the aggregator implement this
//! trait, which gives the orchestrator a uniform way to run them.

use std::time::Duration;

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::AgentError;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output, reasoning removed and trimmed.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the pipeline.
///
/// Agents encapsulate a specific role (planning, drafting, synthesis)
/// with a fixed system prompt and sampling configuration.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &str;

    /// Pipeline stage this agent runs in, used in timeout errors.
    fn stage(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        1024
    }

    /// Executes the agent with the given user message.
    ///
    /// Reasoning blocks emitted by thinking models are stripped from the
    /// returned content.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        let response: ChatResponse = provider.chat(&request).await?;

        Ok(AgentResponse {
            content: strip_think_blocks(&response.content).trim().to_string(),
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }

    /// Executes the agent, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Timeout`] when the call takes too long, or
    /// whatever [`Agent::execute`] returns.
    async fn execute_within(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
        timeout: Duration,
    ) -> Result<AgentResponse, AgentError> {
        tokio::time::timeout(timeout, self.execute(provider, user_msg))
            .await
            .unwrap_or(Err(AgentError::Timeout {
                stage: self.stage(),
                seconds: timeout.as_secs(),
            }))
    }
}

/// Removes `<think>…</think>` reasoning blocks.
///
/// An unclosed block swallows the rest of the text.
#[must_use]
pub fn strip_think_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(close) => rest = &after_open[close + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("plain answer", "plain answer" ; "no block")]
    #[test_case("<think>hmm</think>Answer", "Answer" ; "leading block")]
    #[test_case("A<think>x</think>B<think>y</think>C", "ABC" ; "several blocks")]
    #[test_case("before<think>never closed", "before" ; "unclosed block")]
    #[test_case("<think>\nmulti\nline\n</think>\n\n{\"queries\":[]}", "\n\n{\"queries\":[]}" ; "json after block")]
    fn test_strip_think_blocks(input: &str, expected: &str) {
        assert_eq!(strip_think_blocks(input), expected);
    }
}
