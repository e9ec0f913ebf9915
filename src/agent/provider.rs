//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls and report which models the service
//! has available.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer for a specific service while
/// presenting a uniform interface to the pipeline stages.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"ollama"`, `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or unreadable responses.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Lists the model ids registered with the service.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] when the service cannot be reached.
    async fn list_models(&self) -> Result<Vec<String>, AgentError>;
}
