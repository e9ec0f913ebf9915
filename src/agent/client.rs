//! Provider registry, factory and model selection.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations and
//! resolves which model a session should use.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatRequest, user_message};
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiCompatProvider;
use crate::agent::state::serialize_duration;
use crate::agent::traits::strip_think_blocks;
use crate::error::AgentError;

/// Prompts sent by [`smoke_test`].
pub const SMOKE_TEST_PROMPTS: [&str; 3] = [
    "Explain what Python is in one sentence.",
    "What is the capital of Brazil?",
    "How do you bake a simple cake?",
];

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"ollama"` (default): a local Ollama server through its OpenAI-compatible API
/// - `"openai"`: any other OpenAI-compatible API via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &AgentConfig) -> Result<Box<dyn LlmProvider>, AgentError> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OpenAiCompatProvider::new(config, "ollama"))),
        "openai" => Ok(Box::new(OpenAiCompatProvider::new(config, "openai"))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Picks the model to use from the models the service has available.
///
/// An explicit `requested` model must be listed. Otherwise the first model
/// whose id contains `preferred_family` wins, then the first listed model.
///
/// # Errors
///
/// Returns [`AgentError::ModelUnavailable`] when `available` is empty or the
/// requested model is not among them.
pub fn select_model(
    available: &[String],
    requested: Option<&str>,
    preferred_family: &str,
) -> Result<String, AgentError> {
    if available.is_empty() {
        return Err(AgentError::ModelUnavailable {
            hint: "the model service lists no models; pull one first, e.g. \
                   `ollama pull deepseek-r1:8b`"
                .to_string(),
        });
    }

    if let Some(requested) = requested {
        return available
            .iter()
            .find(|m| m.as_str() == requested)
            .cloned()
            .ok_or_else(|| AgentError::ModelUnavailable {
                hint: format!(
                    "model '{requested}' is not available; installed models: {}",
                    available.join(", ")
                ),
            });
    }

    let family = preferred_family.to_lowercase();
    let chosen = if family.is_empty() {
        None
    } else {
        available.iter().find(|m| m.to_lowercase().contains(&family))
    };

    Ok(chosen.unwrap_or(&available[0]).clone())
}

/// Lists the service's models and selects one with [`select_model`].
///
/// # Errors
///
/// Returns [`AgentError::ApiRequest`] if the service is unreachable, or
/// [`AgentError::ModelUnavailable`] if no suitable model is installed.
pub async fn resolve_model(
    provider: &dyn LlmProvider,
    config: &AgentConfig,
) -> Result<String, AgentError> {
    let available = provider.list_models().await?;
    let model = select_model(
        &available,
        config.model.as_deref(),
        &config.preferred_model_family,
    )?;
    tracing::info!(
        provider = provider.name(),
        model = %model,
        available = available.len(),
        "selected model"
    );
    Ok(model)
}

/// Outcome of one [`smoke_test`] prompt.
#[derive(Debug, Clone, Serialize)]
pub struct SmokeResult {
    /// The prompt sent.
    pub prompt: String,
    /// Model reply with reasoning blocks removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    /// Error text when the call failed or timed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time until the reply or error.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl SmokeResult {
    /// Whether the model answered.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.reply.is_some()
    }
}

/// Sends each of [`SMOKE_TEST_PROMPTS`] to `model` as a bare user message,
/// one after another, and times the replies.
///
/// Never fails as a whole: each prompt records its own error.
pub async fn smoke_test(
    provider: &dyn LlmProvider,
    model: &str,
    timeout: Duration,
) -> Vec<SmokeResult> {
    let mut results = Vec::with_capacity(SMOKE_TEST_PROMPTS.len());
    for prompt in SMOKE_TEST_PROMPTS {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![user_message(prompt)],
            temperature: None,
            max_tokens: None,
            json_mode: false,
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, provider.chat(&request))
            .await
            .unwrap_or(Err(AgentError::Timeout {
                stage: "smoke test",
                seconds: timeout.as_secs(),
            }));
        let elapsed = start.elapsed();

        let (reply, error) = match outcome {
            Ok(response) => {
                let reply = strip_think_blocks(&response.content).trim().to_string();
                (Some(reply), None)
            }
            Err(e) => {
                tracing::warn!(model = %model, prompt, error = %e, "smoke test prompt failed");
                (None, Some(e.to_string()))
            }
        };
        results.push(SmokeResult {
            prompt: prompt.to_string(),
            reply,
            error,
            elapsed,
        });
    }
    results
}
