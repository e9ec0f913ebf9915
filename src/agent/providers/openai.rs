//! OpenAI-compatible provider implementation using the `async-openai` crate.
//!
//! Ollama exposes the same chat completion and model listing endpoints
//! under `/v1`, so one adapter serves both a local Ollama server and any
//! hosted OpenAI-compatible API.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, ResponseFormat,
};
use async_trait::async_trait;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::AgentError;

/// OpenAI-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions and model listing.
pub struct OpenAiCompatProvider {
    client: Client<OpenAIConfig>,
    label: &'static str,
    base_url: String,
}

impl OpenAiCompatProvider {
    /// Creates a new provider from agent configuration.
    ///
    /// `label` is reported by [`LlmProvider::name`].
    #[must_use]
    pub fn new(config: &AgentConfig, label: &'static str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            label,
            base_url: config.base_url.clone(),
        }
    }

    /// Converts our message type to the SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds an SDK chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let response_format = if request.json_mode {
            Some(ResponseFormat::JsonObject)
        } else {
            None
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            response_format,
            ..Default::default()
        }
    }

    fn map_error(&self, e: &OpenAIError) -> AgentError {
        let status = match e {
            OpenAIError::Reqwest(inner) => inner.status().map(|s| s.as_u16()),
            _ => None,
        };
        let message = match e {
            OpenAIError::Reqwest(inner) if inner.is_connect() => format!(
                "cannot reach model service at {} ({e}); is it running?",
                self.base_url
            ),
            _ => e.to_string(),
        };
        AgentError::ApiRequest { message, status }
    }
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("label", &self.label)
            .field("base_url", &self.base_url)
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| self.map_error(&e))?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, AgentError> {
        let response = self
            .client
            .models()
            .list()
            .await
            .map_err(|e| self.map_error(&e))?;

        Ok(response.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message;

    fn request(json_mode: bool, temperature: Option<f32>) -> ChatRequest {
        ChatRequest {
            model: "deepseek-r1:8b".to_string(),
            messages: vec![
                message::system_message("sys"),
                message::user_message("test"),
            ],
            temperature,
            max_tokens: Some(100),
            json_mode,
        }
    }

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = OpenAiCompatProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_user_message() {
        let msg = message::user_message("hello");
        let converted = OpenAiCompatProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_build_request_json_mode() {
        let built = OpenAiCompatProvider::build_request(&request(true, Some(0.0)));
        assert!(built.response_format.is_some());
        assert_eq!(built.messages.len(), 2);
        assert_eq!(built.max_completion_tokens, Some(100));
    }

    #[test]
    fn test_build_request_keeps_zero_temperature() {
        let built = OpenAiCompatProvider::build_request(&request(false, Some(0.0)));
        assert!(built.response_format.is_none());
        assert_eq!(built.temperature, Some(0.0));
    }

    #[test]
    fn test_provider_label() {
        let config = AgentConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = OpenAiCompatProvider::new(&config, "ollama");
        assert_eq!(provider.name(), "ollama");
        assert!(format!("{provider:?}").contains("localhost:11434"));
    }
}
