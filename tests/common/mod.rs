//! Shared test doubles for the pipeline integration tests.
//!
//! [`ScriptedProvider`] answers each stage from a script and records the
//! order in which calls start and finish. Stages are told apart by their
//! system prompts.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use aegis_mind::agent::{ChatRequest, ChatResponse, PromptSet, Role, TokenUsage};
use aegis_mind::error::SearchError;
use aegis_mind::{
    AgentConfig, AgentError, AgentRole, LlmProvider, SearchHit, SearchProvider, Session,
};
use async_trait::async_trait;

pub const TEST_MODEL: &str = "deepseek-r1:8b";

/// What a scripted stage does when called.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this text.
    Text(String),
    /// Fail with an API error.
    Fail(String),
    /// Sleep, then return this text.
    Slow(Duration, String),
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A model call as seen by the provider.
#[derive(Debug, Clone)]
pub struct Call {
    /// `planner`, `aggregator` or the role name.
    pub stage: String,
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    pub json_mode: bool,
}

#[derive(Debug, Default)]
struct Script {
    planner: Vec<Reply>,
    roles: HashMap<String, Reply>,
    aggregator: Vec<Reply>,
}

/// Language-model double driven by a per-stage script.
#[derive(Debug)]
pub struct ScriptedProvider {
    models: Vec<String>,
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    events: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::with_models(vec![TEST_MODEL.to_string()])
    }

    pub fn with_models(models: Vec<String>) -> Self {
        Self {
            models,
            script: Mutex::new(Script::default()),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Queues a planner reply. The last queued reply repeats.
    pub fn planner(self, reply: Reply) -> Self {
        lock(&self.script).planner.push(reply);
        self
    }

    pub fn role(self, name: &str, reply: Reply) -> Self {
        lock(&self.script).roles.insert(name.to_string(), reply);
        self
    }

    /// Queues an aggregator reply. The last queued reply repeats.
    pub fn aggregator(self, reply: Reply) -> Self {
        lock(&self.script).aggregator.push(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, stage: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.stage == stage).collect()
    }

    /// `start:<stage>` and `end:<stage>` markers in the order they happened.
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    fn next_reply(&self, stage: &str) -> Reply {
        let mut script = lock(&self.script);
        let take = |queue: &mut Vec<Reply>| match queue.len() {
            0 => None,
            1 => queue.first().cloned(),
            _ => Some(queue.remove(0)),
        };
        let reply = match stage {
            "planner" => take(&mut script.planner),
            "aggregator" => take(&mut script.aggregator),
            role => script.roles.get(role).cloned(),
        };
        reply.unwrap_or_else(|| match stage {
            "planner" => Reply::text(r#"{"queries": ["default query"]}"#),
            "aggregator" => Reply::text("Final answer."),
            role => Reply::Text(format!("Draft from {role}.")),
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identifies the stage from the system prompt.
pub fn stage_of(system: &str) -> String {
    if system.contains("search query planner") {
        return "planner".to_string();
    }
    if system.contains("final coordinator") {
        return "aggregator".to_string();
    }
    system
        .split("Your role: ")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .unwrap_or("unknown")
        .to_string()
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let system = request.system_prompt().unwrap_or_default().to_string();
        let user = request
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let stage = stage_of(&system);

        lock(&self.calls).push(Call {
            stage: stage.clone(),
            system,
            user,
            temperature: request.temperature,
            json_mode: request.json_mode,
        });
        lock(&self.events).push(format!("start:{stage}"));

        let reply = self.next_reply(&stage);
        let result = match reply {
            Reply::Text(content) => Ok(content),
            Reply::Slow(delay, content) => {
                tokio::time::sleep(delay).await;
                Ok(content)
            }
            Reply::Fail(message) => Err(AgentError::ApiRequest {
                message,
                status: Some(500),
            }),
        };

        lock(&self.events).push(format!("end:{stage}"));

        result.map(|content| ChatResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, AgentError> {
        Ok(self.models.clone())
    }
}

/// Search double returning fixed hits per query.
#[derive(Debug, Default)]
pub struct StaticSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    failing: Vec<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn text_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        lock(&self.queries).push(query.to_string());
        if self.failing.iter().any(|q| q == query) {
            return Err(SearchError::Status { status: 503 });
        }
        Ok(self
            .hits
            .get(query)
            .map(|hits| hits.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }
}

pub fn hit(title: &str, url: &str, body: &str) -> SearchHit {
    SearchHit::new(title, url, body)
}

pub fn roles(names: &[&str]) -> Vec<AgentRole> {
    names
        .iter()
        .map(|n| AgentRole::new(*n, format!("focus of {n}"), 0.3))
        .collect()
}

pub fn config(role_names: &[&str]) -> AgentConfig {
    AgentConfig::builder()
        .model(TEST_MODEL)
        .roles(roles(role_names))
        .build()
        .unwrap_or_else(|_| unreachable!())
}

pub async fn session(
    provider: &Arc<ScriptedProvider>,
    search: &Arc<StaticSearch>,
    config: AgentConfig,
) -> Session {
    try_session(provider, search, config)
        .await
        .unwrap_or_else(|_| unreachable!())
}

pub async fn try_session(
    provider: &Arc<ScriptedProvider>,
    search: &Arc<StaticSearch>,
    config: AgentConfig,
) -> Result<Session, AgentError> {
    Session::builder(config)
        .provider(Arc::clone(provider) as Arc<dyn LlmProvider>)
        .search_provider(Arc::clone(search) as Arc<dyn SearchProvider>)
        .prompts(PromptSet::defaults())
        .connect()
        .await
}
