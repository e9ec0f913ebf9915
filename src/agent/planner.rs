//! Search-query planner.
//!
//! Asks the model for a JSON list of search queries and parses the reply
//! leniently. Planning never fails: any problem falls back to searching
//! for the question itself.

use std::time::Duration;

use async_trait::async_trait;

use super::config::AgentConfig;
use super::prompt::with_language;
use super::provider::LlmProvider;
use super::state::QueryPlan;
use super::traits::{Agent, AgentResponse};

/// Characters of the question used as the fallback query.
pub const FALLBACK_QUERY_CHARS: usize = 120;

/// Agent that turns a question into search queries.
pub struct PlannerAgent {
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_queries: usize,
    timeout: Duration,
    system_prompt: String,
}

impl PlannerAgent {
    /// Creates a new planner with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, model: &str, system_prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: config.planner_max_tokens,
            temperature: config.planner_temperature,
            max_queries: config.max_queries,
            timeout: config.stage_timeout,
            system_prompt: with_language(system_prompt, config.language.as_deref()),
        }
    }

    /// Plans search queries for `question`.
    ///
    /// Always returns at least one query, plus the model response when the
    /// call succeeded. Model failures and unparseable replies are logged and
    /// replaced by the fallback query.
    pub async fn plan(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
        user_msg: &str,
    ) -> (Vec<String>, Option<AgentResponse>) {
        match self.execute_within(provider, user_msg, self.timeout).await {
            Ok(response) => {
                let queries = Self::parse_plan(&response.content, question, self.max_queries);
                (queries, Some(response))
            }
            Err(e) => {
                tracing::warn!(error = %e, "planner failed, searching for the question itself");
                (vec![fallback_query(question)], None)
            }
        }
    }

    /// Parses the planner's reply into at most `max_queries` queries.
    ///
    /// Tries the whole reply as JSON, then the span from the first `{` to
    /// the last `}`. Blank queries are dropped. If nothing usable remains,
    /// returns the fallback query for `question`.
    #[must_use]
    pub fn parse_plan(content: &str, question: &str, max_queries: usize) -> Vec<String> {
        let plan = serde_json::from_str::<QueryPlan>(content.trim()).ok().or_else(|| {
            let start = content.find('{')?;
            let end = content.rfind('}')?;
            (start < end)
                .then(|| serde_json::from_str::<QueryPlan>(&content[start..=end]).ok())
                .flatten()
        });

        let queries: Vec<String> = plan
            .map(|p| {
                p.queries
                    .into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .take(max_queries)
                    .collect()
            })
            .unwrap_or_default();

        if queries.is_empty() {
            tracing::debug!(content_len = content.len(), "unusable query plan, using fallback");
            vec![fallback_query(question)]
        } else {
            queries
        }
    }
}

/// The first [`FALLBACK_QUERY_CHARS`] characters of the question.
#[must_use]
pub fn fallback_query(question: &str) -> String {
    question.chars().take(FALLBACK_QUERY_CHARS).collect()
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }

    fn stage(&self) -> &'static str {
        "plan"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
