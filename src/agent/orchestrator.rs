//! Orchestrator for the plan → search → draft → aggregate pipeline.
//!
//! Runs the stages in a fixed order over a [`TurnState`]. Drafting fans
//! out to one task per configured role; aggregation waits for all of them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::aggregator::{AggregatorAgent, aggregation_error_message};
use super::config::{AgentConfig, AgentRole};
use super::drafter::DraftAgent;
use super::message::TokenUsage;
use super::planner::PlannerAgent;
use super::prompt::{
    PromptSet, build_aggregator_prompt, build_draft_prompt, build_planner_prompt, format_history,
};
use super::provider::LlmProvider;
use super::state::{Draft, TurnState};
use super::traits::{Agent, AgentResponse};
use crate::error::AgentError;
use crate::monitor::Monitor;
use crate::search::{SearchProvider, execute_searches, summarize};

/// Role name used when the fan-out is disabled.
pub const SINGLE_AGENT_ROLE: &str = "assistant";

const SINGLE_AGENT_FOCUS: &str = "Answer the question directly and completely.";

/// Orchestrates one turn of the assistant pipeline.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    monitor: Arc<dyn Monitor>,
    config: AgentConfig,
    prompts: PromptSet,
    model: String,
}

impl Orchestrator {
    /// Creates a new orchestrator.
    ///
    /// `model` is used for every stage.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        monitor: Arc<dyn Monitor>,
        config: AgentConfig,
        prompts: PromptSet,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            search,
            monitor,
            config,
            prompts,
            model: model.into(),
        }
    }

    /// The model used for every stage.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configuration this orchestrator runs with.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The language-model provider.
    #[must_use]
    pub fn provider(&self) -> &dyn LlmProvider {
        &*self.provider
    }

    /// The search provider.
    #[must_use]
    pub fn search_provider(&self) -> &dyn SearchProvider {
        &*self.search
    }

    /// Runs every stage over `state`, leaving it at [`Stage::Done`](super::state::Stage::Done).
    ///
    /// # Steps
    ///
    /// 1. Plan search queries via [`PlannerAgent`]
    /// 2. Run the searches and summarize the sources
    /// 3. Fan out one [`DraftAgent`] per role concurrently
    /// 4. Wait for every draft, then synthesize via [`AggregatorAgent`]
    ///
    /// With `multi_agent` off, steps 3 and 4 collapse into one answer from a
    /// single `assistant` role.
    ///
    /// Stage failures are recorded in `state` rather than returned.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] if `state` is not at the start
    /// of the pipeline.
    pub async fn run(&self, state: &mut TurnState) -> Result<(), AgentError> {
        let start = Instant::now();
        let history = format_history(state.history());

        // Step 1: Plan
        let planner = PlannerAgent::new(&self.config, &self.model, &self.prompts.planner);
        let user_msg = build_planner_prompt(state.question(), &history, self.config.max_queries);
        let (queries, response) = planner
            .plan(&*self.provider, state.question(), &user_msg)
            .await;
        if let Some(response) = response {
            self.record_response(state, &planner, &user_msg, &response);
        }
        tracing::debug!(stage = %state.stage(), queries = ?queries, "planned search queries");
        state.set_queries(queries)?;
        state.advance();

        // Step 2: Search
        let results = execute_searches(
            &*self.search,
            state.search_queries(),
            self.config.max_results_per_query,
            self.config.search_timeout,
            &*self.monitor,
        )
        .await;
        let sources = summarize(&results, self.config.max_sources_in_prompt);
        tracing::debug!(
            stage = %state.stage(),
            results = results.len(),
            errors = results.iter().filter(|r| r.is_error()).count(),
            "search finished"
        );
        state.set_search_results(results, sources)?;
        state.advance();

        // Steps 3 and 4: Draft, then aggregate once every role has a draft
        let user_msg = build_draft_prompt(state.question(), &history, state.sources());
        if self.config.multi_agent {
            self.draft_and_aggregate(state, &history, user_msg).await?;
        } else {
            self.answer_directly(state, &user_msg).await?;
        }

        tracing::info!(
            model = %self.model,
            queries = state.search_queries().len(),
            drafts = state.drafts().len(),
            total_tokens = state.usage().total_tokens,
            elapsed_ms = start.elapsed().as_millis(),
            "turn complete"
        );
        Ok(())
    }

    /// Steps 3 and 4 of the multi-agent path: one draft per role, then a
    /// synthesis once every role has a draft.
    async fn draft_and_aggregate(
        &self,
        state: &mut TurnState,
        history: &str,
        user_msg: String,
    ) -> Result<(), AgentError> {
        let outcomes = self.fan_out(user_msg).await;
        let mut drafts = Vec::with_capacity(outcomes.len());
        for (draft, usage) in outcomes {
            state.add_usage(usage);
            drafts.push(draft);
        }
        tracing::debug!(
            stage = %state.stage(),
            drafts = drafts.len(),
            failed = drafts.iter().filter(|d| d.failed).count(),
            "drafting finished"
        );
        state.merge_drafts(drafts)?;
        state.advance();

        debug_assert_eq!(state.drafts().len(), self.config.roles.len());
        let aggregator = AggregatorAgent::new(&self.config, &self.model, &self.prompts.aggregator);
        let user_msg =
            build_aggregator_prompt(state.question(), history, state.sources(), state.drafts());
        match aggregator.aggregate(&*self.provider, &user_msg).await {
            Ok(response) => {
                self.record_response(state, &aggregator, &user_msg, &response);
                state.set_final_answer(response.content, false)?;
            }
            Err(e) => {
                tracing::warn!(stage = %state.stage(), error = %e, "aggregation failed");
                state.set_final_answer(aggregation_error_message(&e), true)?;
            }
        }
        state.advance();
        Ok(())
    }

    /// Single-answer path: one model call over the same question, history
    /// and sources. The answer is the final answer; no synthesis runs.
    async fn answer_directly(
        &self,
        state: &mut TurnState,
        user_msg: &str,
    ) -> Result<(), AgentError> {
        let role = AgentRole::new(
            SINGLE_AGENT_ROLE,
            SINGLE_AGENT_FOCUS,
            self.config.draft_temperature,
        );
        let agent = DraftAgent::new(&self.config, role, &self.model, &self.prompts.drafter);
        match agent.answer(&*self.provider, user_msg).await {
            Ok(response) => {
                self.record_response(state, &agent, user_msg, &response);
                state.merge_drafts([Draft::success(agent.name(), &response.content)])?;
                state.advance();
                state.set_final_answer(response.content, false)?;
            }
            Err(e) => {
                tracing::warn!(stage = %state.stage(), error = %e, "answer failed");
                state.merge_drafts([Draft::failure(agent.name(), &e)])?;
                state.advance();
                state.set_final_answer(format!("Failed to generate an answer: {e}"), true)?;
            }
        }
        state.advance();
        Ok(())
    }

    fn record_response(
        &self,
        state: &mut TurnState,
        agent: &dyn Agent,
        user_msg: &str,
        response: &AgentResponse,
    ) {
        self.monitor.on_response(
            agent.system_prompt().len() + user_msg.len(),
            response.content.len(),
        );
        state.add_usage(response.usage);
    }

    /// Runs one drafting task per role and waits for all of them.
    ///
    /// Results come back in role order whatever order the tasks finish in.
    /// A task that panics still yields an error draft for its role. The
    /// tasks live in a [`JoinSet`], so dropping the turn aborts them.
    async fn fan_out(&self, user_msg: String) -> Vec<(Draft, TokenUsage)> {
        let roles = &self.config.roles;
        let semaphore = Arc::new(Semaphore::new(roles.len().max(1)));
        let user_msg: Arc<str> = Arc::from(user_msg);

        let mut set = JoinSet::new();
        let mut slots: HashMap<tokio::task::Id, usize> = HashMap::with_capacity(roles.len());

        for (index, role) in roles.iter().cloned().enumerate() {
            let agent = DraftAgent::new(&self.config, role, &self.model, &self.prompts.drafter);
            let sem = Arc::clone(&semaphore);
            let prov = Arc::clone(&self.provider);
            let monitor = Arc::clone(&self.monitor);
            let msg = Arc::clone(&user_msg);

            let handle = set.spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let err = AgentError::Orchestration {
                            message: format!("Semaphore acquire failed: {e}"),
                        };
                        return (Draft::failure(agent.name(), &err), TokenUsage::default());
                    }
                };

                let start = Instant::now();
                let (draft, response) = agent.draft(&*prov, &msg).await;
                tracing::debug!(
                    role = %agent.name(),
                    failed = draft.failed,
                    elapsed_ms = start.elapsed().as_millis(),
                    "draft finished"
                );

                let usage = response.map_or_else(TokenUsage::default, |r| {
                    monitor.on_response(agent.system_prompt().len() + msg.len(), r.content.len());
                    r.usage
                });
                (draft, usage)
            });

            slots.insert(handle.id(), index);
        }

        // Collect results into role order
        let mut results: Vec<Option<(Draft, TokenUsage)>> = vec![None; roles.len()];
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    if let Some(&index) = slots.get(&id) {
                        results[index] = Some(result);
                    }
                }
                Err(e) => {
                    if let Some(&index) = slots.get(&e.id()) {
                        let err = AgentError::Orchestration {
                            message: format!("Task join failed: {e}"),
                        };
                        results[index] =
                            Some((Draft::failure(&roles[index].name, &err), TokenUsage::default()));
                    }
                }
            }
        }

        roles
            .iter()
            .zip(results)
            .map(|(role, result)| {
                result.unwrap_or_else(|| {
                    let err = AgentError::Orchestration {
                        message: "draft task produced no result".to_string(),
                    };
                    (Draft::failure(&role.name, &err), TokenUsage::default())
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("search", &self.search.name())
            .field("model", &self.model)
            .field("config", &self.config)
            .field("prompts", &self.prompts)
            .finish_non_exhaustive()
    }
}
