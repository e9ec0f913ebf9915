//! Turn state threaded through one run of the pipeline, and the report
//! produced from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::history::ConversationTurn;
use super::message::TokenUsage;
use crate::error::AgentError;
use crate::search::SearchResult;

/// Pipeline stage. Transitions are strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Turning the question into search queries.
    Plan,
    /// Running the planned searches.
    Search,
    /// Drafting answers concurrently, one per role.
    Draft,
    /// Synthesizing the drafts into the final answer.
    Aggregate,
    /// Terminal.
    Done,
}

impl Stage {
    /// The stage that follows this one. `Done` stays `Done`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Plan => Self::Search,
            Self::Search => Self::Draft,
            Self::Draft => Self::Aggregate,
            Self::Aggregate | Self::Done => Self::Done,
        }
    }

    /// Lowercase stage name for logs and timeouts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Search => "search",
            Self::Draft => "draft",
            Self::Aggregate => "aggregate",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query plan returned by the planner model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryPlan {
    /// Planned search queries.
    pub queries: Vec<String>,
}

/// One role's draft answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    /// Name of the role that produced it.
    pub agent_name: String,
    /// Labeled draft text, or a labeled error message.
    pub content: String,
    /// Whether drafting failed and `content` describes the error.
    pub failed: bool,
}

impl Draft {
    /// Wraps model output as a labeled draft.
    #[must_use]
    pub fn success(agent_name: &str, output: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            content: format!("[{agent_name}]\n{}", output.trim()),
            failed: false,
        }
    }

    /// Records a drafting failure as a labeled draft.
    #[must_use]
    pub fn failure(agent_name: &str, error: &AgentError) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            content: format!("[{agent_name}]\nError in agent {agent_name}: {error}"),
            failed: true,
        }
    }
}

/// Mutable working state for a single `ask`.
///
/// Created fresh per question with a snapshot of recent history, filled
/// in stage by stage and discarded once the answer has been extracted.
#[derive(Debug, Clone)]
pub struct TurnState {
    question: String,
    history: Vec<ConversationTurn>,
    stage: Stage,
    search_queries: Vec<String>,
    search_results: Vec<SearchResult>,
    sources: String,
    drafts: Vec<Draft>,
    final_answer: String,
    aggregation_failed: bool,
    usage: TokenUsage,
}

impl TurnState {
    /// Creates state for `question` with a snapshot of recent history.
    #[must_use]
    pub fn new(question: impl Into<String>, history: &[ConversationTurn]) -> Self {
        Self {
            question: question.into(),
            history: history.to_vec(),
            stage: Stage::Plan,
            search_queries: Vec::new(),
            search_results: Vec::new(),
            sources: String::new(),
            drafts: Vec::new(),
            final_answer: String::new(),
            aggregation_failed: false,
            usage: TokenUsage::default(),
        }
    }

    /// The user's question.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// History snapshot taken when the turn started.
    #[must_use]
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Planned queries.
    #[must_use]
    pub fn search_queries(&self) -> &[String] {
        &self.search_queries
    }

    /// Flattened search results, including error entries.
    #[must_use]
    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    /// Summarized sources shown to drafters and the aggregator.
    #[must_use]
    pub fn sources(&self) -> &str {
        &self.sources
    }

    /// Drafts merged so far.
    #[must_use]
    pub fn drafts(&self) -> &[Draft] {
        &self.drafts
    }

    /// The final answer. Empty until the aggregate stage has run.
    #[must_use]
    pub fn final_answer(&self) -> &str {
        &self.final_answer
    }

    /// Whether the aggregate stage produced an error message instead of
    /// an answer.
    #[must_use]
    pub const fn aggregation_failed(&self) -> bool {
        self.aggregation_failed
    }

    /// Token usage accumulated across all model calls this turn.
    #[must_use]
    pub const fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub(crate) fn add_usage(&mut self, usage: TokenUsage) {
        self.usage += usage;
    }

    fn expect_stage(&self, stage: Stage, action: &str) -> Result<(), AgentError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(AgentError::Orchestration {
                message: format!("cannot {action} during the {} stage", self.stage),
            })
        }
    }

    /// Moves to the next stage.
    pub(crate) fn advance(&mut self) {
        self.stage = self.stage.next();
    }

    pub(crate) fn set_queries(&mut self, queries: Vec<String>) -> Result<(), AgentError> {
        self.expect_stage(Stage::Plan, "set search queries")?;
        self.search_queries = queries;
        Ok(())
    }

    pub(crate) fn set_search_results(
        &mut self,
        results: Vec<SearchResult>,
        sources: String,
    ) -> Result<(), AgentError> {
        self.expect_stage(Stage::Search, "set search results")?;
        self.search_results = results;
        self.sources = sources;
        Ok(())
    }

    /// Appends drafts. Existing drafts are never replaced, and a draft
    /// whose role already contributed is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] outside the draft stage or when
    /// a role name is already present.
    pub fn merge_drafts(&mut self, drafts: impl IntoIterator<Item = Draft>) -> Result<(), AgentError> {
        self.expect_stage(Stage::Draft, "merge drafts")?;
        for draft in drafts {
            if self.drafts.iter().any(|d| d.agent_name == draft.agent_name) {
                return Err(AgentError::Orchestration {
                    message: format!("duplicate draft for agent '{}'", draft.agent_name),
                });
            }
            self.drafts.push(draft);
        }
        Ok(())
    }

    pub(crate) fn set_final_answer(
        &mut self,
        answer: String,
        failed: bool,
    ) -> Result<(), AgentError> {
        self.expect_stage(Stage::Aggregate, "set the final answer")?;
        self.final_answer = answer;
        self.aggregation_failed = failed;
        Ok(())
    }
}

/// Per-draft entry in a [`TurnReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftSummary {
    /// Role name.
    pub agent_name: String,
    /// Whether the draft is an error placeholder.
    pub failed: bool,
}

/// Summary of one completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    /// The answer shown to the user.
    pub answer: String,
    /// Model used for every stage.
    pub model: String,
    /// Planned search queries.
    pub queries: Vec<String>,
    /// Number of successful search result entries.
    pub results: usize,
    /// Number of queries that failed.
    pub search_errors: usize,
    /// Drafts produced, in canonical order.
    pub drafts: Vec<DraftSummary>,
    /// Whether the exchange was appended to history.
    pub recorded: bool,
    /// Total tokens reported by the model service.
    pub total_tokens: u32,
    /// Wall-clock time for the turn.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl TurnReport {
    /// Builds a report from a finished turn.
    #[must_use]
    pub fn from_state(state: &TurnState, model: &str, recorded: bool, elapsed: Duration) -> Self {
        Self {
            answer: state.final_answer().to_string(),
            model: model.to_string(),
            queries: state.search_queries().to_vec(),
            results: state.search_results().iter().filter(|r| !r.is_error()).count(),
            search_errors: state.search_results().iter().filter(|r| r.is_error()).count(),
            drafts: state
                .drafts()
                .iter()
                .map(|d| DraftSummary {
                    agent_name: d.agent_name.clone(),
                    failed: d.failed,
                })
                .collect(),
            recorded,
            total_tokens: state.usage().total_tokens,
            elapsed,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_stage(stage: Stage) -> TurnState {
        let mut state = TurnState::new("q", &[]);
        while state.stage() != stage {
            state.advance();
        }
        state
    }

    #[test]
    fn test_stage_sequence() {
        let mut stage = Stage::Plan;
        let mut seen = vec![stage];
        while stage != Stage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Plan,
                Stage::Search,
                Stage::Draft,
                Stage::Aggregate,
                Stage::Done
            ]
        );
        assert_eq!(Stage::Done.next(), Stage::Done);
    }

    #[test]
    fn test_final_answer_empty_until_aggregate() {
        let mut state = TurnState::new("q", &[]);
        assert!(state.final_answer().is_empty());
        assert!(state.set_final_answer("x".to_string(), false).is_err());

        let mut state = at_stage(Stage::Aggregate);
        assert!(state.set_final_answer("done".to_string(), false).is_ok());
        assert_eq!(state.final_answer(), "done");
    }

    #[test]
    fn test_merge_drafts_appends() {
        let mut state = at_stage(Stage::Draft);
        let ok = state.merge_drafts(vec![Draft::success("b", "two")]);
        assert!(ok.is_ok());
        let ok = state.merge_drafts(vec![Draft::success("a", "one")]);
        assert!(ok.is_ok());
        assert_eq!(state.drafts().len(), 2);
        assert_eq!(state.drafts()[0].content, "[b]\ntwo");
    }

    #[test]
    fn test_merge_drafts_rejects_overwrite() {
        let mut state = at_stage(Stage::Draft);
        let _ = state.merge_drafts(vec![Draft::success("a", "one")]);
        let result = state.merge_drafts(vec![Draft::success("a", "again")]);
        assert!(result.is_err());
        assert_eq!(state.drafts().len(), 1);
        assert_eq!(state.drafts()[0].content, "[a]\none");
    }

    #[test]
    fn test_merge_drafts_wrong_stage() {
        let mut state = TurnState::new("q", &[]);
        assert!(state.merge_drafts(vec![Draft::success("a", "x")]).is_err());
    }

    #[test]
    fn test_draft_failure_labels_role() {
        let err = AgentError::ApiRequest {
            message: "boom".to_string(),
            status: Some(500),
        };
        let draft = Draft::failure("Agent-2", &err);
        assert!(draft.failed);
        assert!(draft.content.starts_with("[Agent-2]\n"));
        assert!(draft.content.contains("Error in agent Agent-2"));
        assert!(draft.content.contains("boom"));
    }

    #[test]
    fn test_report_serializes_elapsed_as_seconds() {
        let state = at_stage(Stage::Done);
        let report = TurnReport::from_state(&state, "m", false, Duration::from_millis(1500));
        let json = serde_json::to_string(&report).unwrap_or_default();
        assert!(json.contains("\"elapsed\":1.5"));
        assert!(json.contains("\"recorded\":false"));
    }
}
