//! Web-search augmented assistant pipeline.
//!
//! Turns a question into an answer through a fixed pipeline over a
//! pluggable [`LlmProvider`] and [`SearchProvider`](crate::search::SearchProvider).
//!
//! # Architecture
//!
//! ```text
//! Session::ask(question)
//!   └── Orchestrator
//!       ├── PlannerAgent (question → search queries)
//!       ├── Search executor (one provider call per query) → summarize
//!       ├── Fan-out → one DraftAgent per configured role, concurrently
//!       ├── Barrier: wait for every draft
//!       └── AggregatorAgent → final answer
//! ```

pub mod aggregator;
pub mod client;
pub mod config;
pub mod drafter;
pub mod history;
pub mod message;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod session;
pub mod state;
pub mod traits;

// Re-export key types
pub use aggregator::AggregatorAgent;
pub use client::{SmokeResult, create_provider, resolve_model, select_model, smoke_test};
pub use config::{AgentConfig, AgentRole};
pub use drafter::DraftAgent;
pub use history::{ConversationTurn, History, TurnRole};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use planner::PlannerAgent;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use session::{Session, SessionBuilder};
pub use state::{Draft, Stage, TurnReport, TurnState};
pub use traits::{Agent, AgentResponse};
