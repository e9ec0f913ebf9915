//! # aegis-mind
//!
//! Web-search augmented assistant for local language models.
//!
//! Every question runs through a fixed pipeline: a planner turns it into
//! web search queries, the queries are executed and summarized into a
//! source list, several drafting roles answer concurrently from those
//! sources, and an aggregator synthesizes the drafts into one answer. A
//! [`Session`] keeps the conversation history between questions.
//!
//! ## Example
//!
//! ```no_run
//! use aegis_mind::{AgentConfig, Session};
//!
//! # async fn run() -> Result<(), aegis_mind::AgentError> {
//! let config = AgentConfig::from_env()?;
//! let mut session = Session::builder(config).connect().await?;
//! let answer = session.ask("What is the capital of Brazil?").await?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod monitor;
pub mod search;

pub use agent::{
    AgentConfig, AgentRole, History, LlmProvider, PromptSet, Session, SessionBuilder, TurnReport,
};
pub use error::{AgentError, CommandError, Error, Result, SearchError};
pub use monitor::{FileMonitor, Monitor, SearchLog, SearchRecord};
pub use search::{SearchHit, SearchProvider, SearchResult};
