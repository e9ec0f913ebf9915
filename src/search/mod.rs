//! Web search: provider trait, result types, executor and summarizer.
//!
//! The executor runs one provider call per planned query and records
//! failures as data, so one bad query never blocks the others.

#[cfg(feature = "duckduckgo")]
pub mod duckduckgo;
pub mod executor;
pub mod summarize;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::config::AgentConfig;
use crate::error::SearchError;

#[cfg(feature = "duckduckgo")]
pub use duckduckgo::DuckDuckGoProvider;
pub use executor::execute_searches;
pub use summarize::{NO_SOURCES_PLACEHOLDER, summarize};

/// A single hit returned by a search provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Result URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Snippet text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl SearchHit {
    /// Creates a hit with every field set.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            body: Some(body.into()),
        }
    }

    /// Whether title, URL and body are all missing or blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [&self.title, &self.url, &self.body]
            .iter()
            .all(|f| f.as_deref().is_none_or(|s| s.trim().is_empty()))
    }
}

/// What a single search produced for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOutcome {
    /// A result returned by the provider.
    Hit(SearchHit),
    /// The query failed; holds the error message.
    Error(String),
}

/// A search result annotated with the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// The planned query.
    pub query: String,
    /// The hit or the failure.
    pub outcome: SearchOutcome,
}

impl SearchResult {
    /// Creates a successful result entry.
    #[must_use]
    pub fn hit(query: impl Into<String>, hit: SearchHit) -> Self {
        Self {
            query: query.into(),
            outcome: SearchOutcome::Hit(hit),
        }
    }

    /// Creates a failed result entry.
    #[must_use]
    pub fn error(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            outcome: SearchOutcome::Error(message.into()),
        }
    }

    /// The hit, unless this entry records an error.
    #[must_use]
    pub const fn as_hit(&self) -> Option<&SearchHit> {
        match &self.outcome {
            SearchOutcome::Hit(hit) => Some(hit),
            SearchOutcome::Error(_) => None,
        }
    }

    /// The error message, if this entry records a failure.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            SearchOutcome::Hit(_) => None,
            SearchOutcome::Error(message) => Some(message),
        }
    }

    /// Whether this entry records a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.outcome, SearchOutcome::Error(_))
    }
}

/// Trait for web search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name (e.g., `"duckduckgo"`).
    fn name(&self) -> &'static str;

    /// Runs a keyword search, returning at most `max_results` hits in
    /// provider order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] on transport, status or parse failures.
    async fn text_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// Creates a [`SearchProvider`] based on the configured provider name.
///
/// # Errors
///
/// Returns [`SearchError::UnsupportedProvider`] for unknown names or when the
/// adapter's cargo feature is disabled.
pub fn create_search_provider(config: &AgentConfig) -> Result<Box<dyn SearchProvider>, SearchError> {
    match config.search_provider.as_str() {
        #[cfg(feature = "duckduckgo")]
        "duckduckgo" => Ok(Box::new(DuckDuckGoProvider::new(config.search_timeout)?)),
        other => Err(SearchError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
