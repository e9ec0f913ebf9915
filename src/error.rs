//! Error types for aegis-mind.
//!
//! Each layer owns its error enum: [`AgentError`] for model-facing work,
//! [`SearchError`] for the web search adapter and [`CommandError`] for the
//! CLI. [`Error`] unifies them for callers that cross layers.

use thiserror::Error;

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent pipeline or model service failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Search provider failure.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the agent pipeline and the language-model adapter.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model service rejected or failed a request.
    #[error("model request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when the provider reported one.
        status: Option<u16>,
    },

    /// Model output could not be parsed into the expected shape.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// Pipeline-level failure (invalid input, task join failure).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Description of the failure.
        message: String,
    },

    /// No usable model is registered with the model service.
    #[error("no language model available: {hint}")]
    ModelUnavailable {
        /// Remediation hint for the user.
        hint: String,
    },

    /// Provider name does not map to a known adapter.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The configured provider name.
        name: String,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Which option is wrong and why.
        message: String,
    },

    /// A stage did not finish within the configured timeout.
    #[error("{stage} timed out after {seconds}s")]
    Timeout {
        /// Pipeline stage name.
        stage: &'static str,
        /// Configured timeout in seconds.
        seconds: u64,
    },
}

/// Errors raised by search providers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Transport-level failure.
    #[error("search request failed: {0}")]
    Request(String),

    /// Provider answered with a non-success status.
    #[error("search provider returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Provider response could not be read.
    #[error("failed to parse search response: {0}")]
    Parse(String),

    /// The search did not finish within the configured timeout.
    #[error("search timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },

    /// Provider name does not map to a compiled-in adapter.
    #[error("unsupported search provider: {name}")]
    UnsupportedProvider {
        /// The configured provider name.
        name: String,
    },
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered in the requested format.
    #[error("output format error: {0}")]
    OutputFormat(String),

    /// A command-line argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
