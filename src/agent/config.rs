//! Agent configuration with builder pattern, environment variable and
//! config file support.
//!
//! Configuration is resolved in order: explicit values → environment
//! variables → TOML config file → defaults. Validation runs once in
//! [`AgentConfigBuilder::build`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Default provider name.
const DEFAULT_PROVIDER: &str = "ollama";
/// Default OpenAI-compatible endpoint of a local Ollama server.
const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
/// Ollama ignores the key but the client requires one.
const DEFAULT_API_KEY: &str = "ollama";
/// Model family preferred during automatic model selection.
const DEFAULT_MODEL_FAMILY: &str = "deepseek";
/// Default search provider name.
const DEFAULT_SEARCH_PROVIDER: &str = "duckduckgo";
/// Planning favors determinism.
const DEFAULT_PLANNER_TEMPERATURE: f32 = 0.0;
/// Temperature for roles that do not set their own.
const DEFAULT_DRAFT_TEMPERATURE: f32 = 0.4;
/// Synthesis favors faithfulness over creativity.
const DEFAULT_AGGREGATOR_TEMPERATURE: f32 = 0.3;
/// Default planner max tokens.
const DEFAULT_PLANNER_MAX_TOKENS: u32 = 512;
/// Default drafting max tokens.
const DEFAULT_DRAFT_MAX_TOKENS: u32 = 800;
/// Default aggregator max tokens.
const DEFAULT_AGGREGATOR_MAX_TOKENS: u32 = 1200;
/// Default results requested per search query.
const DEFAULT_MAX_RESULTS_PER_QUERY: usize = 5;
/// Default cap on planned search queries.
const DEFAULT_MAX_QUERIES: usize = 6;
/// Default number of sources included in prompts.
const DEFAULT_MAX_SOURCES_IN_PROMPT: usize = 12;
/// Default number of history turns shown to the model.
const DEFAULT_HISTORY_WINDOW_TURNS: usize = 6;
/// Default per-stage model timeout in seconds.
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 120;
/// Default per-query search timeout in seconds.
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;
/// Highest sampling temperature accepted for any stage.
const MAX_TEMPERATURE: f32 = 2.0;

/// Config file location relative to the user config directory.
const CONFIG_FILE_DIR: &str = "aegis";
/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// A drafting role: one independent perspective on the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRole {
    /// Role name, used to label its draft.
    pub name: String,
    /// Thematic focus the role should pursue.
    pub focus: String,
    /// Sampling temperature for this role.
    pub temperature: f32,
}

impl AgentRole {
    /// Creates a role.
    #[must_use]
    pub fn new(name: impl Into<String>, focus: impl Into<String>, temperature: f32) -> Self {
        Self {
            name: name.into(),
            focus: focus.into(),
            temperature,
        }
    }

    /// The three roles used when none are configured.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "structured-explanation",
                "Explain the topic clearly and in a well-organized structure, \
                 defining the key concepts and how they relate.",
                0.5,
            ),
            Self::new(
                "caveats-limitations",
                "Point out limitations, ambiguities, risks and places where the \
                 sources are thin or disagree.",
                0.2,
            ),
            Self::new(
                "practical-steps",
                "Turn the answer into concrete, actionable steps, examples or \
                 recommendations.",
                0.4,
            ),
        ]
    }
}

/// Configuration for the assistant.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (`"ollama"` or `"openai"`).
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible endpoint.
    pub base_url: String,
    /// Explicit model id. `None` selects one automatically at startup.
    pub model: Option<String>,
    /// Substring preferred when selecting a model automatically.
    pub preferred_model_family: String,
    /// Search provider name.
    pub search_provider: String,
    /// Temperature for the query planner.
    pub planner_temperature: f32,
    /// Temperature for the aggregator.
    pub aggregator_temperature: f32,
    /// Maximum tokens for the planner response.
    pub planner_max_tokens: u32,
    /// Maximum tokens for each draft.
    pub draft_max_tokens: u32,
    /// Maximum tokens for the final answer.
    pub aggregator_max_tokens: u32,
    /// Results requested from the search provider per query.
    pub max_results_per_query: usize,
    /// Maximum number of planned search queries.
    pub max_queries: usize,
    /// Maximum number of sources summarized into prompts.
    pub max_sources_in_prompt: usize,
    /// Number of recent conversation turns shown to the model.
    pub history_window_turns: usize,
    /// Timeout applied to each model call.
    pub stage_timeout: Duration,
    /// Timeout applied to each search query.
    pub search_timeout: Duration,
    /// Language to answer in. `None` answers in the question's language.
    pub language: Option<String>,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
    /// Drafting roles, fixed for the lifetime of a session.
    pub roles: Vec<AgentRole>,
    /// Temperature for roles that do not set their own, and for the
    /// single-answer path.
    pub draft_temperature: f32,
    /// Fan out to every role and synthesize. `false` answers with a single
    /// model call after planning and searching.
    pub multi_agent: bool,
    /// File that receives one JSON line per search and model response.
    pub log_file: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables, the default
    /// config file and defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the config file is malformed
    /// or the resolved values fail validation.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().from_default_file()?.build()
    }
}

/// One `[[roles]]` entry in the config file.
#[derive(Debug, Clone, Deserialize)]
struct RoleEntry {
    name: String,
    #[serde(alias = "goal")]
    focus: String,
    temperature: Option<f32>,
}

/// On-disk configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    preferred_model_family: Option<String>,
    search_provider: Option<String>,
    planner_temperature: Option<f32>,
    draft_temperature: Option<f32>,
    aggregator_temperature: Option<f32>,
    planner_max_tokens: Option<u32>,
    draft_max_tokens: Option<u32>,
    aggregator_max_tokens: Option<u32>,
    max_results_per_query: Option<usize>,
    max_queries: Option<usize>,
    max_sources_in_prompt: Option<usize>,
    history_window_turns: Option<usize>,
    stage_timeout_secs: Option<u64>,
    search_timeout_secs: Option<u64>,
    language: Option<String>,
    prompt_dir: Option<PathBuf>,
    multi_agent: Option<bool>,
    log_file: Option<PathBuf>,
    roles: Option<Vec<RoleEntry>>,
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    preferred_model_family: Option<String>,
    search_provider: Option<String>,
    planner_temperature: Option<f32>,
    draft_temperature: Option<f32>,
    aggregator_temperature: Option<f32>,
    planner_max_tokens: Option<u32>,
    draft_max_tokens: Option<u32>,
    aggregator_max_tokens: Option<u32>,
    max_results_per_query: Option<usize>,
    max_queries: Option<usize>,
    max_sources_in_prompt: Option<usize>,
    history_window_turns: Option<usize>,
    stage_timeout: Option<Duration>,
    search_timeout: Option<Duration>,
    language: Option<String>,
    prompt_dir: Option<PathBuf>,
    multi_agent: Option<bool>,
    log_file: Option<PathBuf>,
    roles: Option<Vec<(String, String, Option<f32>)>>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Turns an `OLLAMA_HOST` value into its OpenAI-compatible endpoint.
fn ollama_endpoint(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let host = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    if host.ends_with("/v1") {
        host
    } else {
        format!("{host}/v1")
    }
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("AEGIS_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("AEGIS_API_KEY").ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("AEGIS_BASE_URL")
                .ok()
                .or_else(|| std::env::var("OLLAMA_HOST").ok().map(|h| ollama_endpoint(&h)));
        }
        if self.model.is_none() {
            self.model = std::env::var("AEGIS_MODEL").ok();
        }
        if self.max_queries.is_none() {
            self.max_queries = env_parse("AEGIS_MAX_QUERIES");
        }
        if self.max_results_per_query.is_none() {
            self.max_results_per_query = env_parse("AEGIS_MAX_RESULTS");
        }
        if self.max_sources_in_prompt.is_none() {
            self.max_sources_in_prompt = env_parse("AEGIS_MAX_SOURCES");
        }
        if self.history_window_turns.is_none() {
            self.history_window_turns = env_parse("AEGIS_HISTORY_WINDOW");
        }
        if self.stage_timeout.is_none() {
            self.stage_timeout = env_parse("AEGIS_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.language.is_none() {
            self.language = std::env::var("AEGIS_LANGUAGE").ok();
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("AEGIS_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.multi_agent.is_none() {
            self.multi_agent = env_parse("AEGIS_MULTI_AGENT");
        }
        if self.log_file.is_none() {
            self.log_file = std::env::var("AEGIS_LOG_FILE").ok().map(PathBuf::from);
        }
        self
    }

    /// Populates unset fields from the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the file cannot be read or
    /// is not valid TOML for this schema.
    pub fn from_file(self, path: &Path) -> Result<Self, AgentError> {
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::InvalidConfig {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        self.from_toml(&content).map_err(|e| AgentError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Populates unset fields from the default config file, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the file exists but is malformed.
    pub fn from_default_file(self) -> Result<Self, AgentError> {
        match default_config_path() {
            Some(path) if path.exists() => self.from_file(&path),
            _ => Ok(self),
        }
    }

    fn from_toml(mut self, content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;

        macro_rules! fill {
            ($($field:ident),* $(,)?) => {
                $(if self.$field.is_none() {
                    self.$field = file.$field;
                })*
            };
        }
        fill!(
            provider,
            api_key,
            base_url,
            model,
            preferred_model_family,
            search_provider,
            planner_temperature,
            draft_temperature,
            aggregator_temperature,
            planner_max_tokens,
            draft_max_tokens,
            aggregator_max_tokens,
            max_results_per_query,
            max_queries,
            max_sources_in_prompt,
            history_window_turns,
            language,
            prompt_dir,
            multi_agent,
            log_file,
        );
        if self.stage_timeout.is_none() {
            self.stage_timeout = file.stage_timeout_secs.map(Duration::from_secs);
        }
        if self.search_timeout.is_none() {
            self.search_timeout = file.search_timeout_secs.map(Duration::from_secs);
        }
        if self.roles.is_none() {
            self.roles = file.roles.map(|roles| {
                roles
                    .into_iter()
                    .map(|r| (r.name, r.focus, r.temperature))
                    .collect()
            });
        }
        Ok(self)
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets an explicit model id.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the model family preferred during automatic selection.
    #[must_use]
    pub fn preferred_model_family(mut self, family: impl Into<String>) -> Self {
        self.preferred_model_family = Some(family.into());
        self
    }

    /// Sets the search provider name.
    #[must_use]
    pub fn search_provider(mut self, name: impl Into<String>) -> Self {
        self.search_provider = Some(name.into());
        self
    }

    /// Sets the planner temperature.
    #[must_use]
    pub const fn planner_temperature(mut self, t: f32) -> Self {
        self.planner_temperature = Some(t);
        self
    }

    /// Sets the temperature used by roles without their own.
    #[must_use]
    pub const fn draft_temperature(mut self, t: f32) -> Self {
        self.draft_temperature = Some(t);
        self
    }

    /// Sets the aggregator temperature.
    #[must_use]
    pub const fn aggregator_temperature(mut self, t: f32) -> Self {
        self.aggregator_temperature = Some(t);
        self
    }

    /// Sets the maximum tokens for drafts.
    #[must_use]
    pub const fn draft_max_tokens(mut self, n: u32) -> Self {
        self.draft_max_tokens = Some(n);
        self
    }

    /// Sets the results requested per search query.
    #[must_use]
    pub const fn max_results_per_query(mut self, n: usize) -> Self {
        self.max_results_per_query = Some(n);
        self
    }

    /// Sets the maximum number of planned queries.
    #[must_use]
    pub const fn max_queries(mut self, n: usize) -> Self {
        self.max_queries = Some(n);
        self
    }

    /// Sets the maximum sources included in prompts.
    #[must_use]
    pub const fn max_sources_in_prompt(mut self, n: usize) -> Self {
        self.max_sources_in_prompt = Some(n);
        self
    }

    /// Sets the number of history turns shown to the model.
    #[must_use]
    pub const fn history_window_turns(mut self, n: usize) -> Self {
        self.history_window_turns = Some(n);
        self
    }

    /// Sets the per-stage model timeout.
    #[must_use]
    pub const fn stage_timeout(mut self, duration: Duration) -> Self {
        self.stage_timeout = Some(duration);
        self
    }

    /// Sets the per-query search timeout.
    #[must_use]
    pub const fn search_timeout(mut self, duration: Duration) -> Self {
        self.search_timeout = Some(duration);
        self
    }

    /// Sets the answer language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Enables or disables the multi-agent fan-out.
    #[must_use]
    pub const fn multi_agent(mut self, enabled: bool) -> Self {
        self.multi_agent = Some(enabled);
        self
    }

    /// Sets the monitor log file.
    #[must_use]
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Replaces the drafting roles.
    #[must_use]
    pub fn roles(mut self, roles: Vec<AgentRole>) -> Self {
        self.roles = Some(
            roles
                .into_iter()
                .map(|r| (r.name, r.focus, Some(r.temperature)))
                .collect(),
        );
        self
    }

    /// Builds and validates the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] when no roles are configured,
    /// role names are empty or duplicated, a temperature is outside
    /// `0.0..=2.0`, or a count limit is zero.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let draft_temperature = self.draft_temperature.unwrap_or(DEFAULT_DRAFT_TEMPERATURE);
        let roles: Vec<AgentRole> = self.roles.map_or_else(AgentRole::defaults, |roles| {
            roles
                .into_iter()
                .map(|(name, focus, temperature)| AgentRole {
                    name: name.trim().to_string(),
                    focus,
                    temperature: temperature.unwrap_or(draft_temperature),
                })
                .collect()
        });

        let config = AgentConfig {
            provider: self
                .provider
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            api_key: self.api_key.unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: self.model.filter(|m| !m.trim().is_empty()),
            preferred_model_family: self
                .preferred_model_family
                .unwrap_or_else(|| DEFAULT_MODEL_FAMILY.to_string()),
            search_provider: self
                .search_provider
                .unwrap_or_else(|| DEFAULT_SEARCH_PROVIDER.to_string()),
            planner_temperature: self
                .planner_temperature
                .unwrap_or(DEFAULT_PLANNER_TEMPERATURE),
            aggregator_temperature: self
                .aggregator_temperature
                .unwrap_or(DEFAULT_AGGREGATOR_TEMPERATURE),
            planner_max_tokens: self
                .planner_max_tokens
                .unwrap_or(DEFAULT_PLANNER_MAX_TOKENS),
            draft_max_tokens: self.draft_max_tokens.unwrap_or(DEFAULT_DRAFT_MAX_TOKENS),
            aggregator_max_tokens: self
                .aggregator_max_tokens
                .unwrap_or(DEFAULT_AGGREGATOR_MAX_TOKENS),
            max_results_per_query: self
                .max_results_per_query
                .unwrap_or(DEFAULT_MAX_RESULTS_PER_QUERY),
            max_queries: self.max_queries.unwrap_or(DEFAULT_MAX_QUERIES),
            max_sources_in_prompt: self
                .max_sources_in_prompt
                .unwrap_or(DEFAULT_MAX_SOURCES_IN_PROMPT),
            history_window_turns: self
                .history_window_turns
                .unwrap_or(DEFAULT_HISTORY_WINDOW_TURNS),
            stage_timeout: self
                .stage_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS)),
            search_timeout: self
                .search_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS)),
            language: self.language.filter(|l| !l.trim().is_empty()),
            prompt_dir: self.prompt_dir,
            roles,
            draft_temperature,
            multi_agent: self.multi_agent.unwrap_or(true),
            log_file: self.log_file,
        };

        validate(&config)?;
        Ok(config)
    }
}

fn invalid(message: impl Into<String>) -> AgentError {
    AgentError::InvalidConfig {
        message: message.into(),
    }
}

fn validate_temperature(label: &str, t: f32) -> Result<(), AgentError> {
    if (0.0..=MAX_TEMPERATURE).contains(&t) {
        Ok(())
    } else {
        Err(invalid(format!(
            "{label} temperature {t} is outside 0.0..={MAX_TEMPERATURE}"
        )))
    }
}

fn validate(config: &AgentConfig) -> Result<(), AgentError> {
    if config.roles.is_empty() {
        return Err(invalid("at least one agent role is required"));
    }

    let mut seen = HashSet::new();
    for role in &config.roles {
        if role.name.is_empty() {
            return Err(invalid("agent role names must not be empty"));
        }
        if !seen.insert(role.name.as_str()) {
            return Err(invalid(format!("duplicate agent role name '{}'", role.name)));
        }
        validate_temperature(&format!("role '{}'", role.name), role.temperature)?;
    }

    validate_temperature("planner", config.planner_temperature)?;
    validate_temperature("aggregator", config.aggregator_temperature)?;

    for (label, value) in [
        ("max_queries", config.max_queries),
        ("max_results_per_query", config.max_results_per_query),
        ("max_sources_in_prompt", config.max_sources_in_prompt),
    ] {
        if value == 0 {
            return Err(invalid(format!("{label} must be at least 1")));
        }
    }

    Ok(())
}

/// Returns the config file path: `$AEGIS_CONFIG_PATH`, else
/// `<config dir>/aegis/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var("AEGIS_CONFIG_PATH")
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|d| d.join(CONFIG_FILE_DIR).join(CONFIG_FILE_NAME)))
}

/// Example config file content.
#[must_use]
pub const fn example_config() -> &'static str {
    r#"# aegis configuration file
# Place at ~/.config/aegis/config.toml (Linux) or set AEGIS_CONFIG_PATH.

# Model service (any OpenAI-compatible endpoint; Ollama by default)
provider = "ollama"
base_url = "http://localhost:11434/v1"
# model = "deepseek-r1:8b"          # unset: pick automatically
preferred_model_family = "deepseek"

# Sampling
planner_temperature = 0.0
draft_temperature = 0.4
aggregator_temperature = 0.3

# Search
search_provider = "duckduckgo"
max_queries = 6
max_results_per_query = 5
max_sources_in_prompt = 12
search_timeout_secs = 30

# Conversation
history_window_turns = 6
stage_timeout_secs = 120
# language = "Portuguese"

# Set to false for a single answer instead of several drafts plus synthesis
multi_agent = true
# log_file = "aegis-monitor.log"   # JSON line per search and model response

[[roles]]
name = "structured-explanation"
focus = "Explain the topic clearly and in a well-organized structure."
temperature = 0.5

[[roles]]
name = "caveats-limitations"
focus = "Point out limitations, ambiguities and risks."
temperature = 0.2

[[roles]]
name = "practical-steps"
focus = "Turn the answer into concrete, actionable steps."
"#
}

/// Writes [`example_config`] to `path` unless a file already exists.
///
/// Returns `true` when the file was written.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created.
pub fn write_example_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, example_config())?;
    Ok(true)
}
