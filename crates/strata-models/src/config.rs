use serde::{Deserialize, Serialize};

/// Top-level configuration for strata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StrataConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Which language model backend answers every prompt of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelBackend {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    ClaudeCli,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: ModelBackend,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    /// Environment variable holding the API key (OpenAI-compatible backends).
    #[serde(default = "default_model_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Client-side timeout per model request. 0 disables it.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            model: default_model(),
            temperature: 0.0,
            api_key_env: default_model_key_env(),
            api_base: default_api_base(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    #[default]
    DuckDuckGo,
    Tavily,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchProviderKind,
    /// Maximum records kept per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,
    /// Maximum number of queries held in the in-memory result cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// How long a cached result stays valid. 0 disables the cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::default(),
            max_results: default_max_results(),
            api_key_env: default_search_key_env(),
            timeout_seconds: default_search_timeout(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_seconds: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Files,
    Sqlite,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Output directory for `files`, database file for `sqlite`.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Upper bound on search queries used per expert.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    /// Deadline for each model or search call. 0 disables the deadline.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
    /// Feed the four first-tier group summaries into the strategy group.
    #[serde(default = "default_true")]
    pub strategy_reads_summaries: bool,
    /// Critique/refinement rounds after the final synthesis.
    #[serde(default)]
    pub review_rounds: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_queries: default_max_queries(),
            call_timeout_seconds: default_call_timeout(),
            strategy_reads_summaries: true,
            review_rounds: 0,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_model_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model_timeout() -> u64 {
    120
}
fn default_max_results() -> usize {
    5
}
fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}
fn default_search_timeout() -> u64 {
    15
}
fn default_cache_capacity() -> u64 {
    1_000
}
fn default_cache_ttl() -> u64 {
    900
}
fn default_store_path() -> String {
    "investment_strategies".to_string()
}
fn default_max_queries() -> usize {
    5
}
fn default_call_timeout() -> u64 {
    180
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: StrataConfig = toml::from_str("").unwrap();
        assert_eq!(config, StrataConfig::default());
        assert_eq!(config.model.backend, ModelBackend::OpenAi);
        assert_eq!(config.model.model, "gpt-4o-mini");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.store.backend, StoreBackend::Files);
        assert!(config.pipeline.strategy_reads_summaries);
        assert_eq!(config.pipeline.review_rounds, 0);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[model]
backend = "claude_cli"
model = "claude-3-5-haiku-latest"
timeout_seconds = 45

[search]
provider = "tavily"
max_results = 3
cache_ttl_seconds = 0

[store]
backend = "sqlite"
path = "/tmp/strata.db"

[pipeline]
max_queries = 4
call_timeout_seconds = 60
strategy_reads_summaries = false
review_rounds = 2
"#;

        let config: StrataConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.backend, ModelBackend::ClaudeCli);
        assert_eq!(config.model.timeout_seconds, 45);
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.search.provider, SearchProviderKind::Tavily);
        assert_eq!(config.search.cache_ttl_seconds, 0);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.pipeline.max_queries, 4);
        assert!(!config.pipeline.strategy_reads_summaries);
        assert_eq!(config.pipeline.review_rounds, 2);
    }

    #[test]
    fn openai_backend_spelling() {
        let config: StrataConfig = toml::from_str("[model]\nbackend = \"openai\"\n").unwrap();
        assert_eq!(config.model.backend, ModelBackend::OpenAi);
    }

    #[test]
    fn roundtrip_config() {
        let config = StrataConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: StrataConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
