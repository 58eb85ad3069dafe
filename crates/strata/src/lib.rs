//! strata - layered investment-strategy reports from a panel of LLM experts.
//!
//! A question fans out to 25 experts in five groups; each group condenses
//! its analyses into a summary, and a final synthesis turns the summaries
//! into one strategy report.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! # async fn demo() -> anyhow::Result<()> {
//! let config = strata::load_config(None)?;
//! let orchestrator = strata::build_orchestrator(&config).await?;
//! let output = strata::run(&orchestrator, "Should I buy VCB this quarter?").await?;
//! println!("{}", output.final_report);
//! # Ok(())
//! # }
//! ```

pub use strata_agents as agents;
pub use strata_models as models;
pub use strata_store as store;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use strata_agents::claude_cli::check_cli_available;
use strata_agents::llm::deadline_from_secs;
use strata_agents::{
    build_search_provider, default_roster, AgentError, ClaudeCliConfig, ClaudeCliModel,
    Collaborators, LanguageModel, OpenAiConfig, OpenAiModel, Orchestrator, PipelineSettings,
};
use strata_models::{ModelBackend, ModelConfig, RunOutput, StoreBackend, StoreConfig, StrataConfig};
use strata_store::{ArtifactStore, FileStore, NullStore, SqliteStore};
use tracing::info;

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/strata.toml";

/// JSON accepted on stdin or via `--input`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub question: String,
}

/// Load configuration.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
/// used when present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<StrataConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => Path::new(DEFAULT_CONFIG_PATH),
        None => return Ok(StrataConfig::default()),
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Build the configured language model. Fails when its credential or binary is missing.
pub async fn build_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>, AgentError> {
    match config.backend {
        ModelBackend::OpenAi => {
            let model = OpenAiModel::new(OpenAiConfig::from_model_config(config)?)?;
            Ok(Arc::new(model))
        }
        ModelBackend::ClaudeCli => {
            if !check_cli_available().await {
                return Err(AgentError::Config("claude CLI not found on PATH".to_string()));
            }
            Ok(Arc::new(ClaudeCliModel::new(ClaudeCliConfig {
                model: config.model.clone(),
                timeout: deadline_from_secs(config.timeout_seconds),
            })))
        }
    }
}

pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn ArtifactStore>, AgentError> {
    let store: Arc<dyn ArtifactStore> = match config.backend {
        StoreBackend::Files => Arc::new(FileStore::open(&config.path)?),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
        StoreBackend::None => Arc::new(NullStore),
    };
    Ok(store)
}

/// Build an Orchestrator over the default roster from configuration.
pub async fn build_orchestrator(config: &StrataConfig) -> anyhow::Result<Orchestrator> {
    let model = build_model(&config.model)
        .await
        .context("Failed to set up language model")?;
    let search = build_search_provider(&config.search).context("Failed to set up search")?;
    let store = build_store(&config.store).context("Failed to open artifact store")?;

    info!(
        model = model.name(),
        search = search.name(),
        store = store.name(),
        "Collaborators ready"
    );

    let orchestrator = Orchestrator::new(
        default_roster(),
        Collaborators {
            model,
            search,
            store,
        },
        PipelineSettings::from(&config.pipeline),
    )?;
    Ok(orchestrator)
}

/// Run one question through the orchestrator.
pub async fn run(orchestrator: &Orchestrator, question: &str) -> Result<RunOutput, AgentError> {
    orchestrator.run(question).await
}
