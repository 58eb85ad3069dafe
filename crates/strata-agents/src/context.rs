use std::sync::Arc;
use std::time::Duration;

use strata_models::{Artifact, ArtifactKind, ChatMessage, PipelineConfig, SearchRecord};
use strata_store::ArtifactStore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::{deadline_from_secs, with_deadline, LanguageModel};
use crate::search::SearchProvider;

/// The external collaborators shared by every task of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchProvider>,
    pub store: Arc<dyn ArtifactStore>,
}

/// Pipeline knobs resolved from `[pipeline]`.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_queries: usize,
    pub call_timeout: Option<Duration>,
    pub strategy_reads_summaries: bool,
    pub review_rounds: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_queries: config.max_queries,
            call_timeout: deadline_from_secs(config.call_timeout_seconds),
            strategy_reads_summaries: config.strategy_reads_summaries,
            review_rounds: config.review_rounds,
        }
    }
}

/// Everything a task needs: collaborators, settings and the run identity.
#[derive(Clone)]
pub struct RunContext {
    pub collaborators: Collaborators,
    pub settings: PipelineSettings,
    pub run_id: Uuid,
}

impl RunContext {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings, run_id: Uuid) -> Self {
        Self {
            collaborators,
            settings,
            run_id,
        }
    }

    /// One model call under the per-call deadline.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        debug!(model = %self.collaborators.model.name(), "Model call");
        with_deadline(
            self.settings.call_timeout,
            self.collaborators.model.complete(messages),
        )
        .await
    }

    /// One search call under the per-call deadline.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchRecord>, AgentError> {
        with_deadline(self.settings.call_timeout, self.collaborators.search.search(query)).await
    }

    /// Best-effort write to the artifact store.
    pub fn persist(&self, kind: ArtifactKind, name: &str, question: &str, body: &str) {
        let artifact = Artifact::new(self.run_id, kind, name, question, body);
        if let Err(e) = self.collaborators.store.persist(&artifact) {
            warn!(kind = %kind, name = %name, error = %e, "Failed to persist artifact");
        }
    }
}
