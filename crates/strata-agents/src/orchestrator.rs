use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use strata_models::{GroupId, Roster, RunOutput, RunState, StatePatch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::{Collaborators, PipelineSettings, RunContext};
use crate::error::AgentError;
use crate::graph::{execute, NodeId, NodeRunner, TaskGraph};
use crate::group::run_group;
use crate::review::run_review;
use crate::synthesis::{prior_context, run_final_synthesis};

/// Drives one question through the expert graph and returns the run output.
pub struct Orchestrator {
    roster: Arc<Roster>,
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl Orchestrator {
    /// Fails when the roster has duplicate groups or expert names.
    pub fn new(
        roster: Roster,
        collaborators: Collaborators,
        settings: PipelineSettings,
    ) -> Result<Self, AgentError> {
        roster.validate().map_err(AgentError::Config)?;
        Ok(Self {
            roster: Arc::new(roster),
            collaborators,
            settings,
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// The graph this orchestrator executes.
    pub fn graph(&self) -> TaskGraph {
        TaskGraph::standard(self.settings.review_rounds > 0)
    }

    pub async fn run(&self, question: &str) -> Result<RunOutput, AgentError> {
        self.run_with_cancel(question, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<RunOutput, AgentError> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        info!(run_id = %run_id, experts = self.roster.expert_count(), "Run started");

        let runner = Arc::new(PipelineRunner {
            roster: Arc::clone(&self.roster),
            ctx: RunContext::new(self.collaborators.clone(), self.settings.clone(), run_id),
        });

        let state = execute(&self.graph(), runner, RunState::new(question), cancel).await?;
        let output = state.to_output(run_id);

        if output.is_degraded() {
            warn!(run_id = %run_id, "Run finished with degraded stages");
        }
        info!(
            run_id = %run_id,
            experts = output.expert_count(),
            summaries = output.group_summaries.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Run complete"
        );
        Ok(output)
    }
}

/// Maps graph nodes onto the expert, group, synthesis and review tasks.
struct PipelineRunner {
    roster: Arc<Roster>,
    ctx: RunContext,
}

#[async_trait]
impl NodeRunner for PipelineRunner {
    async fn run_node(&self, node: NodeId, snapshot: Arc<RunState>) -> StatePatch {
        match node {
            NodeId::Initializer => GroupId::ALL
                .iter()
                .fold(StatePatch::default(), |patch, group| {
                    patch.with_group_question(*group, snapshot.question.clone())
                }),
            NodeId::Group(id) => {
                let Some(group) = self.roster.group(id) else {
                    warn!(group = %id, "Group not in roster, skipping");
                    return StatePatch::default();
                };
                let prior = if id == GroupId::Strategy && self.ctx.settings.strategy_reads_summaries {
                    prior_context(&self.roster, &snapshot)
                } else {
                    None
                };
                run_group(&self.ctx, group, snapshot.question_for(id), prior.as_deref()).await
            }
            NodeId::Join => {
                info!(summaries = snapshot.group_summaries.len(), "Join barrier released");
                StatePatch::default()
            }
            NodeId::FinalSynthesis => run_final_synthesis(&self.ctx, &self.roster, &snapshot).await,
            NodeId::Review => {
                run_review(&self.ctx, &self.roster, &snapshot, self.ctx.settings.review_rounds).await
            }
        }
    }
}
