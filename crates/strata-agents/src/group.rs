use std::time::Instant;

use strata_models::{search_key, ArtifactKind, GroupSpec, StatePatch};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::error::AgentError;
use crate::expert::run_expert;
use crate::prompts;

/// Run a group: its experts in declared order, then the summarizer.
///
/// `prior_summaries` is extra context handed to every expert and the
/// summarizer (used by the strategy group).
pub async fn run_group(
    ctx: &RunContext,
    group: &GroupSpec,
    question: &str,
    prior_summaries: Option<&str>,
) -> StatePatch {
    let start = Instant::now();
    info!(group = %group.id, experts = group.experts.len(), "Group started");

    let mut patch = StatePatch::default();
    for expert in &group.experts {
        patch.absorb(run_expert(ctx, group.id, expert, question, prior_summaries).await);
    }

    let summary = summarize_group(ctx, group, question, &patch, prior_summaries).await;
    patch.absorb(summary);

    info!(group = %group.id, elapsed_ms = start.elapsed().as_millis(), "Group finished");
    patch
}

/// Condense the group's analyses into one summary keyed by display name.
///
/// Errors become an `Error in summary: ...` entry.
pub async fn summarize_group(
    ctx: &RunContext,
    group: &GroupSpec,
    question: &str,
    experts_patch: &StatePatch,
    prior_summaries: Option<&str>,
) -> StatePatch {
    let summary = match request_summary(ctx, group, question, experts_patch, prior_summaries).await {
        Ok(text) => {
            ctx.persist(ArtifactKind::GroupSummary, &group.clean_name(), question, &text);
            text
        }
        Err(e) => {
            warn!(group = %group.id, error = %e, "Summary degraded");
            format!("Error in summary: {e}")
        }
    };

    StatePatch::default().with_summary(group.display_name.clone(), summary)
}

async fn request_summary(
    ctx: &RunContext,
    group: &GroupSpec,
    question: &str,
    experts_patch: &StatePatch,
    prior_summaries: Option<&str>,
) -> Result<String, AgentError> {
    let entries = experts_patch.groups.get(&group.id);

    let analyses: Vec<(&str, &str)> = group
        .experts
        .iter()
        .filter_map(|expert| {
            entries
                .and_then(|map| map.get(&expert.name))
                .map(|text| (expert.name.as_str(), text.as_str()))
        })
        .collect();

    let queries: Vec<(&str, &[String])> = group
        .experts
        .iter()
        .filter_map(|expert| {
            experts_patch
                .search_results
                .get(&search_key(&expert.name))
                .filter(|entry| entry.error().is_none())
                .map(|entry| (expert.name.as_str(), entry.queries()))
        })
        .collect();

    ctx.complete(&prompts::group_summary(
        group,
        question,
        &analyses,
        &queries,
        prior_summaries,
    ))
    .await
}
