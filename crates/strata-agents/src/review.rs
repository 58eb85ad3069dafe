//! Optional critique and refinement rounds run after the final synthesis.

use std::collections::BTreeMap;

use strata_models::{ArtifactKind, GroupSpec, Roster, RunState, StatePatch};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::prompts;
use crate::synthesis::ordered_summaries;

/// Run `rounds` critique/refine passes and return everything they changed.
pub async fn run_review(ctx: &RunContext, roster: &Roster, state: &RunState, rounds: u32) -> StatePatch {
    let mut working = state.clone();
    let mut patch = StatePatch::default();

    for round in 1..=rounds {
        info!(round, rounds, "Review round started");
        let round_patch = review_round(ctx, roster, &working).await;
        working.merge(round_patch.clone());
        patch.absorb(round_patch);
    }

    patch
}

async fn review_round(ctx: &RunContext, roster: &Roster, state: &RunState) -> StatePatch {
    let question = state.resolved_question().unwrap_or_default().to_string();
    let empty = BTreeMap::new();
    let mut patch = StatePatch::default();

    // Critique every group summary, remembering which ones succeeded.
    let mut critiques: Vec<(&GroupSpec, Option<String>)> = Vec::new();
    for group in &roster.groups {
        let Some(summary) = state.group_summaries.get(&group.display_name) else {
            continue;
        };
        let analyses = state.groups.get(&group.id).unwrap_or(&empty);
        let messages = prompts::group_critique(&group.display_name, analyses, summary);
        match ctx.complete(&messages).await {
            Ok(text) => {
                patch = patch.with_critique(group.display_name.clone(), text.clone());
                critiques.push((group, Some(text)));
            }
            Err(e) => {
                warn!(group = %group.id, error = %e, "Group critique failed");
                patch = patch.with_critique(
                    group.display_name.clone(),
                    format!("Error generating critique for {}: {e}", group.display_name),
                );
                critiques.push((group, None));
            }
        }
    }

    let summaries = ordered_summaries(roster, state);
    let report = state.final_report.clone().unwrap_or_default();
    let meta = match ctx.complete(&prompts::meta_critique(&summaries, &report)).await {
        Ok(text) => {
            patch = patch.with_meta_critique(text.clone());
            Some(text)
        }
        Err(e) => {
            warn!(error = %e, "Meta critique failed");
            patch = patch.with_meta_critique(format!("Error generating meta-critique: {e}"));
            None
        }
    };

    for (group, critique) in critiques {
        let Some(critique) = critique else { continue };
        let Some(current) = state.group_summaries.get(&group.display_name) else {
            continue;
        };
        let analyses = state.groups.get(&group.id).unwrap_or(&empty);
        let messages = prompts::refine_summary(&group.display_name, analyses, current, &critique);
        match ctx.complete(&messages).await {
            Ok(refined) => {
                ctx.persist(ArtifactKind::GroupSummary, &group.clean_name(), &question, &refined);
                patch = patch.with_summary(group.display_name.clone(), refined);
            }
            Err(e) => warn!(group = %group.id, error = %e, "Summary refinement failed, keeping current"),
        }
    }

    if let Some(critique) = meta {
        // The report is refined against this round's refined summaries.
        let mut current = state.clone();
        current.group_summaries.extend(patch.group_summaries.clone());
        let summaries = ordered_summaries(roster, &current);
        match ctx.complete(&prompts::refine_report(&summaries, &report, &critique)).await {
            Ok(refined) => {
                ctx.persist(ArtifactKind::FinalReport, "final", &question, &refined);
                patch = patch.with_final_report(refined);
            }
            Err(e) => warn!(error = %e, "Report refinement failed, keeping current"),
        }
    }

    patch
}
