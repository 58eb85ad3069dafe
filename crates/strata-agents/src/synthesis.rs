use std::time::Instant;

use strata_models::{ArtifactKind, GroupId, Roster, RunState, StatePatch};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::prompts;

const NO_QUESTION: &str = "No question provided";

/// Group summaries in roster order, followed by any keys the roster does not name.
pub fn ordered_summaries<'a>(roster: &Roster, state: &'a RunState) -> Vec<(&'a str, &'a str)> {
    let mut ordered: Vec<(&str, &str)> = roster
        .groups
        .iter()
        .filter_map(|group| state.group_summaries.get_key_value(&group.display_name))
        .map(|(name, text)| (name.as_str(), text.as_str()))
        .collect();

    for (name, text) in &state.group_summaries {
        if !ordered.iter().any(|(seen, _)| *seen == name.as_str()) {
            ordered.push((name.as_str(), text.as_str()));
        }
    }
    ordered
}

/// Four first-tier summaries rendered as context for the strategy group.
pub fn prior_context(roster: &Roster, state: &RunState) -> Option<String> {
    let summaries: Vec<(&str, &str)> = ordered_summaries(roster, state)
        .into_iter()
        .filter(|(name, _)| {
            roster
                .group(GroupId::Strategy)
                .map_or(true, |strategy| strategy.display_name != *name)
        })
        .collect();

    (!summaries.is_empty()).then(|| prompts::summaries_block(&summaries))
}

/// Final report from all group summaries. Errors become `Error in final synthesis: ...`.
pub async fn run_final_synthesis(ctx: &RunContext, roster: &Roster, state: &RunState) -> StatePatch {
    let start = Instant::now();
    let question = state.resolved_question().unwrap_or(NO_QUESTION);
    let summaries = ordered_summaries(roster, state);
    info!(summaries = summaries.len(), "Final synthesis started");

    let report = match ctx.complete(&prompts::final_synthesis(question, &summaries)).await {
        Ok(text) => {
            ctx.persist(ArtifactKind::FinalReport, "final", question, &text);
            info!(elapsed_ms = start.elapsed().as_millis(), "Final synthesis finished");
            text
        }
        Err(e) => {
            warn!(error = %e, "Final synthesis degraded");
            format!("Error in final synthesis: {e}")
        }
    };

    StatePatch::default().with_final_report(report)
}
