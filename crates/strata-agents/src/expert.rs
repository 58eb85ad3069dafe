use std::time::Instant;

use strata_models::{ArtifactKind, ExpertSpec, GroupId, SearchEntry, SearchRecord, StatePatch};
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::error::AgentError;
use crate::parser::parse_queries;
use crate::prompts;

/// Result of a successful expert pipeline before it is folded into state.
#[derive(Debug, Clone)]
pub struct ExpertOutcome {
    pub analysis: String,
    pub search: SearchEntry,
}

/// Run one expert end to end and return its state contribution.
///
/// Never fails: any error in query generation, search or analysis turns
/// into an `Error in analysis: ...` entry so the group always has a value
/// under this expert's name.
pub async fn run_expert(
    ctx: &RunContext,
    group: GroupId,
    expert: &ExpertSpec,
    question: &str,
    prior_summaries: Option<&str>,
) -> StatePatch {
    let start = Instant::now();
    info!(expert = %expert.name, group = %group, "Expert started");

    match analyze(ctx, expert, question, prior_summaries).await {
        Ok(outcome) => {
            ctx.persist(ArtifactKind::ExpertAnalysis, &expert.name, question, &outcome.analysis);
            info!(
                expert = %expert.name,
                queries = outcome.search.queries().len(),
                elapsed_ms = start.elapsed().as_millis(),
                "Expert finished"
            );
            StatePatch::default()
                .with_expert(group, expert.name.clone(), outcome.analysis)
                .with_search(&expert.name, outcome.search)
        }
        Err(e) => {
            warn!(
                expert = %expert.name,
                error = %e,
                elapsed_ms = start.elapsed().as_millis(),
                "Expert degraded"
            );
            StatePatch::default()
                .with_expert(group, expert.name.clone(), format!("Error in analysis: {e}"))
                .with_search(&expert.name, SearchEntry::Failed { error: e.to_string() })
        }
    }
}

/// Query generation, search, compilation and analysis.
pub async fn analyze(
    ctx: &RunContext,
    expert: &ExpertSpec,
    question: &str,
    prior_summaries: Option<&str>,
) -> Result<ExpertOutcome, AgentError> {
    let raw = ctx
        .complete(&prompts::query_generation(expert, question))
        .await?;
    let queries = parse_queries(&raw, ctx.settings.max_queries);
    debug!(expert = %expert.name, count = queries.len(), "Generated search queries");

    let search = execute_searches(ctx, &expert.name, queries).await;
    let records: &[SearchRecord] = match &search {
        SearchEntry::Completed { results, .. } => results,
        SearchEntry::Failed { .. } => &[],
    };
    let compiled = prompts::compile_search_results(records);

    let analysis = ctx
        .complete(&prompts::analysis(expert, question, &compiled, prior_summaries))
        .await?;

    Ok(ExpertOutcome { analysis, search })
}

/// Run each query in order. A failed query is logged and skipped; when
/// every query fails the entry records the last error instead.
pub async fn execute_searches(ctx: &RunContext, expert: &str, queries: Vec<String>) -> SearchEntry {
    let mut results = Vec::new();
    let mut succeeded = 0usize;
    let mut last_error = None;

    for (i, query) in queries.iter().enumerate() {
        match ctx.search(query).await {
            Ok(records) => {
                debug!(expert = %expert, query = %query, index = i + 1, count = records.len(), "Search succeeded");
                succeeded += 1;
                results.extend(records);
            }
            Err(e) => {
                warn!(expert = %expert, query = %query, error = %e, "Search failed, skipping query");
                last_error = Some(e.to_string());
            }
        }
    }

    match last_error {
        Some(error) if succeeded == 0 => SearchEntry::Failed { error },
        _ => SearchEntry::Completed { queries, results },
    }
}
