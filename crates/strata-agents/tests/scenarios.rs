//! End-to-end runs of the full expert graph against scripted collaborators.
//!
//! Every test drives `Orchestrator` with the default 5 x 5 roster, a
//! `ScriptedModel` that echoes the question back, and an in-memory or
//! on-disk artifact store, then checks the shape of the `RunOutput`.

use std::sync::Arc;
use std::time::Duration;

use strata_agents::prompts::default_roster;
use strata_agents::test_support::{
    collaborators, FailingSearch, RecordingStore, ScriptedModel, StaticSearch,
};
use strata_agents::{AgentError, Orchestrator, PipelineSettings, SearchProvider};
use strata_models::{search_key, ArtifactKind, ExpertSpec, GroupId, PipelineConfig};
use strata_store::{ArtifactStore, FileStore, SqliteStore};
use tokio_util::sync::CancellationToken;

const QUESTION: &str = "Should I increase my exposure to Vietnamese banking stocks in 2025?";

fn orchestrator(
    model: Arc<ScriptedModel>,
    search: Arc<dyn SearchProvider>,
    store: Arc<dyn ArtifactStore>,
    settings: PipelineSettings,
) -> Orchestrator {
    Orchestrator::new(default_roster(), collaborators(model, search, store), settings).unwrap()
}

fn default_orchestrator(model: Arc<ScriptedModel>, store: Arc<RecordingStore>) -> Orchestrator {
    orchestrator(
        model,
        Arc::new(StaticSearch::single()),
        store,
        PipelineSettings::default(),
    )
}

/// Index of the first recorded call whose messages contain `needle`.
fn first_call(model: &ScriptedModel, needle: &str) -> usize {
    model
        .calls()
        .iter()
        .position(|messages| messages.iter().any(|m| m.content.contains(needle)))
        .unwrap_or_else(|| panic!("no call contains {needle:?}"))
}

#[tokio::test]
async fn full_run_produces_every_section() {
    let model = Arc::new(ScriptedModel::new());
    let store = Arc::new(RecordingStore::new());

    let output = default_orchestrator(model.clone(), store.clone())
        .run(QUESTION)
        .await
        .unwrap();

    assert_eq!(output.expert_count(), 25);
    let roster = default_roster();
    for group in GroupId::ALL {
        let keys: Vec<&str> = output.group(group).keys().map(String::as_str).collect();
        let mut expected = roster.group(group).unwrap().expert_names();
        expected.sort_unstable();
        assert_eq!(keys, expected, "group {group}");
    }
    assert_eq!(output.question_1, QUESTION);
    assert_eq!(output.question_5, QUESTION);
    assert_eq!(output.search_results.len(), 25);
    assert_eq!(output.group_summaries.len(), 5);
    assert!(output.final_report.contains("banking"));
    assert!(!output.is_degraded());
    assert!(output.critiques.is_empty());
    assert!(output.meta_critique.is_none());

    // query + analysis per expert, one summary per group, one report
    assert_eq!(model.call_count(), 25 * 2 + 5 + 1);

    assert_eq!(store.count_of(ArtifactKind::ExpertAnalysis), 25);
    assert_eq!(store.count_of(ArtifactKind::GroupSummary), 5);
    assert_eq!(store.count_of(ArtifactKind::FinalReport), 1);
    assert!(store.artifacts().iter().all(|a| a.run_id == output.run_id));
}

#[tokio::test]
async fn broken_search_still_yields_analyses() {
    let model = Arc::new(ScriptedModel::new());
    let search = Arc::new(FailingSearch::always());

    let output = orchestrator(
        model,
        search.clone(),
        Arc::new(RecordingStore::new()),
        PipelineSettings::default(),
    )
    .run(QUESTION)
    .await
    .unwrap();

    assert_eq!(search.call_count(), 25 * 3);
    assert_eq!(output.search_results.len(), 25);
    for entry in output.search_results.values() {
        assert_eq!(entry.error(), Some("Search error: search backend unavailable"));
    }
    assert_eq!(output.expert_count(), 25);
    assert!(!output.is_degraded());
    assert!(output.final_report.contains("banking"));
}

#[tokio::test]
async fn malformed_query_output_uses_line_fallback() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_query_response("Sure, try these:\n\"vn-index earnings outlook\"\n'foreign net buying hose'\nthanks"),
    );
    let search = Arc::new(StaticSearch::single());

    let output = orchestrator(
        model,
        search.clone(),
        Arc::new(RecordingStore::new()),
        PipelineSettings::default(),
    )
    .run(QUESTION)
    .await
    .unwrap();

    let entry = &output.search_results[&search_key("valuation_expert")];
    assert_eq!(entry.queries(), ["vn-index earnings outlook", "foreign net buying hose"]);
    assert_eq!(search.queries().len(), 25 * 2);
}

#[tokio::test]
async fn unparseable_queries_give_empty_search() {
    let model = Arc::new(ScriptedModel::new().with_query_response("I cannot help with that."));
    let search = Arc::new(StaticSearch::single());

    let output = orchestrator(
        model,
        search.clone(),
        Arc::new(RecordingStore::new()),
        PipelineSettings::default(),
    )
    .run(QUESTION)
    .await
    .unwrap();

    assert!(search.queries().is_empty());
    for entry in output.search_results.values() {
        assert!(entry.error().is_none());
        assert!(entry.queries().is_empty());
    }
    assert_eq!(output.expert_count(), 25);
}

#[tokio::test]
async fn max_queries_caps_every_expert() {
    let model = Arc::new(ScriptedModel::new());
    let search = Arc::new(StaticSearch::single());
    let settings = PipelineSettings::from(&PipelineConfig {
        max_queries: 1,
        ..PipelineConfig::default()
    });

    let output = orchestrator(model, search.clone(), Arc::new(RecordingStore::new()), settings)
        .run(QUESTION)
        .await
        .unwrap();

    assert_eq!(search.queries().len(), 25);
    assert!(output.search_results.values().all(|e| e.queries().len() == 1));
}

#[tokio::test]
async fn repeated_runs_issue_the_same_queries() {
    let first = default_orchestrator(Arc::new(ScriptedModel::new()), Arc::new(RecordingStore::new()))
        .run(QUESTION)
        .await
        .unwrap();
    let second = default_orchestrator(Arc::new(ScriptedModel::new()), Arc::new(RecordingStore::new()))
        .run(QUESTION)
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    for (key, entry) in &first.search_results {
        assert_eq!(entry.queries(), second.search_results[key].queries(), "{key}");
    }
}

#[tokio::test]
async fn strategy_starts_after_every_first_tier_summary() {
    let model = Arc::new(ScriptedModel::new());
    let roster = default_roster();

    default_orchestrator(model.clone(), Arc::new(RecordingStore::new()))
        .run(QUESTION)
        .await
        .unwrap();

    let strategy = roster.group(GroupId::Strategy).unwrap();
    let strategy_start = first_call(&model, &format!("as a {}", strategy.experts[0].title()));

    for id in GroupId::FIRST_TIER {
        let group = roster.group(id).unwrap();
        let summary = first_call(
            &model,
            &format!("group coordinator for the {} expert team", group.display_name),
        );
        assert!(summary < strategy_start, "{id} summarized after strategy started");
    }
}

#[tokio::test]
async fn strategy_prompts_carry_first_tier_summaries() {
    let model = Arc::new(ScriptedModel::new());

    default_orchestrator(model.clone(), Arc::new(RecordingStore::new()))
        .run(QUESTION)
        .await
        .unwrap();

    let with_context = model.calls_containing("FINDINGS FROM OTHER EXPERT GROUPS");
    // five strategy analyses plus the strategy summary
    assert_eq!(with_context.len(), 6);
    for messages in &with_context {
        let prompt = &messages[1].content;
        for id in GroupId::FIRST_TIER {
            assert!(prompt.contains(&format!("### Summary from {}:", id.default_display_name())));
        }
        assert!(!prompt.contains("### Summary from Strategy"));
    }
}

#[tokio::test]
async fn strategy_context_can_be_disabled() {
    let model = Arc::new(ScriptedModel::new());
    let settings = PipelineSettings::from(&PipelineConfig {
        strategy_reads_summaries: false,
        ..PipelineConfig::default()
    });

    orchestrator(
        model.clone(),
        Arc::new(StaticSearch::single()),
        Arc::new(RecordingStore::new()),
        settings,
    )
    .run(QUESTION)
    .await
    .unwrap();

    assert!(model.calls_containing("FINDINGS FROM OTHER EXPERT GROUPS").is_empty());
}

#[tokio::test]
async fn review_round_adds_critiques() {
    let model = Arc::new(ScriptedModel::new());
    let store = Arc::new(RecordingStore::new());
    let settings = PipelineSettings::from(&PipelineConfig {
        review_rounds: 1,
        ..PipelineConfig::default()
    });

    let output = orchestrator(model.clone(), Arc::new(StaticSearch::single()), store.clone(), settings)
        .run(QUESTION)
        .await
        .unwrap();

    assert_eq!(output.critiques.len(), 5);
    assert_eq!(output.meta_critique.as_deref(), Some("Canned review text."));
    assert_eq!(output.final_report, "Canned review text.");
    assert_eq!(model.call_count(), 25 * 2 + 5 + 1 + 12);
    assert_eq!(store.count_of(ArtifactKind::FinalReport), 2);
}

#[tokio::test]
async fn failing_summarizer_degrades_without_aborting() {
    let model = Arc::new(ScriptedModel::new().failing_when("group coordinator for the Financial"));

    let output = default_orchestrator(model, Arc::new(RecordingStore::new()))
        .run(QUESTION)
        .await
        .unwrap();

    let financial = GroupId::Financial.default_display_name();
    assert!(output.group_summaries[financial].starts_with("Error in summary: "));
    assert!(output.is_degraded());
    assert!(output.final_report.contains("banking"));
    assert_eq!(output.group_summaries.len(), 5);
}

#[tokio::test]
async fn cancellation_stops_the_run() {
    let model = Arc::new(ScriptedModel::new().with_delay(Duration::from_secs(5)));
    let orchestrator = default_orchestrator(model, Arc::new(RecordingStore::new()));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        orchestrator.run_with_cancel(QUESTION, cancel),
    )
    .await
    .expect("cancellation did not stop the run");

    assert!(matches!(result, Err(AgentError::Cancelled)));
}

#[test]
fn duplicate_expert_names_are_rejected() {
    let mut roster = default_roster();
    roster.groups[1]
        .experts
        .push(ExpertSpec::new("market_analyst", "duplicate"));

    let result = Orchestrator::new(
        roster,
        collaborators(
            Arc::new(ScriptedModel::new()),
            Arc::new(StaticSearch::single()),
            Arc::new(RecordingStore::new()),
        ),
        PipelineSettings::default(),
    );

    assert!(matches!(result, Err(AgentError::Config(msg)) if msg.contains("market_analyst")));
}

#[test]
fn groups_sharing_a_display_name_are_rejected() {
    let mut roster = default_roster();
    roster.groups[1].display_name = roster.groups[0].display_name.clone();

    let result = Orchestrator::new(
        roster,
        collaborators(
            Arc::new(ScriptedModel::new()),
            Arc::new(StaticSearch::single()),
            Arc::new(RecordingStore::new()),
        ),
        PipelineSettings::default(),
    );

    assert!(matches!(result, Err(AgentError::Config(msg)) if msg.contains("more than one group")));
}

#[test]
fn roster_missing_a_group_is_rejected() {
    let mut roster = default_roster();
    roster.groups.retain(|g| g.id != GroupId::Strategy);

    let result = Orchestrator::new(
        roster,
        collaborators(
            Arc::new(ScriptedModel::new()),
            Arc::new(StaticSearch::single()),
            Arc::new(RecordingStore::new()),
        ),
        PipelineSettings::default(),
    );

    assert!(matches!(result, Err(AgentError::Config(msg)) if msg.contains("strategy_group")));
}

#[tokio::test]
async fn file_store_receives_full_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());

    let output = orchestrator(
        Arc::new(ScriptedModel::new()),
        Arc::new(StaticSearch::single()),
        store.clone(),
        PipelineSettings::default(),
    )
    .run(QUESTION)
    .await
    .unwrap();

    let experts = std::fs::read_dir(dir.path().join("expert_responses")).unwrap().count();
    let groups = std::fs::read_dir(dir.path().join("group_responses")).unwrap().count();
    assert_eq!(experts, 25);
    assert_eq!(groups, 5);

    let report = std::fs::read_to_string(dir.path().join("final_investment_strategy.txt")).unwrap();
    assert!(report.starts_with("=== OPTIMAL INVESTMENT STRATEGY ==="));
    assert!(report.ends_with(&output.final_report));

    let summary =
        std::fs::read_to_string(dir.path().join("group_responses").join("Strategy.txt")).unwrap();
    assert!(summary.contains(&format!("Question: {QUESTION}")));
}

#[tokio::test]
async fn sqlite_store_keeps_runs_apart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let store = Arc::new(SqliteStore::open(path.to_str().unwrap()).unwrap());
    let orchestrator = orchestrator(
        Arc::new(ScriptedModel::new()),
        Arc::new(StaticSearch::single()),
        store.clone(),
        PipelineSettings::default(),
    );

    let first = orchestrator.run(QUESTION).await.unwrap();
    let second = orchestrator.run("Is FPT a buy?").await.unwrap();

    assert_eq!(store.count().unwrap(), 2 * 31);
    let artifacts = store.artifacts_for_run(second.run_id).unwrap();
    assert_eq!(artifacts.len(), 31);
    assert!(artifacts.iter().all(|a| a.question == "Is FPT a buy?"));
    assert_ne!(first.run_id, second.run_id);
}
