use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::roster::GroupId;
use crate::search::{search_key, SearchEntry};

/// The accumulated state of one run.
///
/// Every field is either written once or grown by key union through
/// [`RunState::merge`]; nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub question: String,
    pub group_questions: BTreeMap<GroupId, String>,
    /// group -> expert name -> analysis text
    pub groups: BTreeMap<GroupId, BTreeMap<String, String>>,
    /// `<expert>_search` -> entry
    pub search_results: BTreeMap<String, SearchEntry>,
    /// group display name -> summary text
    pub group_summaries: BTreeMap<String, String>,
    pub final_report: Option<String>,
    /// group display name -> critique text
    pub critiques: BTreeMap<String, String>,
    pub meta_critique: Option<String>,
}

/// One node's contribution to the run state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub group_questions: BTreeMap<GroupId, String>,
    pub groups: BTreeMap<GroupId, BTreeMap<String, String>>,
    pub search_results: BTreeMap<String, SearchEntry>,
    pub group_summaries: BTreeMap<String, String>,
    pub final_report: Option<String>,
    pub critiques: BTreeMap<String, String>,
    pub meta_critique: Option<String>,
}

impl StatePatch {
    pub fn with_group_question(mut self, group: GroupId, question: impl Into<String>) -> Self {
        self.group_questions.insert(group, question.into());
        self
    }

    pub fn with_expert(
        mut self,
        group: GroupId,
        expert: impl Into<String>,
        analysis: impl Into<String>,
    ) -> Self {
        self.groups
            .entry(group)
            .or_default()
            .insert(expert.into(), analysis.into());
        self
    }

    pub fn with_search(mut self, expert: &str, entry: SearchEntry) -> Self {
        self.search_results.insert(search_key(expert), entry);
        self
    }

    pub fn with_summary(mut self, group_name: impl Into<String>, summary: impl Into<String>) -> Self {
        self.group_summaries.insert(group_name.into(), summary.into());
        self
    }

    pub fn with_final_report(mut self, report: impl Into<String>) -> Self {
        self.final_report = Some(report.into());
        self
    }

    pub fn with_critique(mut self, group_name: impl Into<String>, critique: impl Into<String>) -> Self {
        self.critiques.insert(group_name.into(), critique.into());
        self
    }

    pub fn with_meta_critique(mut self, critique: impl Into<String>) -> Self {
        self.meta_critique = Some(critique.into());
        self
    }

    /// Fold another patch into this one using the same rules as [`RunState::merge`].
    pub fn absorb(&mut self, other: StatePatch) {
        self.group_questions.extend(other.group_questions);
        for (group, entries) in other.groups {
            self.groups.entry(group).or_default().extend(entries);
        }
        self.search_results.extend(other.search_results);
        self.group_summaries.extend(other.group_summaries);
        self.critiques.extend(other.critiques);
        if other.final_report.is_some() {
            self.final_report = other.final_report;
        }
        if other.meta_critique.is_some() {
            self.meta_critique = other.meta_critique;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group_questions.is_empty()
            && self.groups.is_empty()
            && self.search_results.is_empty()
            && self.group_summaries.is_empty()
            && self.final_report.is_none()
            && self.critiques.is_empty()
            && self.meta_critique.is_none()
    }
}

impl RunState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// Deterministic reducer: maps merge by key union, singletons are
    /// last-writer-wins, per-group question copies are write-once.
    pub fn merge(&mut self, patch: StatePatch) {
        for (group, question) in patch.group_questions {
            let conflicting = self
                .group_questions
                .get(&group)
                .is_some_and(|existing| !existing.is_empty() && *existing != question);
            if conflicting {
                warn!(group = %group, "Ignoring second write to group question");
            } else {
                self.group_questions.insert(group, question);
            }
        }

        for (group, entries) in patch.groups {
            let slot = self.groups.entry(group).or_default();
            for (expert, analysis) in entries {
                if slot.insert(expert.clone(), analysis).is_some() {
                    debug!(group = %group, expert = %expert, "Replaced existing analysis");
                }
            }
        }

        union_into(&mut self.search_results, patch.search_results, "search_results");
        union_into(&mut self.group_summaries, patch.group_summaries, "group_summaries");
        union_into(&mut self.critiques, patch.critiques, "critiques");

        if patch.final_report.is_some() {
            self.final_report = patch.final_report;
        }
        if patch.meta_critique.is_some() {
            self.meta_critique = patch.meta_critique;
        }
    }

    /// The canonical question, or the first populated per-group copy.
    pub fn resolved_question(&self) -> Option<&str> {
        if !self.question.trim().is_empty() {
            return Some(&self.question);
        }
        GroupId::ALL
            .iter()
            .filter_map(|g| self.group_questions.get(g))
            .map(String::as_str)
            .find(|q| !q.trim().is_empty())
    }

    /// The question a group should work on: its own copy, else the canonical one.
    pub fn question_for(&self, group: GroupId) -> &str {
        self.group_questions
            .get(&group)
            .map(String::as_str)
            .filter(|q| !q.is_empty())
            .unwrap_or(self.question.as_str())
    }

    pub fn group_entries(&self, group: GroupId) -> Option<&BTreeMap<String, String>> {
        self.groups.get(&group)
    }

    pub fn to_output(&self, run_id: Uuid) -> RunOutput {
        let question = |g: GroupId| self.group_questions.get(&g).cloned().unwrap_or_default();
        let group = |g: GroupId| self.groups.get(&g).cloned().unwrap_or_default();

        RunOutput {
            run_id,
            question_1: question(GroupId::Market),
            question_2: question(GroupId::Financial),
            question_3: question(GroupId::Sectoral),
            question_4: question(GroupId::External),
            question_5: question(GroupId::Strategy),
            group_1: group(GroupId::Market),
            group_2: group(GroupId::Financial),
            group_3: group(GroupId::Sectoral),
            group_4: group(GroupId::External),
            group_5: group(GroupId::Strategy),
            group_summaries: self.group_summaries.clone(),
            search_results: self.search_results.clone(),
            final_report: self.final_report.clone().unwrap_or_default(),
            critiques: self.critiques.clone(),
            meta_critique: self.meta_critique.clone(),
        }
    }
}

fn union_into<V>(target: &mut BTreeMap<String, V>, incoming: BTreeMap<String, V>, field: &str) {
    for (key, value) in incoming {
        if target.insert(key.clone(), value).is_some() {
            debug!(field, key = %key, "Replaced existing entry");
        }
    }
}

/// The externally visible result of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub question_1: String,
    pub question_2: String,
    pub question_3: String,
    pub question_4: String,
    pub question_5: String,
    pub group_1: BTreeMap<String, String>,
    pub group_2: BTreeMap<String, String>,
    pub group_3: BTreeMap<String, String>,
    pub group_4: BTreeMap<String, String>,
    pub group_5: BTreeMap<String, String>,
    pub group_summaries: BTreeMap<String, String>,
    pub search_results: BTreeMap<String, SearchEntry>,
    pub final_report: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub critiques: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_critique: Option<String>,
}

impl RunOutput {
    pub fn group(&self, id: GroupId) -> &BTreeMap<String, String> {
        match id {
            GroupId::Market => &self.group_1,
            GroupId::Financial => &self.group_2,
            GroupId::Sectoral => &self.group_3,
            GroupId::External => &self.group_4,
            GroupId::Strategy => &self.group_5,
        }
    }

    /// Total number of expert analyses across all groups.
    pub fn expert_count(&self) -> usize {
        GroupId::ALL.iter().map(|g| self.group(*g).len()).sum()
    }

    /// True when any stage degraded to an inline error placeholder.
    pub fn is_degraded(&self) -> bool {
        let degraded = |text: &String| text.starts_with("Error in ");
        GroupId::ALL
            .iter()
            .flat_map(|g| self.group(*g).values())
            .any(degraded)
            || self.group_summaries.values().any(degraded)
            || degraded(&self.final_report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchRecord;

    #[test]
    fn merge_unions_disjoint_expert_entries() {
        let mut state = RunState::new("Should I buy VCB?");
        state.merge(StatePatch::default().with_expert(GroupId::Market, "market_analyst", "a"));
        state.merge(StatePatch::default().with_expert(GroupId::Market, "technical_analyst", "b"));

        let entries = state.group_entries(GroupId::Market).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["market_analyst"], "a");
        assert_eq!(entries["technical_analyst"], "b");
    }

    #[test]
    fn merge_is_order_independent_for_disjoint_keys() {
        let p1 = StatePatch::default()
            .with_summary("Market Analysis", "m")
            .with_search(
                "market_analyst",
                SearchEntry::Completed {
                    queries: vec!["q".to_string()],
                    results: vec![SearchRecord::new("t", "l", "s")],
                },
            );
        let p2 = StatePatch::default()
            .with_summary("Financial Analysis", "f")
            .with_expert(GroupId::Financial, "valuation_expert", "v");

        let mut a = RunState::new("q");
        a.merge(p1.clone());
        a.merge(p2.clone());

        let mut b = RunState::new("q");
        b.merge(p2);
        b.merge(p1);

        assert_eq!(a, b);
    }

    #[test]
    fn group_question_is_write_once() {
        let mut state = RunState::new("original");
        state.merge(StatePatch::default().with_group_question(GroupId::Market, "original"));
        state.merge(StatePatch::default().with_group_question(GroupId::Market, "changed"));
        assert_eq!(state.question_for(GroupId::Market), "original");
    }

    #[test]
    fn final_report_last_writer_wins() {
        let mut state = RunState::default();
        state.merge(StatePatch::default().with_final_report("draft"));
        state.merge(StatePatch::default().with_final_report("refined"));
        assert_eq!(state.final_report.as_deref(), Some("refined"));
    }

    #[test]
    fn resolved_question_falls_back_to_copies() {
        let mut state = RunState::default();
        assert!(state.resolved_question().is_none());

        state.merge(StatePatch::default().with_group_question(GroupId::Sectoral, "copy"));
        assert_eq!(state.resolved_question(), Some("copy"));

        state.question = "canonical".to_string();
        assert_eq!(state.resolved_question(), Some("canonical"));
    }

    #[test]
    fn absorb_combines_patches() {
        let mut patch = StatePatch::default().with_expert(GroupId::Strategy, "a", "1");
        patch.absorb(StatePatch::default().with_expert(GroupId::Strategy, "b", "2"));
        assert_eq!(patch.groups[&GroupId::Strategy].len(), 2);
        assert!(!patch.is_empty());
        assert!(StatePatch::default().is_empty());
    }

    #[test]
    fn output_has_all_group_keys() {
        let mut state = RunState::new("q");
        for g in GroupId::ALL {
            state.merge(StatePatch::default().with_group_question(g, "q"));
        }
        state.merge(StatePatch::default().with_expert(GroupId::External, "x", "analysis"));

        let output = state.to_output(Uuid::nil());
        let json = serde_json::to_value(&output).unwrap();
        for n in 1..=5 {
            assert_eq!(json[format!("question_{n}")], "q");
            assert!(json[format!("group_{n}")].is_object());
        }
        assert!(json.get("critiques").is_none());
        assert!(json.get("meta_critique").is_none());
        assert_eq!(output.expert_count(), 1);
    }

    #[test]
    fn degraded_output_is_detected() {
        let mut state = RunState::new("q");
        state.merge(StatePatch::default().with_final_report("A fine report"));
        assert!(!state.to_output(Uuid::nil()).is_degraded());

        state.merge(StatePatch::default().with_expert(
            GroupId::Market,
            "market_analyst",
            "Error in analysis: timeout",
        ));
        assert!(state.to_output(Uuid::nil()).is_degraded());
    }
}
