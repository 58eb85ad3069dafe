use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the five analytical dimensions of a run.
///
/// The first four groups run concurrently; `Strategy` is gated behind
/// the join barrier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GroupId {
    Market,
    Financial,
    Sectoral,
    External,
    Strategy,
}

impl GroupId {
    pub const ALL: [GroupId; 5] = [
        GroupId::Market,
        GroupId::Financial,
        GroupId::Sectoral,
        GroupId::External,
        GroupId::Strategy,
    ];

    /// Groups that start right after the initializer.
    pub const FIRST_TIER: [GroupId; 4] = [
        GroupId::Market,
        GroupId::Financial,
        GroupId::Sectoral,
        GroupId::External,
    ];

    /// 1-based position, used for the `group_<n>` / `question_<n>` state keys.
    pub fn index(self) -> usize {
        match self {
            GroupId::Market => 1,
            GroupId::Financial => 2,
            GroupId::Sectoral => 3,
            GroupId::External => 4,
            GroupId::Strategy => 5,
        }
    }

    pub fn state_key(self) -> String {
        format!("group_{}", self.index())
    }

    pub fn question_key(self) -> String {
        format!("question_{}", self.index())
    }

    /// Graph node name for this group's task.
    pub fn node_name(self) -> &'static str {
        match self {
            GroupId::Market => "market_analysis_group",
            GroupId::Financial => "financial_analysis_group",
            GroupId::Sectoral => "sectoral_analysis_group",
            GroupId::External => "external_factors_group",
            GroupId::Strategy => "strategy_group",
        }
    }

    pub fn default_display_name(self) -> &'static str {
        match self {
            GroupId::Market => "Market Analysis (Phân tích Thị trường)",
            GroupId::Financial => "Financial Analysis (Phân tích Tài chính)",
            GroupId::Sectoral => "Sectoral Analysis (Phân tích Ngành)",
            GroupId::External => "External Factors (Yếu tố Bên ngoài)",
            GroupId::Strategy => "Strategy (Lập chiến lược)",
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_name())
    }
}

/// A persona that produces one domain-specific analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertSpec {
    /// Globally unique identifier, e.g. `market_analyst`.
    pub name: String,
    /// System instructions describing the persona.
    pub persona: String,
}

impl ExpertSpec {
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
        }
    }

    /// Human-readable form of the name (`market_analyst` -> `market analyst`).
    pub fn title(&self) -> String {
        self.name.replace('_', " ")
    }
}

/// A fixed set of experts plus the display name used for its summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupSpec {
    pub id: GroupId,
    pub display_name: String,
    pub experts: Vec<ExpertSpec>,
}

impl GroupSpec {
    pub fn expert_names(&self) -> Vec<&str> {
        self.experts.iter().map(|e| e.name.as_str()).collect()
    }

    /// Display name with any parenthetical suffix removed.
    pub fn clean_name(&self) -> String {
        clean_group_name(&self.display_name)
    }
}

/// Strip a parenthetical suffix: `Market Analysis (Thị trường)` -> `Market Analysis`.
pub fn clean_group_name(display_name: &str) -> String {
    match display_name.split_once('(') {
        Some((head, _)) => head.trim().to_string(),
        None => display_name.to_string(),
    }
}

/// The full assignment of experts to groups for a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Roster {
    pub groups: Vec<GroupSpec>,
}

impl Roster {
    pub fn new(groups: Vec<GroupSpec>) -> Self {
        Self { groups }
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupSpec> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn expert_count(&self) -> usize {
        self.groups.iter().map(|g| g.experts.len()).sum()
    }

    /// Check that every group appears exactly once under a distinct display
    /// name and that every expert name is globally unique.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen_groups = HashSet::new();
        let mut seen_names = HashSet::new();
        for group in &self.groups {
            if !seen_groups.insert(group.id) {
                return Err(format!("group {} is declared more than once", group.id));
            }
            if !seen_names.insert(group.display_name.as_str()) {
                return Err(format!(
                    "display name {:?} is used by more than one group",
                    group.display_name
                ));
            }
        }

        let mut seen_experts = HashSet::new();
        for group in &self.groups {
            for expert in &group.experts {
                if expert.name.trim().is_empty() {
                    return Err(format!("group {} has an expert with an empty name", group.id));
                }
                if !seen_experts.insert(expert.name.as_str()) {
                    return Err(format!("expert name {} is not unique", expert.name));
                }
            }
        }

        if let Some(missing) = GroupId::ALL.iter().find(|id| !seen_groups.contains(*id)) {
            return Err(format!("group {missing} is missing from the roster"));
        }

        Ok(())
    }
}
