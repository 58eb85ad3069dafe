use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// SQL DDL for the artifact audit table.
pub const ARTIFACT_TABLE_DDL: &str = "
CREATE TABLE IF NOT EXISTS artifacts (
    run_id      TEXT NOT NULL,
    kind        TEXT NOT NULL,
    name        TEXT NOT NULL,
    question    TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (run_id, kind, name)
);
CREATE INDEX IF NOT EXISTS idx_artifacts_kind ON artifacts(kind);
CREATE INDEX IF NOT EXISTS idx_artifacts_created ON artifacts(created_at);
";

/// The three namespaces of the artifact store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    ExpertAnalysis,
    GroupSummary,
    FinalReport,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ExpertAnalysis => "expert_analysis",
            ArtifactKind::GroupSummary => "group_summary",
            ArtifactKind::FinalReport => "final_report",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "expert_analysis" => Some(ArtifactKind::ExpertAnalysis),
            "group_summary" => Some(ArtifactKind::GroupSummary),
            "final_report" => Some(ArtifactKind::FinalReport),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text blob written to the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub run_id: Uuid,
    pub kind: ArtifactKind,
    /// Expert name, clean group name, or `final` for the report.
    pub name: String,
    pub question: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        run_id: Uuid,
        kind: ArtifactKind,
        name: impl Into<String>,
        question: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            kind,
            name: name.into(),
            question: question.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// Banner line written at the top of a rendered artifact.
    pub fn banner(&self) -> String {
        match self.kind {
            ArtifactKind::ExpertAnalysis => {
                format!("=== ANALYSIS FROM {} ===", self.name.to_uppercase())
            }
            ArtifactKind::GroupSummary => {
                format!("=== GROUP SUMMARY: {} ===", self.name.to_uppercase())
            }
            ArtifactKind::FinalReport => "=== OPTIMAL INVESTMENT STRATEGY ===".to_string(),
        }
    }

    /// Banner, question line, then the raw body.
    pub fn render(&self) -> String {
        format!("{}\n\nQuestion: {}\n\n{}", self.banner(), self.question, self.body)
    }
}
