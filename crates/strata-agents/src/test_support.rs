//! Scripted collaborators for exercising the pipeline without network access.
//!
//! `ScriptedModel` answers query-generation prompts with a fixed JSON query
//! list and every other prompt with canned text that echoes the question
//! found under `USER QUESTION:`, so the question can be traced through to
//! the final report.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use strata_models::{Artifact, ArtifactKind, ChatMessage, SearchRecord};
use strata_store::{ArtifactStore, StoreError};

use crate::context::Collaborators;
use crate::error::AgentError;
use crate::llm::LanguageModel;
use crate::search::SearchProvider;

const QUERY_SYSTEM_MARKER: &str = "generates search queries";

pub const DEFAULT_QUERY_RESPONSE: &str = r#"```json
{
    "queries": [
        "vietnam banking sector outlook",
        "VCB BID CTG valuation 2025",
        "state bank of vietnam credit growth"
    ]
}
```"#;

pub struct ScriptedModel {
    query_response: String,
    fail_markers: Vec<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            query_response: DEFAULT_QUERY_RESPONSE.to_string(),
            fail_markers: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the answer given to query-generation prompts.
    pub fn with_query_response(mut self, raw: impl Into<String>) -> Self {
        self.query_response = raw.into();
        self
    }

    /// Fail any call whose messages contain `marker`.
    pub fn failing_when(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }

    /// Calls whose user prompt contains `needle`.
    pub fn calls_containing(&self, needle: &str) -> Vec<Vec<ChatMessage>> {
        self.calls()
            .into_iter()
            .filter(|messages| messages.iter().any(|m| m.content.contains(needle)))
            .collect()
    }
}

fn echoed_question(messages: &[ChatMessage]) -> Option<String> {
    messages.iter().find_map(|message| {
        let mut lines = message.content.lines();
        lines.find(|line| line.trim() == "USER QUESTION:")?;
        lines.next().map(|line| line.trim().to_string())
    })
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        for marker in &self.fail_markers {
            if messages.iter().any(|m| m.content.contains(marker.as_str())) {
                return Err(AgentError::Model(format!("scripted failure on '{marker}'")));
            }
        }

        if messages.iter().any(|m| m.content.contains(QUERY_SYSTEM_MARKER)) {
            return Ok(self.query_response.clone());
        }

        Ok(match echoed_question(messages) {
            Some(question) => format!("Canned analysis addressing: {question}"),
            None => "Canned review text.".to_string(),
        })
    }
}

/// Returns the same records for every query and remembers what was asked.
pub struct StaticSearch {
    records: Vec<SearchRecord>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new(records: Vec<SearchRecord>) -> Self {
        Self {
            records,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn single() -> Self {
        Self::new(vec![SearchRecord::new(
            "Vietnam banks post record profits",
            "https://example.vn/banks",
            "Listed lenders grew earnings 15% year on year.",
        )])
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>, AgentError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        Ok(self.records.clone())
    }
}

/// Fails every query, or only queries containing a marker.
pub struct FailingSearch {
    marker: Option<String>,
    calls: AtomicUsize,
}

impl FailingSearch {
    pub fn always() -> Self {
        Self {
            marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn when_query_contains(marker: impl Into<String>) -> Self {
        Self {
            marker: Some(marker.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.marker {
            Some(marker) if !query.contains(marker.as_str()) => {
                Ok(vec![SearchRecord::new(query, "https://example.vn", "ok")])
            }
            _ => Err(AgentError::Search("search backend unavailable".to_string())),
        }
    }
}

/// Artifact store that keeps everything in memory.
#[derive(Default)]
pub struct RecordingStore {
    artifacts: Mutex<Vec<Artifact>>,
    fail: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails.
    pub fn failing() -> Self {
        Self {
            artifacts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn count_of(&self, kind: ArtifactKind) -> usize {
        self.artifacts().iter().filter(|a| a.kind == kind).count()
    }
}

impl ArtifactStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    fn persist(&self, artifact: &Artifact) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.artifacts
            .lock()
            .map_err(|_| StoreError::Unavailable("poisoned".to_string()))?
            .push(artifact.clone());
        Ok(())
    }
}

pub fn collaborators(
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    store: Arc<dyn ArtifactStore>,
) -> Collaborators {
    Collaborators {
        model,
        search,
        store,
    }
}
