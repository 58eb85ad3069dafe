use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid task graph: {0}")]
    Graph(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
