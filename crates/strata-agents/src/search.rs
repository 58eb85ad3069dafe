//! Web search collaborators.
//!
//! Every provider returns at most `max_results` records per query.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use strata_models::{SearchConfig, SearchProviderKind, SearchRecord};
use strata_store::SearchCache;
use tracing::debug;

use crate::error::AgentError;

const DUCKDUCKGO_ENDPOINT: &str = "https://api.duckduckgo.com/";
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const USER_AGENT: &str = concat!("strata/", env!("CARGO_PKG_VERSION"));

/// Trait for pluggable search providers. Mockable for testing.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>, AgentError>;
}

fn http_client(timeout: Duration) -> Result<Client, AgentError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// DuckDuckGo instant-answer API. Keyless, but sparse.
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize, timeout: Duration) -> Result<Self, AgentError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: DUCKDUCKGO_ENDPOINT.to_string(),
            max_results,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>, AgentError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Search(format!(
                "DuckDuckGo returned {}",
                status.as_u16()
            )));
        }

        let data: Value = response.json().await?;
        let mut records = Vec::new();

        let abstract_text = str_field(&data, "AbstractText");
        if !abstract_text.is_empty() {
            records.push(SearchRecord::new(
                str_field(&data, "Heading"),
                str_field(&data, "AbstractURL"),
                abstract_text,
            ));
        }

        if let Some(topics) = data.get("RelatedTopics").and_then(Value::as_array) {
            for topic in topics {
                let text = str_field(topic, "Text");
                if text.is_empty() {
                    continue;
                }
                records.push(SearchRecord::new(
                    text.chars().take(80).collect::<String>(),
                    str_field(topic, "FirstURL"),
                    text,
                ));
            }
        }

        records.truncate(self.max_results);
        Ok(records)
    }
}

/// Tavily search API. Requires an API key.
pub struct TavilySearch {
    client: Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(
        api_key: impl Into<String>,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: TAVILY_ENDPOINT.to_string(),
            api_key: api_key.into(),
            max_results,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>, AgentError> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
            "include_answer": false,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(AgentError::Search(format!(
                "Tavily returned {}: {}",
                status.as_u16(),
                err_body
            )));
        }

        let data: Value = response.json().await?;
        let mut records: Vec<SearchRecord> = data
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        SearchRecord::new(
                            str_field(item, "title"),
                            str_field(item, "url"),
                            str_field(item, "content"),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        records.truncate(self.max_results);
        Ok(records)
    }
}

/// Memoizes successful results of an inner provider. Failures are not cached.
pub struct CachedSearch {
    inner: Arc<dyn SearchProvider>,
    cache: SearchCache,
}

impl CachedSearch {
    pub fn new(inner: Arc<dyn SearchProvider>, cache: SearchCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl SearchProvider for CachedSearch {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchRecord>, AgentError> {
        if let Some(hit) = self.cache.get(query).await {
            debug!(query = %query, "Search cache hit");
            return Ok(hit.as_ref().clone());
        }

        let records = self.inner.search(query).await?;
        self.cache.insert(query, records.clone()).await;
        Ok(records)
    }
}

/// Build the configured provider, wrapped in a cache when a TTL is set.
pub fn build_search_provider(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>, AgentError> {
    let timeout = Duration::from_secs(config.timeout_seconds.max(1));

    let provider: Arc<dyn SearchProvider> = match config.provider {
        SearchProviderKind::DuckDuckGo => Arc::new(DuckDuckGoSearch::new(config.max_results, timeout)?),
        SearchProviderKind::Tavily => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    AgentError::Config(format!(
                        "Tavily requires an API key in {}",
                        config.api_key_env
                    ))
                })?;
            Arc::new(TavilySearch::new(api_key, config.max_results, timeout)?)
        }
    };

    if config.cache_ttl_seconds == 0 {
        return Ok(provider);
    }

    let cache = SearchCache::new(
        config.cache_capacity,
        Duration::from_secs(config.cache_ttl_seconds),
    );
    Ok(Arc::new(CachedSearch::new(provider, cache)))
}
