use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use strata_models::SearchRecord;

/// In-memory cache of search results keyed by normalized query text.
///
/// Experts in different groups often issue the same query; only the
/// first one hits the network. Entries are evicted after the TTL.
#[derive(Clone)]
pub struct SearchCache {
    inner: Cache<String, Arc<Vec<SearchRecord>>>,
}

impl SearchCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, query: &str) -> Option<Arc<Vec<SearchRecord>>> {
        self.inner.get(&normalize(query)).await
    }

    pub async fn insert(&self, query: &str, records: Vec<SearchRecord>) {
        self.inner.insert(normalize(query), Arc::new(records)).await;
    }
}

fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
