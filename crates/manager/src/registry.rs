use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::cache::Cache;
use crate::config::CacheConfig;

/// Shared mutable service state with an explicit owner and lifecycle:
/// created at service start, dropped with the service, never process-global.
pub struct Registry {
    cache: Arc<Cache>,
    cache_enabled: bool,
    /// One lock per document id, created on first access. Held across the
    /// whole load→mutate→save sequence of any document mutation.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Registry {
    pub fn new(cache_config: &CacheConfig) -> Self {
        Self {
            cache: Arc::new(Cache::new(cache_config.max_entries)),
            cache_enabled: cache_config.enabled,
            locks: DashMap::new(),
        }
    }

    pub fn llm_cache(&self) -> Option<Arc<Cache>> {
        self.cache_enabled.then(|| self.cache.clone())
    }

    pub fn document_lock(&self, file: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(file.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
