use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use extract::{extract_json_payload, LlmAgent};

/// Content-addressed LLM response cache. Owned by the service registry, not
/// process-global.
pub struct Cache {
    responses: DashMap<String, String>,
    max_entries: usize,
}

impl Cache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            responses: DashMap::new(),
            max_entries,
        }
    }

    pub fn get_response(&self, key: &str) -> Option<String> {
        self.responses.get(&hash_key(key)).map(|r| r.value().clone())
    }

    pub fn set_response(&self, key: &str, response: String) {
        if self.responses.len() >= self.max_entries {
            // Simple eviction: drop a quarter of the entries when full.
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take(self.max_entries / 4)
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(hash_key(key), response);
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn clear(&self) {
        self.responses.clear();
    }
}

fn hash_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Agent wrapper that serves repeated prompts from the cache. Only outputs
/// carrying a parsable JSON payload are cached, so transient garbage never
/// becomes sticky across the retry loop.
pub struct CachedAgent<A> {
    inner: Arc<A>,
    cache: Option<Arc<Cache>>,
}

impl<A> CachedAgent<A> {
    pub fn new(inner: Arc<A>, cache: Option<Arc<Cache>>) -> Self {
        Self { inner, cache }
    }
}

impl<A: LlmAgent> LlmAgent for CachedAgent<A> {
    async fn generate(&self, prompt: &str, input: &str) -> Result<String> {
        let Some(cache) = &self.cache else {
            return self.inner.generate(prompt, input).await;
        };

        let key = format!("{}\u{1f}{}", prompt, input);
        if let Some(hit) = cache.get_response(&key) {
            return Ok(hit);
        }

        let output = self.inner.generate(prompt, input).await?;
        if extract_json_payload(&output).is_some() {
            cache.set_response(&key, output.clone());
        }
        Ok(output)
    }
}
