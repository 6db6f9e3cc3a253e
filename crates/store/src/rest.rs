use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use segment::Chunk;

use crate::embeddings::EmbeddingClient;
use crate::retry::RetryPolicy;
use crate::{ScoredChunk, VectorIndex};

/// Vector index speaking a Qdrant-style REST API. Points are keyed by a hash
/// of the block id and carry the owning file in their payload so queries and
/// deletes can filter per document.
pub struct RestVectorIndex {
    base_url: String,
    collection: String,
    client: reqwest::Client,
    embedder: EmbeddingClient,
    retry: RetryPolicy,
}

impl RestVectorIndex {
    pub fn new(base_url: String, collection: String, embedder: EmbeddingClient) -> Self {
        Self {
            base_url,
            collection,
            client: reqwest::Client::new(),
            embedder,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create the collection when missing, sized to the embedder's output.
    pub async fn init_collection(&self) -> Result<()> {
        let url = format!("{}/collections", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to list collections: {}", response.status());
        }

        let info: serde_json::Value = response.json().await?;
        let exists = info["result"]["collections"]
            .as_array()
            .map(|collections| {
                collections
                    .iter()
                    .any(|c| c["name"].as_str() == Some(self.collection.as_str()))
            })
            .unwrap_or(false);
        if exists {
            return Ok(());
        }

        let dimension = self.embedder.dimension().await?;
        info!(collection = %self.collection, dimension, "creating vector collection");

        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let body = json!({
            "vectors": {"size": dimension, "distance": "Cosine"}
        });
        let response = self.client.put(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to create collection: {}", error_text);
        }
        Ok(())
    }

    fn point_id(block_id: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        block_id.hash(&mut hasher);
        hasher.finish()
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        self.retry
            .retry("vector_index_post", || async {
                let response = self
                    .client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .context("Failed to reach vector index")?;
                if !response.status().is_success() {
                    let text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Vector index request failed: {}", text);
                }
                response
                    .json::<serde_json::Value>()
                    .await
                    .context("Failed to parse vector index response")
            })
            .await
    }

    fn file_filter(file: &str) -> serde_json::Value {
        json!({
            "must": [{"key": "file", "match": {"value": file}}]
        })
    }
}

impl VectorIndex for RestVectorIndex {
    async fn upsert_chunks(
        &self,
        file: &str,
        original_file_type: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self
                .embedder
                .embed(&chunk.text)
                .await
                .context("Failed to embed chunk")?;
            points.push(json!({
                "id": Self::point_id(&chunk.block_id),
                "vector": vector,
                "payload": {
                    "block_id": chunk.block_id,
                    "file": file,
                    "text": chunk.text,
                    "original_file_type": original_file_type,
                }
            }));
        }

        let url = format!("{}/collections/{}/points", self.base_url, self.collection);
        let body = json!({"points": points});
        self.retry
            .retry("vector_index_upsert", || async {
                let response = self
                    .client
                    .put(&url)
                    .json(&body)
                    .send()
                    .await
                    .context("Failed to reach vector index")?;
                if !response.status().is_success() {
                    let text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Vector upsert failed: {}", text);
                }
                Ok(())
            })
            .await
    }

    async fn query(&self, file: &str, text: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .context("Failed to embed query")?;

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
            "filter": Self::file_filter(file),
        });

        let result = self.post_json(&url, &body).await?;
        let points = result["result"]
            .as_array()
            .context("Invalid vector index response format")?;

        let mut hits = Vec::with_capacity(points.len());
        for point in points {
            let payload = &point["payload"];
            hits.push(ScoredChunk {
                block_id: payload["block_id"].as_str().unwrap_or("").to_string(),
                text: payload["text"].as_str().unwrap_or("").to_string(),
                score: point["score"].as_f64().unwrap_or(0.0) as f32,
            });
        }
        Ok(hits)
    }

    async fn delete_chunks(&self, _file: &str, block_ids: &[String]) -> Result<()> {
        if block_ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<u64> = block_ids.iter().map(|id| Self::point_id(id)).collect();
        let url = format!(
            "{}/collections/{}/points/delete",
            self.base_url, self.collection
        );
        self.post_json(&url, &json!({"points": ids})).await?;
        Ok(())
    }

    async fn delete_files(&self, files: &[String]) -> Result<()> {
        let url = format!(
            "{}/collections/{}/points/delete",
            self.base_url, self.collection
        );
        for file in files {
            self.post_json(&url, &json!({"filter": Self::file_filter(file)}))
                .await?;
        }
        Ok(())
    }
}
