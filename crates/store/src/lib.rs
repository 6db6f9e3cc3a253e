pub mod embeddings;
pub mod memory;
pub mod rest;
pub mod retry;

pub use embeddings::EmbeddingClient;
pub use memory::{MemoryStore, MemoryVectorIndex};
pub use rest::RestVectorIndex;
pub use retry::RetryPolicy;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use extract::{EntityLabelMap, TripletRecord};
use kgraph::KnowledgeGraph;
use segment::Chunk;

/// The persisted aggregate for one document. Owned by exactly one logical
/// document, created on first successful construction, fully overwritten on
/// each incremental update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub file: String,
    pub original_file_type: String,
    pub chunks: Vec<Chunk>,
    pub records: Vec<TripletRecord>,
    pub mapping: EntityLabelMap,
    pub graph: KnowledgeGraph,
}

impl DocumentState {
    pub fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            file: self.file.clone(),
            original_file_type: self.original_file_type.clone(),
            chunk_count: self.chunks.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub file: String,
    pub original_file_type: String,
    pub chunk_count: usize,
}

/// Durable document-state storage, keyed by document identity. A missing
/// document is `Ok(None)`, distinct from an empty one.
#[allow(async_fn_in_trait)]
pub trait StateStore: Send + Sync {
    async fn save(&self, state: &DocumentState) -> Result<()>;
    async fn load(&self, file: &str) -> Result<Option<DocumentState>>;
    async fn delete(&self, files: &[String]) -> Result<()>;
    async fn list(&self) -> Result<Vec<DocumentMeta>>;
}

/// A chunk returned from a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub block_id: String,
    pub text: String,
    pub score: f32,
}

/// Per-chunk vector index, filtered by owning file on every operation.
#[allow(async_fn_in_trait)]
pub trait VectorIndex: Send + Sync {
    async fn upsert_chunks(
        &self,
        file: &str,
        original_file_type: &str,
        chunks: &[Chunk],
    ) -> Result<()>;
    async fn query(&self, file: &str, text: &str, top_k: usize) -> Result<Vec<ScoredChunk>>;
    async fn delete_chunks(&self, file: &str, block_ids: &[String]) -> Result<()>;
    async fn delete_files(&self, files: &[String]) -> Result<()>;
}
