use std::collections::HashSet;

use anyhow::{Context, Result};
use dashmap::DashMap;

use segment::Chunk;

use crate::{DocumentMeta, DocumentState, ScoredChunk, StateStore, VectorIndex};

/// In-memory state store for tests and local development. States are held
/// as serialized JSON so every save/load exercises the same round-trip the
/// durable backends do.
#[derive(Default)]
pub struct MemoryStore {
    states: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    async fn save(&self, state: &DocumentState) -> Result<()> {
        let serialized = serde_json::to_string(state).context("Failed to serialize state")?;
        self.states.insert(state.file.clone(), serialized);
        Ok(())
    }

    async fn load(&self, file: &str) -> Result<Option<DocumentState>> {
        match self.states.get(file) {
            Some(entry) => {
                let state = serde_json::from_str(entry.value())
                    .context("Failed to deserialize state")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, files: &[String]) -> Result<()> {
        for file in files {
            self.states.remove(file);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DocumentMeta>> {
        let mut metas = Vec::with_capacity(self.states.len());
        for entry in self.states.iter() {
            let state: DocumentState = serde_json::from_str(entry.value())
                .context("Failed to deserialize state")?;
            metas.push(state.meta());
        }
        metas.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(metas)
    }
}

#[derive(Clone)]
struct StoredChunk {
    block_id: String,
    text: String,
}

/// In-memory vector index scoring by token overlap instead of embeddings.
/// Good enough for tests and offline runs; not a similarity model.
#[derive(Default)]
pub struct MemoryVectorIndex {
    by_file: DashMap<String, Vec<StoredChunk>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn overlap(query: &str, text: &str) -> f32 {
        let q: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let t: HashSet<String> = text.split_whitespace().map(str::to_lowercase).collect();
        if q.is_empty() || t.is_empty() {
            return 0.0;
        }
        let common = q.intersection(&t).count();
        common as f32 / q.len().max(t.len()) as f32
    }
}

impl VectorIndex for MemoryVectorIndex {
    async fn upsert_chunks(
        &self,
        file: &str,
        _original_file_type: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut stored = self.by_file.entry(file.to_string()).or_default();
        for chunk in chunks {
            match stored.iter_mut().find(|s| s.block_id == chunk.block_id) {
                Some(existing) => existing.text = chunk.text.clone(),
                None => stored.push(StoredChunk {
                    block_id: chunk.block_id.clone(),
                    text: chunk.text.clone(),
                }),
            }
        }
        Ok(())
    }

    async fn query(&self, file: &str, text: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let Some(stored) = self.by_file.get(file) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<ScoredChunk> = stored
            .iter()
            .map(|s| ScoredChunk {
                block_id: s.block_id.clone(),
                text: s.text.clone(),
                score: Self::overlap(text, &s.text),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_chunks(&self, file: &str, block_ids: &[String]) -> Result<()> {
        if let Some(mut stored) = self.by_file.get_mut(file) {
            stored.retain(|s| !block_ids.contains(&s.block_id));
        }
        Ok(())
    }

    async fn delete_files(&self, files: &[String]) -> Result<()> {
        for file in files {
            self.by_file.remove(file);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{EntityLabelMap, Relation, TripletRecord};
    use kgraph::{build_graph, KnowledgeGraph};

    fn sample_state(file: &str) -> DocumentState {
        let chunks = vec![Chunk::new(Some(file), 1, "贝叶斯 underpins 概率 theory.".to_string())];
        let records = vec![TripletRecord {
            bid: chunks[0].block_id.clone(),
            relations: vec![Relation {
                source: "贝叶斯".to_string(),
                target: "概率".to_string(),
                relation: "underpins".to_string(),
                context: "ctx".to_string(),
                weight: 0.8,
            }],
        }];
        let mapping = EntityLabelMap::from_pairs([
            ("贝叶斯".to_string(), "Theory".to_string()),
            ("概率".to_string(), "Concept".to_string()),
        ]);
        let graph = build_graph(&records, &mapping);
        DocumentState {
            file: file.to_string(),
            original_file_type: ".md".to_string(),
            chunks,
            records,
            mapping,
            graph,
        }
    }

    #[tokio::test]
    async fn save_load_round_trips_the_graph_exactly() {
        let store = MemoryStore::new();
        let state = sample_state("notes");
        store.save(&state).await.unwrap();

        let loaded = store.load("notes").await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.graph.edge("贝叶斯", "概率").unwrap().weight, 0.8);
    }

    #[tokio::test]
    async fn missing_document_is_absent_not_an_error() {
        let store = MemoryStore::new();
        assert!(store.load("nothing-here").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_from_list_and_load() {
        let store = MemoryStore::new();
        store.save(&sample_state("a")).await.unwrap();
        store.save(&sample_state("b")).await.unwrap();

        store.delete(&["a".to_string()]).await.unwrap();

        let listed: Vec<String> = store.list().await.unwrap().into_iter().map(|m| m.file).collect();
        assert_eq!(listed, vec!["b".to_string()]);
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_graph_survives_round_trip() {
        let store = MemoryStore::new();
        let mut state = sample_state("empty");
        state.records.clear();
        state.graph = KnowledgeGraph::new();
        store.save(&state).await.unwrap();

        let loaded = store.load("empty").await.unwrap().unwrap();
        assert!(loaded.graph.is_empty());
    }

    #[tokio::test]
    async fn vector_index_filters_by_file_and_deletes() {
        let index = MemoryVectorIndex::new();
        let a_chunks = vec![
            Chunk::new(Some("a"), 1, "rust borrow checker ownership".to_string()),
            Chunk::new(Some("a"), 2, "tokio async runtime tasks".to_string()),
        ];
        index.upsert_chunks("a", ".txt", &a_chunks).await.unwrap();
        index
            .upsert_chunks("b", ".txt", &[Chunk::new(Some("b"), 1, "unrelated cooking recipe".to_string())])
            .await
            .unwrap();

        let hits = index.query("a", "borrow checker", 5).await.unwrap();
        assert_eq!(hits[0].block_id, a_chunks[0].block_id);
        assert!(hits.iter().all(|h| h.block_id.starts_with("a_")));

        index
            .delete_chunks("a", &[a_chunks[0].block_id.clone()])
            .await
            .unwrap();
        let hits = index.query("a", "borrow checker", 5).await.unwrap();
        assert!(hits.iter().all(|h| h.block_id != a_chunks[0].block_id));

        index.delete_files(&["a".to_string()]).await.unwrap();
        assert!(index.query("a", "anything", 5).await.unwrap().is_empty());
    }
}
