pub mod cache;
pub mod config;
pub mod registry;

pub use cache::{Cache, CachedAgent};
pub use config::{CacheConfig, ServiceConfig};
pub use registry::Registry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use extract::{Extractor, KnowledgeFusion, LlmAgent};
use kgraph::{build_graph, compare, Differ, SubstringDiffer};
use retrieve::{HybridContext, HybridRetriever};
use segment::{generate_doc_id, SentenceEncoder, Splitter};
use store::{DocumentMeta, DocumentState, StateStore, VectorIndex};

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub file: String,
    pub chunks: usize,
    pub entities: usize,
    pub relations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Content identical after normalization: nothing extracted, rebuilt or
    /// saved.
    Unchanged,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    pub status: UpdateStatus,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

/// Coordinating component over the whole document lifecycle: split →
/// extract → fuse → build graph → persist, plus incremental update, hybrid
/// retrieval and deletion. All collaborators arrive at construction; the
/// registry owns the per-document locks and the LLM cache.
///
/// Mutations to one document are serialized through its lock. Retrieval
/// reads take no lock and tolerate racing a save (stale read, never a
/// corrupt one).
pub struct KgService<A: LlmAgent, S: StateStore, V: VectorIndex> {
    splitter: Splitter,
    extractor: Extractor<CachedAgent<A>>,
    fusion: KnowledgeFusion<CachedAgent<A>>,
    retriever: HybridRetriever<CachedAgent<A>>,
    differ: SubstringDiffer,
    store: Arc<S>,
    index: Arc<V>,
    registry: Registry,
}

impl<A: LlmAgent, S: StateStore, V: VectorIndex> KgService<A, S, V> {
    pub fn new(agent: Arc<A>, store: Arc<S>, index: Arc<V>, config: ServiceConfig) -> Self {
        let registry = Registry::new(&config.cache);
        let agent = Arc::new(CachedAgent::new(agent, registry.llm_cache()));

        Self {
            splitter: Splitter::new(config.splitter),
            extractor: Extractor::new(agent.clone(), config.pipeline.clone()),
            fusion: KnowledgeFusion::new(agent.clone(), config.fusion),
            retriever: HybridRetriever::new(
                agent,
                config.retrieve,
                config.pipeline.retry_attempts,
            ),
            differ: SubstringDiffer,
            store,
            index,
            registry,
        }
    }

    /// Wire a sentence encoder so segmentation can detect semantic breaks.
    pub fn with_sentence_encoder(mut self, encoder: Arc<dyn SentenceEncoder>) -> Self {
        self.splitter.set_encoder(encoder);
        self
    }

    /// Full construction for a document: segment the text, extract, fuse,
    /// build the graph snapshot and persist everything. Overwrites any
    /// previous state for `file`.
    pub async fn build_document(
        &self,
        file: &str,
        text: &str,
        original_file_type: &str,
    ) -> Result<BuildReport> {
        let lock = self.registry.document_lock(file);
        let _guard = lock.lock().await;

        let doc_id = generate_doc_id(file);
        let chunks = self.splitter.split(text, Some(&doc_id));
        info!(file, chunks = chunks.len(), "building knowledge graph");

        let output = self.extractor.build(&chunks).await;
        let records = self.fusion.fuse(output.records).await;
        let graph = build_graph(&records, &output.mapping);

        let state = DocumentState {
            file: file.to_string(),
            original_file_type: original_file_type.to_string(),
            chunks,
            records,
            mapping: output.mapping,
            graph,
        };
        self.persist(&state).await?;

        Ok(BuildReport {
            file: file.to_string(),
            chunks: state.chunks.len(),
            entities: state.mapping.len(),
            relations: state.records.iter().map(|r| r.relations.len()).sum(),
        })
    }

    /// Incremental update: diff the stored chunks against the new text,
    /// retract what disappeared, extract only what appeared, rebuild the
    /// graph from the merged records and persist. Unchanged content
    /// short-circuits without touching the model or the stores.
    pub async fn update_document(&self, file: &str, new_text: &str) -> Result<UpdateReport> {
        let lock = self.registry.document_lock(file);
        let _guard = lock.lock().await;

        let mut state = self
            .store
            .load(file)
            .await?
            .with_context(|| format!("no stored state for document: {}", file))?;

        let doc_id = generate_doc_id(file);
        let diff = self
            .differ
            .diff(&state.chunks, new_text, &self.splitter, Some(&doc_id));

        if diff.is_unchanged() {
            info!(file, "document content unchanged, skipping update");
            return Ok(UpdateReport {
                status: UpdateStatus::Unchanged,
                added: Vec::new(),
                deleted: Vec::new(),
            });
        }

        let deleted: Vec<String> = diff.deleted.iter().map(|c| c.block_id.clone()).collect();
        let added: Vec<String> = diff.added.iter().map(|c| c.block_id.clone()).collect();
        info!(
            file,
            added = added.len(),
            deleted = deleted.len(),
            "applying incremental update"
        );

        state.chunks.retain(|chunk| !deleted.contains(&chunk.block_id));
        state.records.retain(|record| !deleted.contains(&record.bid));
        self.index.delete_chunks(file, &deleted).await?;

        let output = self.extractor.build(&diff.added).await;
        let new_records = self.fusion.fuse(output.records).await;

        state.chunks.extend(diff.added);
        state.records.extend(new_records);
        // Existing labels win; added chunks only fill gaps.
        state.mapping.merge(&output.mapping);

        let previous_graph = state.graph.clone();
        state.graph = build_graph(&state.records, &state.mapping);
        let delta = compare(&previous_graph, &state.graph);
        debug!(
            file,
            added_nodes = delta.added_nodes.len(),
            removed_nodes = delta.removed_nodes.len(),
            added_edges = delta.added_edges.len(),
            removed_edges = delta.removed_edges.len(),
            "graph delta after update"
        );

        self.persist(&state).await?;

        Ok(UpdateReport {
            status: UpdateStatus::Updated,
            added,
            deleted,
        })
    }

    pub async fn delete_documents(&self, files: &[String]) -> Result<()> {
        for file in files {
            let lock = self.registry.document_lock(file);
            let _guard = lock.lock().await;

            self.index
                .delete_files(std::slice::from_ref(file))
                .await
                .context("Failed to delete chunk vectors")?;
            self.store
                .delete(std::slice::from_ref(file))
                .await
                .context("Failed to delete document state")?;
            info!(file, "document deleted");
        }
        Ok(())
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
        self.store.list().await
    }

    /// `Ok(None)` distinguishes "no such document" from an empty one.
    pub async fn load_document(&self, file: &str) -> Result<Option<DocumentState>> {
        self.store.load(file).await
    }

    /// Hybrid retrieval for a stored document; `Ok(None)` when the document
    /// does not exist.
    pub async fn query(
        &self,
        file: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Option<HybridContext>> {
        let Some(state) = self.store.load(file).await? else {
            return Ok(None);
        };
        let context = self
            .retriever
            .retrieve(&state, &*self.index, question, top_k)
            .await?;
        Ok(Some(context))
    }

    /// Sample entities from a stored document for exploration surfaces.
    pub async fn sample_entities(&self, file: &str, n: usize) -> Result<Option<Vec<String>>> {
        let Some(state) = self.store.load(file).await? else {
            return Ok(None);
        };
        Ok(Some(retrieve::random_entities(&state.mapping, n)))
    }

    /// Highest-degree entities of a stored document's graph.
    pub async fn top_entities(&self, file: &str, n: usize) -> Result<Option<Vec<(String, usize)>>> {
        let Some(state) = self.store.load(file).await? else {
            return Ok(None);
        };
        Ok(Some(retrieve::top_degree_entities(&state.graph, n)))
    }

    async fn persist(&self, state: &DocumentState) -> Result<()> {
        self.index
            .upsert_chunks(&state.file, &state.original_file_type, &state.chunks)
            .await
            .context("Failed to upsert chunk vectors")?;
        self.store
            .save(state)
            .await
            .context("Failed to save document state")?;
        Ok(())
    }
}
