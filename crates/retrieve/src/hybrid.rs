use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use extract::LlmAgent;
use store::{DocumentState, VectorIndex};

use crate::community::{community_context, RetrieveConfig};
use crate::linking::link_entities;

/// Context bundle for downstream answer generation, which stays external.
/// Either side may legitimately be empty; callers must tolerate that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridContext {
    /// Entities the question was linked to.
    pub entities: Vec<String>,
    /// Ranked community edge lines.
    pub graph_context: Vec<String>,
    /// Similar chunk texts from the vector index.
    pub vector_context: Vec<String>,
}

/// Hybrid retrieval: question → entity linking → community edges, plus a
/// per-document vector query. Answer generation consumes the bundle.
pub struct HybridRetriever<A: LlmAgent> {
    agent: Arc<A>,
    config: RetrieveConfig,
    retry_attempts: usize,
}

impl<A: LlmAgent> HybridRetriever<A> {
    pub fn new(agent: Arc<A>, config: RetrieveConfig, retry_attempts: usize) -> Self {
        Self {
            agent,
            config,
            retry_attempts,
        }
    }

    pub async fn retrieve<V: VectorIndex>(
        &self,
        state: &DocumentState,
        index: &V,
        question: &str,
        top_k: usize,
    ) -> Result<HybridContext> {
        let entities =
            link_entities(&*self.agent, &state.graph, question, self.retry_attempts).await;
        let graph_context = community_context(&state.graph, &entities, &self.config);

        let vector_context: Vec<String> = index
            .query(&state.file, question, top_k)
            .await
            .context("Vector query failed")?
            .into_iter()
            .map(|hit| hit.text)
            .collect();

        Ok(HybridContext {
            entities,
            graph_context,
            vector_context,
        })
    }
}
