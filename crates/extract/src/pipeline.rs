use std::sync::Arc;

use segment::Chunk;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::agent::{safe_generate, LlmAgent};
use crate::mapping::EntityLabelMap;
use crate::prompt;
use crate::schema::{parse_entities, parse_relations, Relation, TripletRecord};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on in-flight LLM calls across the pipeline.
    pub max_concurrent_llm_calls: usize,
    /// Attempts per call before an extraction step degrades to empty.
    pub retry_attempts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_llm_calls: 3,
            retry_attempts: 3,
        }
    }
}

pub struct PipelineOutput {
    pub records: Vec<TripletRecord>,
    pub mapping: EntityLabelMap,
}

/// Per-chunk entity/relation extraction, software-pipelined at depth 1:
/// entity extraction for chunk i+1 runs while relation extraction for chunk
/// i is in flight. Relation extraction for a chunk always consumes exactly
/// that chunk's entities, and records come out in document order.
pub struct Extractor<A: LlmAgent> {
    agent: Arc<A>,
    semaphore: Arc<Semaphore>,
    config: PipelineConfig,
}

impl<A: LlmAgent> Extractor<A> {
    pub fn new(agent: Arc<A>, config: PipelineConfig) -> Self {
        let permits = config.max_concurrent_llm_calls.max(1);
        Self {
            agent,
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
        }
    }

    /// Extraction failures degrade to empty results per chunk; this never
    /// fails the build as a whole.
    pub async fn build(&self, chunks: &[Chunk]) -> PipelineOutput {
        let mut records = Vec::with_capacity(chunks.len());
        let mut mapping = EntityLabelMap::new();

        if chunks.is_empty() {
            return PipelineOutput { records, mapping };
        }

        let mut pending = self.extract_entities(&chunks[0].text).await;

        for i in 0..chunks.len() {
            let entity_labels = pending;
            pending = Vec::new();

            for (entity, label) in &entity_labels {
                mapping.insert(entity, label);
            }
            // Relation extraction gets entity names, never labels.
            let names: Vec<String> = entity_labels.into_iter().map(|(name, _)| name).collect();

            let relations = if i + 1 < chunks.len() {
                let (relations, next) = tokio::join!(
                    self.extract_relations(&chunks[i].text, &names),
                    self.extract_entities(&chunks[i + 1].text),
                );
                pending = next;
                relations
            } else {
                self.extract_relations(&chunks[i].text, &names).await
            };

            debug!(
                bid = %chunks[i].block_id,
                entities = names.len(),
                relations = relations.len(),
                "chunk extracted"
            );
            records.push(TripletRecord {
                bid: chunks[i].block_id.clone(),
                relations,
            });
        }

        PipelineOutput { records, mapping }
    }

    pub async fn extract_entities(&self, text: &str) -> Vec<(String, String)> {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Vec::new(),
        };
        match safe_generate(&*self.agent, prompt::ENTITY_EXTRACTION, text, self.config.retry_attempts).await {
            Some(payload) => parse_entities(&payload).unwrap_or_else(|| {
                warn!("entity payload had no entities list, treating as empty");
                Vec::new()
            }),
            None => {
                warn!("entity extraction failed after retries, continuing with empty set");
                Vec::new()
            }
        }
    }

    pub async fn extract_relations(&self, text: &str, entities: &[String]) -> Vec<Relation> {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Vec::new(),
        };
        let input = prompt::relation_input(text, entities);
        match safe_generate(&*self.agent, prompt::RELATION_EXTRACTION, &input, self.config.retry_attempts).await {
            Some(payload) => parse_relations(&payload).unwrap_or_else(|| {
                warn!("relation payload had no relations list, treating as empty");
                Vec::new()
            }),
            None => {
                warn!("relation extraction failed after retries, continuing with empty set");
                Vec::new()
            }
        }
    }
}
