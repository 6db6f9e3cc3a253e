use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use extract::{prompt, LlmAgent, PipelineConfig};
use manager::{CacheConfig, KgService, ServiceConfig, UpdateStatus};
use segment::SplitterConfig;
use store::{MemoryStore, MemoryVectorIndex, VectorIndex};

/// Two sentences that split into two chunks under the test budget, each with
/// a distinct marker word the scripted agent keys on.
const TEXT_V1: &str = "The alpha system anchors the beta subsystem cleanly. \
                       Gamma maintains the entire pipeline stack daily.";

const APPENDED: &str = " Delta powers the main cluster overnight.";

struct ScriptedAgent {
    entity_calls: AtomicUsize,
}

impl ScriptedAgent {
    fn new() -> Self {
        Self {
            entity_calls: AtomicUsize::new(0),
        }
    }
}

impl LlmAgent for ScriptedAgent {
    async fn generate(&self, prompt_text: &str, input: &str) -> Result<String> {
        if prompt_text == prompt::ENTITY_EXTRACTION {
            self.entity_calls.fetch_add(1, Ordering::SeqCst);
            if input.contains("Delta") {
                return Ok(json!({"entities": [["Delta", "System"]]}).to_string());
            }
            if input.contains("alpha") {
                return Ok(json!({"entities": [["Alpha", "System"], ["Beta", "Subsystem"]]}).to_string());
            }
            return Ok(json!({"entities": [["Gamma", "Person"]]}).to_string());
        }

        if prompt_text == prompt::ENTITY_LINKING {
            return Ok(json!({"entities": ["Alpha"]}).to_string());
        }

        // Relation extraction, keyed on the entity list in the input.
        if input.contains("Delta") {
            return Ok(json!({"relations": [
                {"source": "Delta", "target": "Alpha", "relation": "powers", "context": "delta chunk", "weight": 0.8}
            ]})
            .to_string());
        }
        if input.contains("Alpha") {
            return Ok(json!({"relations": [
                {"source": "Alpha", "target": "Beta", "relation": "anchors", "context": "alpha chunk", "weight": 0.9}
            ]})
            .to_string());
        }
        if input.contains("Gamma") {
            return Ok(json!({"relations": [
                {"source": "Gamma", "target": "Alpha", "relation": "maintains", "context": "gamma chunk", "weight": 0.6}
            ]})
            .to_string());
        }
        Ok(json!({"relations": []}).to_string())
    }
}

struct Harness {
    agent: Arc<ScriptedAgent>,
    index: Arc<MemoryVectorIndex>,
    service: KgService<ScriptedAgent, MemoryStore, MemoryVectorIndex>,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let agent = Arc::new(ScriptedAgent::new());
    let index = Arc::new(MemoryVectorIndex::new());
    let config = ServiceConfig {
        splitter: SplitterConfig {
            max_tokens: 16,
            min_tokens: 3,
            ..SplitterConfig::default()
        },
        pipeline: PipelineConfig {
            retry_attempts: 1,
            ..PipelineConfig::default()
        },
        // The scripted agent is deterministic; caching would hide the
        // call-count assertions.
        cache: CacheConfig {
            enabled: false,
            max_entries: 0,
        },
        ..ServiceConfig::default()
    };
    let service = KgService::new(
        agent.clone(),
        Arc::new(MemoryStore::new()),
        index.clone(),
        config,
    );
    Harness {
        agent,
        index,
        service,
    }
}

#[tokio::test]
async fn full_document_lifecycle() {
    let h = harness();

    // Build: two chunks, three entities, one relation each.
    let report = h.service.build_document("notes", TEXT_V1, ".md").await.unwrap();
    assert_eq!(report.chunks, 2);
    assert_eq!(report.entities, 3);
    assert_eq!(report.relations, 2);
    assert_eq!(h.agent.entity_calls.load(Ordering::SeqCst), 2);

    let state = h.service.load_document("notes").await.unwrap().unwrap();
    assert_eq!(state.original_file_type, ".md");
    assert_eq!(state.records.len(), state.chunks.len());
    assert_eq!(state.graph.edge("Alpha", "Beta").unwrap().weight, 0.9);
    assert_eq!(state.graph.node("Alpha").unwrap().group, "System");

    let listed = h.service.list_documents().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].file, "notes");
    assert_eq!(listed[0].chunk_count, 2);

    // Identical content: short-circuit, no extraction.
    let update = h.service.update_document("notes", TEXT_V1).await.unwrap();
    assert_eq!(update.status, UpdateStatus::Unchanged);
    assert_eq!(h.agent.entity_calls.load(Ordering::SeqCst), 2);

    // Appended content: only the new chunk is extracted.
    let extended = format!("{}{}", TEXT_V1, APPENDED);
    let update = h.service.update_document("notes", &extended).await.unwrap();
    assert_eq!(update.status, UpdateStatus::Updated);
    assert!(update.deleted.is_empty());
    assert_eq!(update.added.len(), 1);
    assert_eq!(h.agent.entity_calls.load(Ordering::SeqCst), 3);

    let state = h.service.load_document("notes").await.unwrap().unwrap();
    assert_eq!(state.chunks.len(), 3);
    assert_eq!(state.records.len(), 3);
    assert_eq!(state.graph.edge("Delta", "Alpha").unwrap().weight, 0.8);
    // Surviving records kept their relations.
    assert!(state.graph.edge("Alpha", "Beta").is_some());
    assert_eq!(state.mapping.label_of("Delta"), "System");

    // Hybrid query returns graph and vector context.
    let context = h.service.query("notes", "what anchors beta?", 2).await.unwrap().unwrap();
    assert_eq!(context.entities, vec!["Alpha".to_string()]);
    assert!(!context.graph_context.is_empty());
    assert!(!context.vector_context.is_empty());
    assert!(context.graph_context.iter().any(|l| l.contains("anchors")));

    // Exploration helpers see the stored state.
    let sampled = h.service.sample_entities("notes", 2).await.unwrap().unwrap();
    assert_eq!(sampled.len(), 2);
    let top = h.service.top_entities("notes", 1).await.unwrap().unwrap();
    assert_eq!(top[0].0, "Alpha");

    // Deletion removes the document everywhere.
    h.service.delete_documents(&["notes".to_string()]).await.unwrap();
    assert!(h.service.list_documents().await.unwrap().is_empty());
    assert!(h.service.load_document("notes").await.unwrap().is_none());
    assert!(h.service.query("notes", "anything", 2).await.unwrap().is_none());
    assert!(h.index.query("notes", "alpha", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_of_missing_document_is_an_error() {
    let h = harness();
    assert!(h.service.update_document("ghost", "text").await.is_err());
}

#[tokio::test]
async fn query_of_missing_document_is_absent() {
    let h = harness();
    assert!(h.service.query("ghost", "question", 3).await.unwrap().is_none());
}

#[tokio::test]
async fn edited_chunk_is_retracted_and_replaced() {
    let h = harness();

    h.service.build_document("notes", TEXT_V1, ".txt").await.unwrap();
    let before = h.service.load_document("notes").await.unwrap().unwrap();

    // Rewrite the gamma sentence; the alpha chunk must survive untouched.
    let edited = "The alpha system anchors the beta subsystem cleanly. \
                  Delta powers the main cluster overnight.";
    let update = h.service.update_document("notes", edited).await.unwrap();
    assert_eq!(update.status, UpdateStatus::Updated);
    assert_eq!(update.deleted.len(), 1);
    assert_eq!(update.added.len(), 1);

    let after = h.service.load_document("notes").await.unwrap().unwrap();
    assert_eq!(after.chunks.len(), 2);
    // The gamma relation went with its chunk, the delta one arrived.
    assert!(after.graph.edge("Gamma", "Alpha").is_none());
    assert!(after.graph.edge("Delta", "Alpha").is_some());
    assert!(after.graph.edge("Alpha", "Beta").is_some());

    // The alpha chunk kept its identity.
    let alpha_chunk = before.chunks.iter().find(|c| c.text.contains("alpha")).unwrap();
    assert!(after.chunks.iter().any(|c| c.block_id == alpha_chunk.block_id));

    // The deleted chunk's vectors were retracted from the index.
    let deleted_bid = &update.deleted[0];
    let hits = h.index.query("notes", "Gamma maintains", 10).await.unwrap();
    assert!(hits.iter().all(|hit| &hit.block_id != deleted_bid));
}
