use extract::{prompt, safe_generate, LlmAgent};
use kgraph::KnowledgeGraph;
use tracing::warn;

/// Ask the LLM which graph entities a question is about. The sentinel (no
/// parsable payload after retries) degrades to an empty seed set; the
/// community retriever treats that as "no context" rather than an error.
pub async fn link_entities<A: LlmAgent>(
    agent: &A,
    graph: &KnowledgeGraph,
    question: &str,
    attempts: usize,
) -> Vec<String> {
    if graph.is_empty() {
        return Vec::new();
    }

    let entities: Vec<String> = graph.nodes().map(|n| n.id.clone()).collect();
    let input = prompt::linking_input(&entities, question);

    match safe_generate(agent, prompt::ENTITY_LINKING, &input, attempts).await {
        Some(payload) => payload
            .get("entities")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_else(|| {
                warn!("entity linking payload had no entities list");
                Vec::new()
            }),
        None => {
            warn!("entity linking failed after retries");
            Vec::new()
        }
    }
}
