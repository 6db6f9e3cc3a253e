use std::collections::HashSet;

use kgraph::KnowledgeGraph;
use tracing::debug;

use crate::louvain;

#[derive(Debug, Clone)]
pub struct RetrieveConfig {
    /// Edges below this weight never enter the context.
    pub weight_threshold: f64,
    /// Hard cap on returned context lines.
    pub top_n: usize,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            weight_threshold: 0.3,
            top_n: 20,
        }
    }
}

/// Render the knowledge around the seed entities as context lines: partition
/// the graph into communities, keep the communities any seed touches, then
/// the induced subgraph's edges filtered by weight, strongest first, capped
/// at `top_n`. An empty graph or unmatched seeds yield an empty list.
pub fn community_context(
    graph: &KnowledgeGraph,
    seeds: &[String],
    config: &RetrieveConfig,
) -> Vec<String> {
    if graph.is_empty() || seeds.is_empty() {
        return Vec::new();
    }

    let partition = louvain::detect_communities(graph);

    let seed_communities: HashSet<usize> = seeds
        .iter()
        .filter_map(|seed| partition.get(seed.as_str()).copied())
        .collect();
    if seed_communities.is_empty() {
        debug!("no seed entity matched a community");
        return Vec::new();
    }

    let members: HashSet<&str> = partition
        .iter()
        .filter(|(_, comm)| seed_communities.contains(comm))
        .map(|(name, _)| name.as_str())
        .collect();

    let mut edges: Vec<_> = graph
        .edges()
        .filter(|(source, target, data)| {
            members.contains(source)
                && members.contains(target)
                && data.weight >= config.weight_threshold
        })
        .collect();
    edges.sort_by(|a, b| b.2.weight.total_cmp(&a.2.weight));
    if config.top_n > 0 {
        edges.truncate(config.top_n);
    }

    debug!(
        modularity = louvain::modularity(graph, &partition),
        edges = edges.len(),
        "community context assembled"
    );

    edges
        .into_iter()
        .map(|(source, target, data)| {
            format!(
                "Edge from {} to {}, Relation: {}, context:{}, weight:{}",
                source, target, data.label, data.title, data.weight
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph::EdgeData;

    fn edge(label: &str, weight: f64) -> EdgeData {
        EdgeData::new(label.to_string(), "ctx".to_string(), weight)
    }

    fn seeded(seed: &str) -> Vec<String> {
        vec![seed.to_string()]
    }

    #[test]
    fn weight_threshold_filters_weak_edges() {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge("贝叶斯", "概率", edge("underpins", 0.8));
        graph.upsert_edge("贝叶斯", "统计", edge("relates to", 0.2));

        let lines = community_context(&graph, &seeded("贝叶斯"), &RetrieveConfig::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "Edge from 贝叶斯 to 概率, Relation: underpins, context:ctx, weight:0.8"
        );
    }

    #[test]
    fn output_is_sorted_by_weight_and_capped() {
        let mut graph = KnowledgeGraph::new();
        for i in 0..8 {
            let target = format!("T{}", i);
            graph.upsert_edge("hub", &target, edge("links", 0.4 + i as f64 * 0.05));
        }

        let config = RetrieveConfig {
            weight_threshold: 0.3,
            top_n: 3,
        };
        let lines = community_context(&graph, &seeded("hub"), &config);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("T7"));
        assert!(lines[1].contains("T6"));
        assert!(lines[2].contains("T5"));
    }

    #[test]
    fn every_returned_edge_clears_the_threshold() {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge("A", "B", edge("strong", 0.9));
        graph.upsert_edge("B", "C", edge("medium", 0.31));
        graph.upsert_edge("C", "A", edge("weak", 0.29));

        let lines = community_context(&graph, &seeded("A"), &RetrieveConfig::default());
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.contains("weak")));
    }

    #[test]
    fn empty_graph_and_unmatched_seeds_yield_empty_context() {
        let empty = KnowledgeGraph::new();
        assert!(community_context(&empty, &seeded("A"), &RetrieveConfig::default()).is_empty());

        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge("A", "B", edge("r", 0.8));
        assert!(community_context(&graph, &seeded("missing"), &RetrieveConfig::default()).is_empty());
        assert!(community_context(&graph, &[], &RetrieveConfig::default()).is_empty());
    }

    #[test]
    fn other_communities_stay_out_of_context() {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge("A", "B", edge("cluster one", 1.0));
        graph.upsert_edge("C", "D", edge("cluster two", 1.0));
        graph.upsert_edge("B", "C", edge("bridge", 0.1));

        let lines = community_context(&graph, &seeded("A"), &RetrieveConfig::default());
        assert!(lines.iter().all(|l| !l.contains("cluster two")));
        assert!(lines.iter().any(|l| l.contains("cluster one")));
    }
}
