use extract::EntityLabelMap;
use kgraph::KnowledgeGraph;
use rand::seq::IteratorRandom;

/// Sample up to `n` entities from a document's mapping, for graph
/// exploration surfaces.
pub fn random_entities(mapping: &EntityLabelMap, n: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    mapping
        .entities()
        .map(str::to_string)
        .choose_multiple(&mut rng, n)
}

/// The `n` highest-degree nodes with their undirected degree, ties broken
/// by name for stable output.
pub fn top_degree_entities(graph: &KnowledgeGraph, n: usize) -> Vec<(String, usize)> {
    let mut degrees: Vec<(String, usize)> = graph
        .nodes()
        .map(|node| (node.id.clone(), graph.degree(&node.id)))
        .collect();
    degrees.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    degrees.truncate(n);
    degrees
}
