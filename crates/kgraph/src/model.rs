use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use extract::UNKNOWN_LABEL;

/// Node attributes. `title` and `group` both carry the entity's semantic
/// label, fixed at graph-build time from the entity-label mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    pub title: String,
    pub group: String,
}

/// Edge attributes: relation text, supporting context, numeric weight and
/// the weight-derived presentation width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub label: String,
    pub title: String,
    pub weight: f64,
    pub width: f64,
}

impl EdgeData {
    pub fn new(label: String, title: String, weight: f64) -> Self {
        Self {
            label,
            title,
            weight,
            width: 1.0 + weight * 3.0,
        }
    }
}

/// Directed attributed knowledge-graph snapshot. Simple graph: upserting an
/// edge for an ordered pair that already exists overwrites its attributes
/// instead of accumulating parallel edges. Serializes to a node-link JSON
/// form that round-trips nodes, edges and attributes exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "NodeLinkData", into = "NodeLinkData")]
pub struct KnowledgeGraph {
    graph: DiGraph<NodeData, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_node(&mut self, id: &str, label: &str) -> NodeIndex {
        match self.index.get(id) {
            Some(&idx) => {
                let node = &mut self.graph[idx];
                node.title = label.to_string();
                node.group = label.to_string();
                idx
            }
            None => {
                let idx = self.graph.add_node(NodeData {
                    id: id.to_string(),
                    title: label.to_string(),
                    group: label.to_string(),
                });
                self.index.insert(id.to_string(), idx);
                idx
            }
        }
    }

    /// Endpoints missing from the graph are created with the unknown-label
    /// sentinel so every edge always references labeled nodes.
    pub fn upsert_edge(&mut self, source: &str, target: &str, data: EdgeData) {
        let s = match self.index.get(source) {
            Some(&idx) => idx,
            None => self.upsert_node(source, UNKNOWN_LABEL),
        };
        let t = match self.index.get(target) {
            Some(&idx) => idx,
            None => self.upsert_node(target, UNKNOWN_LABEL),
        };
        self.graph.update_edge(s, t, data);
    }

    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&EdgeData> {
        let s = *self.index.get(source)?;
        let t = *self.index.get(target)?;
        let edge = self.graph.find_edge(s, t)?;
        self.graph.edge_weight(edge)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.graph.node_weights()
    }

    /// Directed edges as `(source id, target id, attributes)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &EdgeData)> {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].id.as_str(),
                self.graph[edge.target()].id.as_str(),
                edge.weight(),
            )
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Undirected degree: in-edges plus out-edges.
    pub fn degree(&self, id: &str) -> usize {
        match self.index.get(id) {
            Some(&idx) => {
                self.graph
                    .edges_directed(idx, petgraph::Direction::Outgoing)
                    .count()
                    + self
                        .graph
                        .edges_directed(idx, petgraph::Direction::Incoming)
                        .count()
            }
            None => 0,
        }
    }

    fn sorted_nodes(&self) -> Vec<&NodeData> {
        let mut nodes: Vec<&NodeData> = self.nodes().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    fn sorted_edges(&self) -> Vec<(&str, &str, &EdgeData)> {
        let mut edges: Vec<_> = self.edges().collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        edges
    }
}

/// Structural equality over node and edge sets, independent of insertion
/// order.
impl PartialEq for KnowledgeGraph {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_nodes() == other.sorted_nodes() && self.sorted_edges() == other.sorted_edges()
    }
}

/// Node-link serialization form.
#[derive(Clone, Serialize, Deserialize)]
pub struct NodeLinkData {
    pub directed: bool,
    pub nodes: Vec<NodeData>,
    pub links: Vec<LinkRecord>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: String,
    pub target: String,
    pub label: String,
    pub title: String,
    pub weight: f64,
    pub width: f64,
}

impl From<KnowledgeGraph> for NodeLinkData {
    fn from(graph: KnowledgeGraph) -> Self {
        let nodes: Vec<NodeData> = graph.nodes().cloned().collect();
        let links: Vec<LinkRecord> = graph
            .edges()
            .map(|(source, target, data)| LinkRecord {
                source: source.to_string(),
                target: target.to_string(),
                label: data.label.clone(),
                title: data.title.clone(),
                weight: data.weight,
                width: data.width,
            })
            .collect();
        Self {
            directed: true,
            nodes,
            links,
        }
    }
}

impl From<NodeLinkData> for KnowledgeGraph {
    fn from(data: NodeLinkData) -> Self {
        let mut graph = KnowledgeGraph::new();
        for node in &data.nodes {
            graph.upsert_node(&node.id, &node.title);
        }
        for link in data.links {
            graph.upsert_edge(
                &link.source,
                &link.target,
                EdgeData {
                    label: link.label,
                    title: link.title,
                    weight: link.weight,
                    width: link.width,
                },
            );
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_node("贝叶斯", "Theory");
        graph.upsert_node("概率", "Concept");
        graph.upsert_edge(
            "贝叶斯",
            "概率",
            EdgeData::new("underpins".to_string(), "ctx".to_string(), 0.8),
        );
        graph
    }

    #[test]
    fn upsert_edge_overwrites_same_ordered_pair() {
        let mut graph = sample();
        graph.upsert_edge(
            "贝叶斯",
            "概率",
            EdgeData::new("rewritten".to_string(), "ctx2".to_string(), 0.4),
        );
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edge("贝叶斯", "概率").unwrap();
        assert_eq!(edge.label, "rewritten");
        assert_eq!(edge.weight, 0.4);
    }

    #[test]
    fn edge_with_unseen_endpoint_creates_sentinel_node() {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge(
            "A",
            "B",
            EdgeData::new("r".to_string(), "c".to_string(), 0.5),
        );
        assert_eq!(graph.node("A").unwrap().group, UNKNOWN_LABEL);
    }

    #[test]
    fn node_link_round_trip_is_exact() {
        let graph = sample();
        let json = serde_json::to_string(&graph).unwrap();
        let back: KnowledgeGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, back);
        assert_eq!(back.node("贝叶斯").unwrap().title, "Theory");
        assert_eq!(back.edge("贝叶斯", "概率").unwrap().width, 1.0 + 0.8 * 3.0);
    }

    #[test]
    fn width_scales_with_weight() {
        let strong = EdgeData::new("r".to_string(), "c".to_string(), 0.9);
        let weak = EdgeData::new("r".to_string(), "c".to_string(), 0.1);
        assert!(strong.width > weak.width);
    }
}
