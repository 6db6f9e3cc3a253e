use std::collections::{HashMap, HashSet};

use crate::model::KnowledgeGraph;

/// Structural difference between two graph snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDelta {
    pub added_nodes: Vec<String>,
    pub removed_nodes: Vec<String>,
    pub changed_nodes: Vec<String>,
    pub added_edges: Vec<(String, String)>,
    pub removed_edges: Vec<(String, String)>,
    pub changed_edges: Vec<(String, String)>,
}

impl GraphDelta {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.changed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
            && self.changed_edges.is_empty()
    }
}

/// Compare two snapshots: node/edge presence plus attribute changes on the
/// survivors. Output vectors are sorted for stable reporting.
pub fn compare(old: &KnowledgeGraph, new: &KnowledgeGraph) -> GraphDelta {
    let old_nodes: HashSet<&str> = old.nodes().map(|n| n.id.as_str()).collect();
    let new_nodes: HashSet<&str> = new.nodes().map(|n| n.id.as_str()).collect();

    let mut delta = GraphDelta::default();

    delta.added_nodes = new_nodes.difference(&old_nodes).map(|s| s.to_string()).collect();
    delta.removed_nodes = old_nodes.difference(&new_nodes).map(|s| s.to_string()).collect();
    for id in old_nodes.intersection(&new_nodes) {
        if old.node(id) != new.node(id) {
            delta.changed_nodes.push(id.to_string());
        }
    }

    let old_edges: HashMap<(String, String), _> = old
        .edges()
        .map(|(s, t, data)| ((s.to_string(), t.to_string()), data))
        .collect();
    let new_edges: HashMap<(String, String), _> = new
        .edges()
        .map(|(s, t, data)| ((s.to_string(), t.to_string()), data))
        .collect();

    for key in new_edges.keys() {
        if !old_edges.contains_key(key) {
            delta.added_edges.push(key.clone());
        }
    }
    for (key, old_data) in &old_edges {
        match new_edges.get(key) {
            None => delta.removed_edges.push(key.clone()),
            Some(new_data) => {
                if old_data != new_data {
                    delta.changed_edges.push(key.clone());
                }
            }
        }
    }

    delta.added_nodes.sort();
    delta.removed_nodes.sort();
    delta.changed_nodes.sort();
    delta.added_edges.sort();
    delta.removed_edges.sort();
    delta.changed_edges.sort();
    delta
}
