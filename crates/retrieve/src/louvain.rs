use std::collections::HashMap;

use kgraph::KnowledgeGraph;
use tracing::debug;

const MAX_ITERATIONS: usize = 10;

/// Weighted undirected projection of the graph as adjacency lists, plus the
/// per-node degrees and total edge weight.
struct Adjacency {
    names: Vec<String>,
    adj: Vec<HashMap<usize, f64>>,
    degrees: Vec<f64>,
    /// Total undirected edge weight (each edge counted once).
    m: f64,
}

fn build_adjacency(graph: &KnowledgeGraph) -> Adjacency {
    let names: Vec<String> = graph.nodes().map(|n| n.id.clone()).collect();
    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let n = names.len();
    let mut adj: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n];
    let mut m = 0.0;

    for (source, target, data) in graph.edges() {
        let (s, t) = (index[source], index[target]);
        *adj[s].entry(t).or_insert(0.0) += data.weight;
        *adj[t].entry(s).or_insert(0.0) += data.weight;
        m += data.weight;
    }

    let degrees: Vec<f64> = adj.iter().map(|neighbors| neighbors.values().sum()).collect();

    Adjacency {
        names,
        adj,
        degrees,
        m,
    }
}

/// Modularity-maximizing partition of the undirected projection. Local-move
/// sweeps until no node improves or the iteration cap is hit; community ids
/// are renumbered contiguous from 0.
pub fn detect_communities(graph: &KnowledgeGraph) -> HashMap<String, usize> {
    let adjacency = build_adjacency(graph);
    let n = adjacency.names.len();
    if n == 0 || adjacency.m == 0.0 {
        return adjacency
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
    }

    let m = adjacency.m;
    let mut communities: Vec<usize> = (0..n).collect();
    // Running sum of member degrees per community id.
    let mut sigma_tot: Vec<f64> = adjacency.degrees.clone();

    let mut improved = true;
    let mut iteration = 0;

    while improved && iteration < MAX_ITERATIONS {
        improved = false;
        iteration += 1;

        for node in 0..n {
            let current = communities[node];
            let k_i = adjacency.degrees[node];

            // Weight from this node into each neighboring community.
            let mut links: HashMap<usize, f64> = HashMap::new();
            for (&neighbor, &weight) in &adjacency.adj[node] {
                if neighbor != node {
                    *links.entry(communities[neighbor]).or_insert(0.0) += weight;
                }
            }
            let k_i_current = links.get(&current).copied().unwrap_or(0.0);

            let mut best_comm = current;
            let mut best_gain = 0.0;
            for (&comm, &k_i_to) in &links {
                if comm == current {
                    continue;
                }
                let gain = (k_i_to - k_i_current) / m
                    - k_i * (sigma_tot[comm] - (sigma_tot[current] - k_i)) / (2.0 * m * m);
                if gain > best_gain {
                    best_gain = gain;
                    best_comm = comm;
                }
            }

            if best_comm != current {
                sigma_tot[current] -= k_i;
                sigma_tot[best_comm] += k_i;
                communities[node] = best_comm;
                improved = true;
            }
        }
    }

    // Renumber to contiguous ids in node order.
    let mut renumber: HashMap<usize, usize> = HashMap::new();
    let mut result = HashMap::new();
    for (idx, name) in adjacency.names.iter().enumerate() {
        let next_id = renumber.len();
        let id = *renumber.entry(communities[idx]).or_insert(next_id);
        result.insert(name.clone(), id);
    }

    debug!(
        nodes = n,
        communities = renumber.len(),
        iterations = iteration,
        "community detection finished"
    );
    result
}

/// Modularity of a partition over the graph's undirected projection.
pub fn modularity(graph: &KnowledgeGraph, partition: &HashMap<String, usize>) -> f64 {
    let adjacency = build_adjacency(graph);
    if adjacency.m == 0.0 {
        return 0.0;
    }
    let two_m = 2.0 * adjacency.m;

    let mut intra: HashMap<usize, f64> = HashMap::new();
    let mut totals: HashMap<usize, f64> = HashMap::new();

    for (idx, name) in adjacency.names.iter().enumerate() {
        let Some(&comm) = partition.get(name) else {
            continue;
        };
        *totals.entry(comm).or_insert(0.0) += adjacency.degrees[idx];
        for (&neighbor, &weight) in &adjacency.adj[idx] {
            if partition.get(&adjacency.names[neighbor]) == Some(&comm) {
                *intra.entry(comm).or_insert(0.0) += weight;
            }
        }
    }

    let mut q = 0.0;
    for (comm, total) in &totals {
        let within = intra.get(comm).copied().unwrap_or(0.0);
        q += within / two_m - (total / two_m).powi(2);
    }
    q
}
