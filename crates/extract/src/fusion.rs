use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::{safe_generate, LlmAgent};
use crate::prompt;
use crate::schema::{parse_relations, Relation, TripletRecord};

#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub enabled: bool,
    pub retry_attempts: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retry_attempts: 3,
        }
    }
}

/// Reconciles the relations extracted for the same unordered entity pair
/// across chunks. One LLM call per ambiguous pair, so the pass is optional;
/// disabled it is the identity and the graph is merely unfused.
pub struct KnowledgeFusion<A: LlmAgent> {
    agent: Arc<A>,
    config: FusionConfig,
}

/// Unordered pair key: (source, target) and (target, source) collapse.
fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl<A: LlmAgent> KnowledgeFusion<A> {
    pub fn new(agent: Arc<A>, config: FusionConfig) -> Self {
        Self { agent, config }
    }

    pub async fn fuse(&self, records: Vec<TripletRecord>) -> Vec<TripletRecord> {
        if !self.config.enabled {
            return records;
        }

        // Collect every relation per unordered entity pair across chunks.
        let mut pairs: BTreeMap<(String, String), Vec<Relation>> = BTreeMap::new();
        for record in &records {
            for relation in &record.relations {
                pairs
                    .entry(pair_key(&relation.source, &relation.target))
                    .or_default()
                    .push(relation.clone());
            }
        }

        // One reconciliation call per pair that actually conflicts.
        let mut fused: BTreeMap<(String, String), Vec<Relation>> = BTreeMap::new();
        for (key, relations) in &pairs {
            if relations.len() < 2 {
                continue;
            }
            let refs: Vec<&Relation> = relations.iter().collect();
            let input = prompt::fusion_input(&key.0, &key.1, &refs);
            let payload =
                safe_generate(&*self.agent, prompt::KNOWLEDGE_FUSION, &input, self.config.retry_attempts)
                    .await;

            match payload.as_ref().and_then(parse_relations) {
                Some(reconciled) if !reconciled.is_empty() => {
                    debug!(
                        pair = ?key,
                        before = relations.len(),
                        after = reconciled.len(),
                        "fused entity pair"
                    );
                    fused.insert(key.clone(), reconciled);
                }
                _ => {
                    warn!(pair = ?key, "fusion output malformed, keeping original relations");
                }
            }
        }

        if fused.is_empty() {
            return records;
        }

        // Every contributing chunk gets the fused set for that pair, once;
        // relations of untouched pairs stay in place.
        records
            .into_iter()
            .map(|record| {
                let mut seen: HashSet<(String, String)> = HashSet::new();
                let mut relations = Vec::new();
                for relation in record.relations {
                    let key = pair_key(&relation.source, &relation.target);
                    match fused.get(&key) {
                        Some(reconciled) => {
                            if seen.insert(key) {
                                relations.extend(reconciled.iter().cloned());
                            }
                        }
                        None => relations.push(relation),
                    }
                }
                TripletRecord {
                    bid: record.bid,
                    relations,
                }
            })
            .collect()
    }
}
