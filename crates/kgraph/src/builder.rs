use tracing::warn;

use extract::{EntityLabelMap, TripletRecord, DEFAULT_WEIGHT};

use crate::model::{EdgeData, KnowledgeGraph};

/// Build a fresh graph snapshot from triplet records. Node labels come from
/// the mapping at build time and are not recomputed later, so label changes
/// require a full rebuild. Rebuilding from the same records yields the same
/// node/edge sets and attributes.
pub fn build_graph(records: &[TripletRecord], mapping: &EntityLabelMap) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new();

    for record in records {
        for relation in &record.relations {
            let weight = if relation.weight.is_finite() {
                relation.weight
            } else {
                warn!(
                    source = %relation.source,
                    target = %relation.target,
                    "relation weight is not a number, using default"
                );
                DEFAULT_WEIGHT
            };

            graph.upsert_node(&relation.source, mapping.label_of(&relation.source));
            graph.upsert_node(&relation.target, mapping.label_of(&relation.target));
            graph.upsert_edge(
                &relation.source,
                &relation.target,
                EdgeData::new(relation.relation.clone(), relation.context.clone(), weight),
            );
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::schema::parse_relations;
    use extract::{Relation, UNKNOWN_LABEL};
    use serde_json::json;

    fn record(bid: &str, relations: Vec<Relation>) -> TripletRecord {
        TripletRecord {
            bid: bid.to_string(),
            relations,
        }
    }

    fn mapping() -> EntityLabelMap {
        EntityLabelMap::from_pairs([
            ("贝叶斯".to_string(), "Theory".to_string()),
            ("概率".to_string(), "Concept".to_string()),
        ])
    }

    #[test]
    fn build_is_idempotent() {
        let records = vec![record(
            "b1",
            vec![Relation {
                source: "贝叶斯".to_string(),
                target: "概率".to_string(),
                relation: "underpins".to_string(),
                context: "ctx".to_string(),
                weight: 0.8,
            }],
        )];
        let mapping = mapping();
        let first = build_graph(&records, &mapping);
        let second = build_graph(&records, &mapping);
        assert_eq!(first, second);
        assert_eq!(first.node_count(), 2);
        assert_eq!(first.edge_count(), 1);
    }

    #[test]
    fn labels_come_from_mapping_with_unknown_fallback() {
        let records = vec![record(
            "b1",
            vec![Relation {
                source: "贝叶斯".to_string(),
                target: "未见过".to_string(),
                relation: "mentions".to_string(),
                context: "ctx".to_string(),
                weight: 0.5,
            }],
        )];
        let graph = build_graph(&records, &mapping());
        assert_eq!(graph.node("贝叶斯").unwrap().group, "Theory");
        assert_eq!(graph.node("未见过").unwrap().group, UNKNOWN_LABEL);
    }

    #[test]
    fn relation_without_weight_lands_as_default_on_the_edge() {
        let payload = json!({
            "relations": [
                {"source": "A", "target": "B", "relation": "uses", "context": "ctx"}
            ]
        });
        let relations = parse_relations(&payload).unwrap();
        let graph = build_graph(&[record("b1", relations)], &EntityLabelMap::new());
        assert_eq!(graph.edge("A", "B").unwrap().weight, 0.5);
    }

    #[test]
    fn same_ordered_pair_overwrites_instead_of_duplicating() {
        let records = vec![
            record(
                "b1",
                vec![Relation {
                    source: "A".to_string(),
                    target: "B".to_string(),
                    relation: "first".to_string(),
                    context: "ctx1".to_string(),
                    weight: 0.3,
                }],
            ),
            record(
                "b2",
                vec![Relation {
                    source: "A".to_string(),
                    target: "B".to_string(),
                    relation: "second".to_string(),
                    context: "ctx2".to_string(),
                    weight: 0.9,
                }],
            ),
        ];
        let graph = build_graph(&records, &EntityLabelMap::new());
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge("A", "B").unwrap().label, "second");
    }
}
