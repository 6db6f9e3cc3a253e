use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Fallback weight for relations that arrive without one, or with one that
/// cannot be read as a number.
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// A source–relation–target record extracted from one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub context: String,
    pub weight: f64,
}

/// The relations one chunk contributed, keyed by its block id. The list of
/// these records per document stays isomorphic to the live chunk set so a
/// deleted chunk retracts exactly what it contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripletRecord {
    pub bid: String,
    pub relations: Vec<Relation>,
}

/// Validate an entity payload: `{"entities": [["name", "label"], ...]}`.
/// Entries may also arrive as `{"name": ..., "label": ...}` objects.
/// `None` means the payload shape itself was wrong.
pub fn parse_entities(payload: &Value) -> Option<Vec<(String, String)>> {
    let list = payload.get("entities")?.as_array()?;
    let mut pairs = Vec::with_capacity(list.len());
    for item in list {
        match entity_pair(item) {
            Some(pair) => pairs.push(pair),
            None => warn!(item = %item, "dropping malformed entity entry"),
        }
    }
    Some(pairs)
}

fn entity_pair(item: &Value) -> Option<(String, String)> {
    if let Some(arr) = item.as_array() {
        if arr.len() >= 2 {
            return Some((arr[0].as_str()?.to_string(), arr[1].as_str()?.to_string()));
        }
        return None;
    }
    let obj = item.as_object()?;
    let name = obj.get("name").or_else(|| obj.get("entity"))?.as_str()?;
    let label = obj.get("label").or_else(|| obj.get("type"))?.as_str()?;
    Some((name.to_string(), label.to_string()))
}

/// Validate a relation payload: `{"relations": [{source, target, relation,
/// context, weight?}, ...]}`. Malformed entries are dropped with a warning;
/// `None` means the payload shape itself was wrong.
pub fn parse_relations(payload: &Value) -> Option<Vec<Relation>> {
    let list = payload.get("relations")?.as_array()?;
    Some(list.iter().filter_map(relation_from_value).collect())
}

fn relation_from_value(item: &Value) -> Option<Relation> {
    let obj = item.as_object()?;

    let field = |key: &str| -> Option<String> {
        obj.get(key).and_then(Value::as_str).map(str::to_string)
    };

    let (source, target, relation, context) = match (
        field("source"),
        field("target"),
        field("relation"),
        field("context"),
    ) {
        (Some(s), Some(t), Some(r), Some(c)) => (s, t, r, c),
        _ => {
            warn!(item = %item, "dropping relation with missing required fields");
            return None;
        }
    };

    Some(Relation {
        source,
        target,
        relation,
        context,
        weight: parse_weight(obj.get("weight")),
    })
}

/// Coerce a weight value to an f64 in [0, 1], defaulting to 0.5.
pub fn parse_weight(value: Option<&Value>) -> f64 {
    let weight = match value {
        None => DEFAULT_WEIGHT,
        Some(Value::Number(n)) => n.as_f64().unwrap_or_else(|| {
            warn!(value = %n, "weight is not a finite number, using default");
            DEFAULT_WEIGHT
        }),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or_else(|_| {
            warn!(value = %s, "weight does not parse as a number, using default");
            DEFAULT_WEIGHT
        }),
        Some(other) => {
            warn!(value = %other, "weight has an unexpected type, using default");
            DEFAULT_WEIGHT
        }
    };
    if !weight.is_finite() {
        return DEFAULT_WEIGHT;
    }
    weight.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entities_parse_from_pairs_and_objects() {
        let payload = json!({
            "entities": [
                ["贝叶斯", "Theory"],
                {"name": "Laplace", "label": "Person"},
                ["missing-label"],
            ]
        });
        let entities = parse_entities(&payload).unwrap();
        assert_eq!(
            entities,
            vec![
                ("贝叶斯".to_string(), "Theory".to_string()),
                ("Laplace".to_string(), "Person".to_string()),
            ]
        );
    }

    #[test]
    fn non_mapping_entity_payload_is_rejected() {
        assert!(parse_entities(&json!(["a", "b"])).is_none());
        assert!(parse_entities(&json!({"items": []})).is_none());
    }

    #[test]
    fn missing_weight_defaults() {
        let payload = json!({
            "relations": [
                {"source": "A", "target": "B", "relation": "uses", "context": "A uses B"}
            ]
        });
        let relations = parse_relations(&payload).unwrap();
        assert_eq!(relations[0].weight, DEFAULT_WEIGHT);
    }

    #[test]
    fn weight_accepts_strings_and_clamps() {
        assert_eq!(parse_weight(Some(&json!("0.8"))), 0.8);
        assert_eq!(parse_weight(Some(&json!(1.7))), 1.0);
        assert_eq!(parse_weight(Some(&json!("not a number"))), DEFAULT_WEIGHT);
        assert_eq!(parse_weight(Some(&json!({"nested": true}))), DEFAULT_WEIGHT);
    }

    #[test]
    fn relation_missing_required_field_is_dropped() {
        let payload = json!({
            "relations": [
                {"source": "A", "target": "B", "relation": "uses", "context": "ok", "weight": 0.9},
                {"source": "A", "relation": "dangling", "context": "no target"},
            ]
        });
        let relations = parse_relations(&payload).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target, "B");
    }
}
