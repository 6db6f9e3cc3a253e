use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label returned for entities the mapping has never seen.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Bidirectional entity ⇄ semantic-label index. The forward map is the
/// source of truth and is a function: an entity keeps the label it was first
/// seen with. The reverse index is derived and rebuilt on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityLabelMap {
    entity_to_label: HashMap<String, String>,
    label_to_entities: HashMap<String, Vec<String>>,
}

impl EntityLabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut mapping = Self::new();
        for (entity, label) in pairs {
            mapping.insert(&entity, &label);
        }
        mapping
    }

    /// First write wins: a later occurrence of a known entity keeps the
    /// original label, whatever the new one says.
    pub fn insert(&mut self, entity: &str, label: &str) {
        if self.entity_to_label.contains_key(entity) {
            return;
        }
        self.entity_to_label
            .insert(entity.to_string(), label.to_string());
        self.label_to_entities
            .entry(label.to_string())
            .or_default()
            .push(entity.to_string());
    }

    /// Merge `other` in, keeping existing entries on conflict.
    pub fn merge(&mut self, other: &EntityLabelMap) {
        for (entity, label) in &other.entity_to_label {
            self.insert(entity, label);
        }
    }

    pub fn label_of(&self, entity: &str) -> &str {
        self.entity_to_label
            .get(entity)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entity_to_label.contains_key(entity)
    }

    pub fn entities_with_label(&self, label: &str) -> &[String] {
        self.label_to_entities
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entity_to_label.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entity_to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_to_label.is_empty()
    }
}
