//! Task prompts for the extraction, fusion and linking calls. Inputs are
//! formatted by the helpers below; the constants are the system half.

pub const ENTITY_EXTRACTION: &str = r#"Extract the key entities from the note text.

INSTRUCTIONS:
1. Identify entities: people, organizations, concepts, theories, technologies, locations, events
2. Assign each entity exactly one label naming its semantic type
3. Output ONLY valid JSON, nothing else

SCHEMA:
{"entities": [["entity name", "Label"], ...]}

RULES:
- Entity names must appear verbatim in the text
- Keep labels short: Person, Organization, Concept, Theory, Technology, Location, Event
- Extract 3-10 entities
- Output ONLY the JSON object, no markdown, no explanations"#;

pub const RELATION_EXTRACTION: &str = r#"Extract relationships between the listed entities from the note text.

INSTRUCTIONS:
1. Only use entities from the provided entity list as source and target
2. Describe each relationship and quote the supporting context
3. Score each relationship's strength as a weight between 0 and 1
4. Output ONLY valid JSON, nothing else

SCHEMA:
{"relations": [{"source": "A", "target": "B", "relation": "relationship description", "context": "supporting quote", "weight": 0.8}, ...]}

RULES:
- source and target must be distinct entries of the entity list
- relation should be a short verb phrase
- context must come from the note text
- weight reflects how strongly the text supports the relation
- Output ONLY the JSON object, no markdown, no explanations"#;

pub const KNOWLEDGE_FUSION: &str = r#"Multiple relationships were extracted for the same entity pair from different parts of a document. Reconcile them.

INSTRUCTIONS:
1. Merge duplicates and resolve contradictions between the listed relationships
2. Keep distinct relationships that genuinely coexist
3. Carry a weight between 0 and 1 for every merged relationship
4. Output ONLY valid JSON, nothing else

SCHEMA:
{"relations": [{"source": "A", "target": "B", "relation": "reconciled description", "context": "merged context", "weight": 0.8}, ...]}

RULES:
- source and target must be the two entities given in the input
- Prefer the higher-weight description when relationships contradict
- Output ONLY the JSON object, no markdown, no explanations"#;

pub const ENTITY_LINKING: &str = r#"Select the entities from the list that a question is about.

INSTRUCTIONS:
1. Pick only entities that appear in the provided entity list
2. Prefer entities the question names directly, then closely related ones
3. Output ONLY valid JSON, nothing else

SCHEMA:
{"entities": ["entity name", ...]}

RULES:
- Return an empty list when nothing matches
- Never invent entities that are not in the list
- Output ONLY the JSON object, no markdown, no explanations"#;

pub fn relation_input(chunk_text: &str, entities: &[String]) -> String {
    format!(
        "Note text: {}\nEntity list: {}",
        chunk_text,
        serde_json::to_string(entities).unwrap_or_else(|_| "[]".to_string())
    )
}

pub fn fusion_input(entity_a: &str, entity_b: &str, relations: &[&crate::schema::Relation]) -> String {
    let mut input = format!("Entity 1: {}\nEntity 2: {}\nExisting relations:\n", entity_a, entity_b);
    for relation in relations {
        input.push_str(&format!(
            "- {} (context: {}, weight: {})\n",
            relation.relation, relation.context, relation.weight
        ));
    }
    input
}

pub fn linking_input(entities: &[String], question: &str) -> String {
    format!(
        "Entity list: {}\nQuestion: {}",
        serde_json::to_string(entities).unwrap_or_else(|_| "[]".to_string()),
        question
    )
}
