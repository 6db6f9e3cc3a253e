pub mod agent;
pub mod fusion;
pub mod mapping;
pub mod pipeline;
pub mod prompt;
pub mod schema;

pub use agent::{extract_json_payload, safe_generate, LlmAgent, OllamaAgent};
pub use fusion::{FusionConfig, KnowledgeFusion};
pub use mapping::{EntityLabelMap, UNKNOWN_LABEL};
pub use pipeline::{Extractor, PipelineConfig, PipelineOutput};
pub use schema::{Relation, TripletRecord, DEFAULT_WEIGHT};
