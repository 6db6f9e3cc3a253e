use serde::{Deserialize, Serialize};

use extract::{FusionConfig, PipelineConfig};
use retrieve::RetrieveConfig;
use segment::SplitterConfig;

/// Configuration for one service instance, assembled at startup and handed
/// to the components it constructs.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub splitter: SplitterConfig,
    pub pipeline: PipelineConfig,
    pub fusion: FusionConfig,
    pub retrieve: RetrieveConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}
