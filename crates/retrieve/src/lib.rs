pub mod community;
pub mod explore;
pub mod hybrid;
pub mod linking;
pub mod louvain;

pub use community::{community_context, RetrieveConfig};
pub use explore::{random_entities, top_degree_entities};
pub use hybrid::{HybridContext, HybridRetriever};
pub use linking::link_entities;
pub use louvain::{detect_communities, modularity};
