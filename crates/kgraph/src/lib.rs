pub mod builder;
pub mod compare;
pub mod diff;
pub mod model;

pub use builder::build_graph;
pub use compare::{compare, GraphDelta};
pub use diff::{normalize_ws, DiffResult, Differ, SubstringDiffer};
pub use model::{EdgeData, KnowledgeGraph, NodeData};
