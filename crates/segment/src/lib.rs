pub mod chunk;
pub mod reader;
pub mod splitter;

pub use chunk::{estimate_tokens, Chunk};
pub use reader::FileReader;
pub use splitter::{cosine_similarity, SentenceEncoder, Splitter, SplitterConfig};

use sha2::{Digest, Sha256};

/// Stable document id derived from a file name or path.
pub fn generate_doc_id(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
