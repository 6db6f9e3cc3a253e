use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A segmented span of source text with a stable identifier.
///
/// `block_id` is a pure function of the document id, the running chunk
/// counter and a content hash of the chunk's text prefix, so re-splitting
/// unchanged text reproduces the same ids. The incremental differ relies on
/// this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub block_id: String,
    pub text: String,
}

impl Chunk {
    pub fn new(doc_id: Option<&str>, counter: usize, text: String) -> Self {
        let block_id = Self::generate_block_id(doc_id, counter, &text);
        Self { block_id, text }
    }

    /// Estimate token count. Roughly 1.3 tokens per whitespace word, with
    /// CJK characters counted individually since they carry no spaces.
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }

    fn generate_block_id(doc_id: Option<&str>, counter: usize, text: &str) -> String {
        let prefix: String = text.chars().take(50).collect();
        let mut hasher = Sha256::new();
        hasher.update(prefix.as_bytes());
        let digest = hex::encode(&hasher.finalize()[..8]);

        match doc_id {
            Some(doc_id) => format!("{}_block_{}_{}", doc_id, counter, digest),
            None => format!("block_{}_{}", counter, digest),
        }
    }
}

/// Word-based token estimation, extended for CJK text.
pub fn estimate_tokens(text: &str) -> usize {
    let cjk_chars = text.chars().filter(|c| is_cjk_char(*c)).count();
    let word_count = text
        .split_whitespace()
        .filter(|w| !w.chars().all(is_cjk_char))
        .count();
    cjk_chars + (word_count as f64 * 1.3) as usize
}

pub(crate) fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3000}'..='\u{303F}'
        | '\u{FF00}'..='\u{FFEF}'
    )
}
