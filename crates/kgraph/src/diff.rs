use segment::{Chunk, Splitter};
use tracing::debug;

/// Collapse whitespace runs to single spaces and trim the ends, so layout
/// changes alone never count as content changes.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub deleted: Vec<Chunk>,
    pub added: Vec<Chunk>,
}

impl DiffResult {
    pub fn is_unchanged(&self) -> bool {
        self.deleted.is_empty() && self.added.is_empty()
    }
}

/// Computes the minimal chunk-level change set between stored chunks and a
/// new document revision. Behind a trait so the substring heuristic can be
/// swapped for a sequence-alignment differ without touching callers.
pub trait Differ: Send + Sync {
    fn diff(
        &self,
        old_chunks: &[Chunk],
        new_text: &str,
        splitter: &Splitter,
        doc_id: Option<&str>,
    ) -> DiffResult;
}

/// Substring-replacement differ. Every old chunk whose normalized text still
/// occurs in the normalized new text collapses to its block-id marker
/// (first match only); what remains between markers is new material.
///
/// Limitation: when one chunk's text is a substring of another's, or
/// identical chunk text repeats, matches can be misattributed. Documents
/// with near-duplicate chunks should not rely on this differ.
pub struct SubstringDiffer;

impl Differ for SubstringDiffer {
    fn diff(
        &self,
        old_chunks: &[Chunk],
        new_text: &str,
        splitter: &Splitter,
        doc_id: Option<&str>,
    ) -> DiffResult {
        let normalized_new = normalize_ws(new_text);

        // Collapse unchanged spans to id markers, in old-chunk order.
        let mut replaced = normalized_new.clone();
        for chunk in old_chunks {
            let norm = normalize_ws(&chunk.text);
            if norm.is_empty() {
                continue;
            }
            if let Some(pos) = replaced.find(&norm) {
                replaced.replace_range(pos..pos + norm.len(), &chunk.block_id);
            }
        }

        let deleted: Vec<Chunk> = old_chunks
            .iter()
            .filter(|chunk| !normalized_new.contains(&normalize_ws(&chunk.text)))
            .cloned()
            .collect();

        // Residual segments between markers are new or changed material and
        // go back through the standard splitter.
        let mut added = Vec::new();
        for part in split_on_markers(&replaced, old_chunks) {
            added.extend(splitter.split(&part, doc_id));
        }

        debug!(
            deleted = deleted.len(),
            added = added.len(),
            "chunk diff computed"
        );
        DiffResult { deleted, added }
    }
}

fn split_on_markers(text: &str, chunks: &[Chunk]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;

    loop {
        let next = chunks
            .iter()
            .filter_map(|chunk| rest.find(&chunk.block_id).map(|pos| (pos, chunk.block_id.len())))
            .min();

        match next {
            Some((pos, len)) => {
                let part = rest[..pos].trim();
                if !part.is_empty() {
                    parts.push(part.to_string());
                }
                rest = &rest[pos + len..];
            }
            None => {
                let part = rest.trim();
                if !part.is_empty() {
                    parts.push(part.to_string());
                }
                break;
            }
        }
    }

    parts
}
