use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use tracing::warn;

use crate::chunk::{estimate_tokens, Chunk};

/// Encoder for the semantic-break detector. Implementations wrap a local
/// sentence-embedding model; the splitter only needs raw vectors.
pub trait SentenceEncoder: Send + Sync {
    fn encode(&self, sentence: &str) -> Result<Vec<f32>>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Budget per chunk in estimated tokens. Only the final remainder chunk
    /// may fall below `min_tokens`.
    pub max_tokens: usize,
    pub min_tokens: usize,
    /// Consecutive-sentence similarity below this marks a semantic break.
    pub semantic_threshold: f32,
    /// When set, no split point may land inside a known entity occurrence.
    pub enforce_entity_boundary: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            min_tokens: 128,
            semantic_threshold: 0.8,
            enforce_entity_boundary: false,
        }
    }
}

/// Boundary strength after a text unit, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Paragraph,
    Sentence,
    Clause,
}

struct Unit {
    text: String,
    tokens: usize,
    tier: Option<Tier>,
    /// Byte offset of the unit's end in the cleaned text.
    end: usize,
}

/// Splits raw text into ordered, uniquely-identified chunks under a token
/// budget. Split points prefer semantic discontinuities, then punctuation
/// (paragraph > sentence > clause), then a raw cutoff. Image/table/code
/// elements are opaque during splitting and restored verbatim.
pub struct Splitter {
    config: SplitterConfig,
    encoder: Option<Arc<dyn SentenceEncoder>>,
    protected_entities: Vec<String>,
}

impl Splitter {
    pub fn new(config: SplitterConfig) -> Self {
        let mut config = config;
        if config.min_tokens >= config.max_tokens {
            warn!(
                min_tokens = config.min_tokens,
                max_tokens = config.max_tokens,
                "min_tokens must be below max_tokens, clamping"
            );
            config.min_tokens = config.max_tokens / 4;
        }
        Self {
            config,
            encoder: None,
            protected_entities: Vec::new(),
        }
    }

    /// Enable semantic-break detection with the given sentence encoder.
    pub fn with_encoder(mut self, encoder: Arc<dyn SentenceEncoder>) -> Self {
        self.set_encoder(encoder);
        self
    }

    pub fn set_encoder(&mut self, encoder: Arc<dyn SentenceEncoder>) {
        self.encoder = Some(encoder);
    }

    /// Entity strings whose occurrences must not contain a split point.
    pub fn with_protected_entities(mut self, entities: Vec<String>) -> Self {
        self.protected_entities = entities;
        self
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    pub fn split(&self, text: &str, doc_id: Option<&str>) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let (clean, tags) = protect_regions(text);
        let spans = self.no_split_spans(&clean);
        let units = split_units(&clean, self.config.max_tokens, &spans);

        let mut chunks = Vec::new();
        let mut counter = 1usize;
        let mut start = 0usize;

        while start < units.len() {
            // Widest window of whole units that fits the budget.
            let mut end = start;
            let mut window_tokens = 0usize;
            while end < units.len() && window_tokens + units[end].tokens <= self.config.max_tokens {
                window_tokens += units[end].tokens;
                end += 1;
            }

            // Everything left fits: final chunk, allowed below min_tokens.
            if end == units.len() {
                self.emit(&units[start..], doc_id, &mut counter, &tags, &mut chunks);
                break;
            }

            // Oversized units were pre-cut in split_units, so end == start is
            // an estimation edge; take the unit whole rather than stalling.
            if end == start {
                end = start + 1;
            }

            let split_at = self.choose_split(&units, start, end, &spans);
            self.emit(&units[start..split_at], doc_id, &mut counter, &tags, &mut chunks);
            start = split_at;
        }

        chunks
    }

    /// Pick the unit index to split before, preferring semantic breaks, then
    /// the strongest punctuation tier closest to the budget, then the raw
    /// window end. Never fails: the hard cutoff always remains.
    fn choose_split(&self, units: &[Unit], start: usize, end: usize, spans: &[(usize, usize)]) -> usize {
        let ok = |idx: usize| -> bool {
            let tokens: usize = units[start..idx].iter().map(|u| u.tokens).sum();
            tokens >= self.config.min_tokens && !inside_span(units[idx - 1].end, spans)
        };

        if let Some(idx) = self.semantic_break(units, start, end) {
            if ok(idx) {
                return idx;
            }
        }

        for tier in [Tier::Paragraph, Tier::Sentence, Tier::Clause] {
            for b in (start..end).rev() {
                if units[b].tier == Some(tier) && ok(b + 1) {
                    return b + 1;
                }
            }
        }

        end
    }

    /// First adjacent unit pair whose embedding similarity drops below the
    /// threshold. Encoder failures disable the pass for this window only.
    fn semantic_break(&self, units: &[Unit], start: usize, end: usize) -> Option<usize> {
        let encoder = self.encoder.as_ref()?;
        if end - start < 2 {
            return None;
        }

        let mut embeddings = Vec::with_capacity(end - start);
        for unit in &units[start..end] {
            match encoder.encode(unit.text.trim()) {
                Ok(v) => embeddings.push(v),
                Err(e) => {
                    warn!(error = %e, "sentence encoding failed, skipping semantic breaks");
                    return None;
                }
            }
        }

        for i in 1..embeddings.len() {
            let sim = cosine_similarity(&embeddings[i - 1], &embeddings[i]);
            if sim < self.config.semantic_threshold {
                return Some(start + i);
            }
        }
        None
    }

    fn emit(
        &self,
        units: &[Unit],
        doc_id: Option<&str>,
        counter: &mut usize,
        tags: &[String],
        chunks: &mut Vec<Chunk>,
    ) {
        let text: String = units.iter().map(|u| u.text.as_str()).collect();
        let text = restore_regions(text.trim(), tags);
        if text.is_empty() {
            return;
        }
        chunks.push(Chunk::new(doc_id, *counter, text));
        *counter += 1;
    }

    /// Byte ranges no split point may fall inside: placeholder markers
    /// always, entity occurrences when protection is on.
    fn no_split_spans(&self, clean: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();

        let marker = Regex::new(r"__TAG_\d+__").expect("static regex");
        for m in marker.find_iter(clean) {
            spans.push((m.start(), m.end()));
        }

        if self.config.enforce_entity_boundary {
            for entity in &self.protected_entities {
                if entity.is_empty() {
                    continue;
                }
                let mut from = 0;
                while let Some(pos) = clean[from..].find(entity.as_str()) {
                    let s = from + pos;
                    spans.push((s, s + entity.len()));
                    from = s + entity.len();
                }
            }
        }

        spans.sort_unstable();
        spans
    }
}

fn inside_span(pos: usize, spans: &[(usize, usize)]) -> bool {
    spans.iter().any(|&(s, e)| pos > s && pos < e)
}

/// Replace image/table/code elements with atomic placeholders.
fn protect_regions(text: &str) -> (String, Vec<String>) {
    let pattern = Regex::new(
        r"(?s)<img[^>]*>.*?</img>|<table[^>]*>.*?</table>|<code[^>]*>.*?</code>",
    )
    .expect("static regex");

    let mut tags = Vec::new();
    let clean = pattern
        .replace_all(text, |caps: &regex::Captures<'_>| {
            tags.push(caps[0].to_string());
            format!("__TAG_{}__", tags.len() - 1)
        })
        .into_owned();
    (clean, tags)
}

fn restore_regions(text: &str, tags: &[String]) -> String {
    let mut restored = text.to_string();
    for (i, tag) in tags.iter().enumerate() {
        restored = restored.replace(&format!("__TAG_{}__", i), tag);
    }
    restored
}

/// Split cleaned text into minimal units ending at punctuation boundaries.
/// Units longer than the budget carry no usable punctuation and are pre-cut
/// at token-budget positions, backing out of protected spans, so the
/// assembly loop always makes progress.
fn split_units(clean: &str, max_tokens: usize, spans: &[(usize, usize)]) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut unit_start = 0usize;
    let mut iter = clean.char_indices().peekable();

    while let Some((_, c)) = iter.next() {
        let next = iter.peek().map(|&(_, n)| n);

        let tier = match c {
            '\n' if next == Some('\n') => {
                // Consume the whole newline run as one paragraph boundary.
                while iter.peek().map(|&(_, n)| n) == Some('\n') {
                    iter.next();
                }
                Some(Tier::Paragraph)
            }
            '\n' => Some(Tier::Sentence),
            '。' | '！' | '？' | '…' => Some(Tier::Sentence),
            '.' | '!' | '?' if next.is_none() || next.is_some_and(|n| n.is_whitespace()) => {
                Some(Tier::Sentence)
            }
            '；' | '，' | '、' => Some(Tier::Clause),
            ';' | ',' if next.is_some_and(|n| n.is_whitespace()) => Some(Tier::Clause),
            _ => None,
        };

        if let Some(tier) = tier {
            let boundary = iter.peek().map_or(clean.len(), |&(j, _)| j);
            push_unit(&mut units, &clean[unit_start..boundary], Some(tier), max_tokens, unit_start, spans);
            unit_start = boundary;
        }
    }

    if unit_start < clean.len() {
        push_unit(&mut units, &clean[unit_start..], None, max_tokens, unit_start, spans);
    }

    units
}

fn push_unit(
    units: &mut Vec<Unit>,
    text: &str,
    tier: Option<Tier>,
    max_tokens: usize,
    offset: usize,
    spans: &[(usize, usize)],
) {
    let tokens = estimate_tokens(text);
    if tokens <= max_tokens {
        units.push(Unit {
            text: text.to_string(),
            tokens,
            tier,
            end: offset + text.len(),
        });
        return;
    }

    let mut rest = text;
    let mut rest_offset = offset;
    while estimate_tokens(rest) > max_tokens {
        let mut cut = prefix_boundary(rest, max_tokens);
        while cut > 0 && inside_span(rest_offset + cut, spans) {
            cut = prev_char_boundary(rest, cut);
        }
        if cut == 0 {
            break;
        }
        units.push(Unit {
            text: rest[..cut].to_string(),
            tokens: estimate_tokens(&rest[..cut]),
            tier: None,
            end: rest_offset + cut,
        });
        rest = &rest[cut..];
        rest_offset += cut;
    }
    units.push(Unit {
        text: rest.to_string(),
        tokens: estimate_tokens(rest),
        tier,
        end: offset + text.len(),
    });
}

/// Largest char-aligned prefix whose token estimate fits the budget.
/// Incremental so oversized units do not trigger quadratic re-estimation.
fn prefix_boundary(text: &str, max_tokens: usize) -> usize {
    let mut cjk = 0usize;
    let mut words = 0usize;
    let mut in_word = false;
    let mut last_fit = 0usize;

    for (i, c) in text.char_indices() {
        let estimate = cjk + (words as f64 * 1.3) as usize;
        if estimate > max_tokens {
            break;
        }
        last_fit = i;

        if c.is_whitespace() {
            in_word = false;
        } else if crate::chunk::is_cjk_char(c) {
            cjk += 1;
            in_word = false;
        } else if !in_word {
            words += 1;
            in_word = true;
        }
    }
    last_fit
}

fn prev_char_boundary(text: &str, mut pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    pos -= 1;
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}
