use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// LLM collaborator contract. `prompt` is the task instruction, `input` the
/// material to work on; the raw completion comes back as text and the caller
/// owns parsing.
#[allow(async_fn_in_trait)]
pub trait LlmAgent: Send + Sync {
    async fn generate(&self, prompt: &str, input: &str) -> Result<String>;
}

/// Ollama-backed agent.
#[derive(Clone)]
pub struct OllamaAgent {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: String, // "json" for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaAgent {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OllamaAgent {
    fn default() -> Self {
        Self::new("http://localhost:11434".to_string(), "llama3".to_string())
    }
}

impl LlmAgent for OllamaAgent {
    async fn generate(&self, prompt: &str, input: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: format!("{}\n\n{}", prompt, input),
            stream: false,
            format: "json".to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

/// Pull the embedded JSON object out of free-form model output: raw JSON
/// first, then a ```json fence, then the outermost brace span.
pub fn extract_json_payload(output: &str) -> Option<Value> {
    let trimmed = output.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    let fence = Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("static regex");
    if let Some(caps) = fence.captures(output) {
        if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end > start {
        if let Ok(value) = serde_json::from_str::<Value>(&output[start..=end]) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    None
}

/// Call the agent until the output carries a parsable JSON object, bounded by
/// `attempts`. `None` is the failure sentinel the extraction steps check.
pub async fn safe_generate<A: LlmAgent>(
    agent: &A,
    prompt: &str,
    input: &str,
    attempts: usize,
) -> Option<Value> {
    for attempt in 1..=attempts.max(1) {
        match agent.generate(prompt, input).await {
            Ok(output) => {
                if let Some(value) = extract_json_payload(&output) {
                    return Some(value);
                }
                warn!(attempt, "model output carried no parsable JSON object");
            }
            Err(e) => {
                warn!(attempt, error = %e, "LLM call failed");
            }
        }
    }
    None
}
