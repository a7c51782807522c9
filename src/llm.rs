//! Ollama client. One blocking-style call surface: `generate` (JSON mode)
//! and `generate_text`, both with 3 attempts and 1 s / 2 s backoff, plus a
//! lightweight health probe. Cancellation comes from the caller running the
//! future under a deadline; the backoff sleeps are ordinary awaits, so a
//! fired deadline aborts mid-backoff.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;

/// Why an LLM call failed, so callers can pick a recovery path:
/// transport errors fall through to pending-classification, status errors
/// carry the backend's body for the logs.
#[derive(Debug)]
pub enum LlmError {
    /// Non-2xx from the backend.
    Status { status: u16, body: String },
    /// Connection-level failure (refused, DNS, timeout).
    Transport(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Status { status, body } => {
                write!(f, "ollama returned status {}: {}", status, body)
            }
            LlmError::Transport(msg) => write!(f, "ollama transport error: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    model_heavy: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, model_heavy: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            model_heavy: model_heavy.to_string(),
        })
    }

    pub fn model_name(&self, use_heavy: bool) -> &str {
        if use_heavy {
            &self.model_heavy
        } else {
            &self.model
        }
    }

    /// Generates with the JSON format flag set; the caller will parse the
    /// reply as a single JSON object.
    pub async fn generate(&self, prompt: &str, use_heavy: bool) -> Result<String, LlmError> {
        self.generate_inner(prompt, use_heavy, true, None).await
    }

    /// Free-form text generation (letters, narration).
    pub async fn generate_text(&self, prompt: &str, use_heavy: bool) -> Result<String, LlmError> {
        self.generate_inner(prompt, use_heavy, false, None).await
    }

    /// Generation against an explicit model with a system prompt; the
    /// narrator's adapter calls through here.
    pub async fn generate_with_system(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        self.attempt_loop(model, prompt, false, Some(system)).await
    }

    async fn generate_inner(
        &self,
        prompt: &str,
        use_heavy: bool,
        json_mode: bool,
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let model = self.model_name(use_heavy).to_string();
        self.attempt_loop(&model, prompt, json_mode, system).await
    }

    async fn attempt_loop(
        &self,
        model: &str,
        prompt: &str,
        json_mode: bool,
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                // 1s, then 2s. A caller deadline firing here cancels the
                // whole future, sleep included.
                tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
            }
            match self.do_generate(model, prompt, json_mode, system).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model = %model, attempt = attempt + 1, "LLM call failed: {}", e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("at least one attempt ran"))
    }

    async fn do_generate(
        &self,
        model: &str,
        prompt: &str,
        json_mode: bool,
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            format: json_mode.then_some("json"),
            system,
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: crate::utils::truncate_str(&body, 200),
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("decoding response: {}", e)))?;
        Ok(parsed.response)
    }

    /// Probes `/api/tags`. The caller supplies the deadline.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

/// Salvages a JSON object from a reply that may carry extra prose around
/// it: the substring between the first `{` and the last `}`. Falls back to
/// the input unchanged.
pub fn extract_json(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn test_extract_json_with_prose() {
        let reply = "Sure, here is the JSON:\n{\"claims\":[]}\nHope that helps!";
        assert_eq!(extract_json(reply), "{\"claims\":[]}");
    }

    #[test]
    fn test_extract_json_no_braces() {
        assert_eq!(extract_json("not json at all"), "not json at all");
    }

    #[test]
    fn test_extract_json_nested() {
        let reply = "prefix {\"a\":{\"b\":2}} suffix";
        assert_eq!(extract_json(reply), "{\"a\":{\"b\":2}}");
    }

    #[test]
    fn test_model_selection() {
        let client = OllamaClient::new("http://localhost:11434/", "light", "heavy").unwrap();
        assert_eq!(client.model_name(false), "light");
        assert_eq!(client.model_name(true), "heavy");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
