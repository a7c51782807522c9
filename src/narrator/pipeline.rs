//! The three-stage grounded-generation pipeline: claim extraction →
//! narration → verification with bounded retry.

use async_trait::async_trait;

use crate::llm::extract_json;
use crate::narrator::prompts;
use crate::narrator::types::{ClaimSet, RawEntry, VerificationResult};
use crate::utils::truncate_str;

/// The narrow LLM capability the narrator needs. Tests substitute a
/// scripted fake; production adapts the Ollama client.
#[async_trait]
pub trait JournalLlm: Send + Sync {
    async fn generate(&self, model: &str, system: &str, prompt: &str) -> anyhow::Result<String>;
}

/// Adapter from the shared Ollama client onto the narrator's capability.
pub struct OllamaJournalLlm {
    client: std::sync::Arc<crate::llm::OllamaClient>,
}

impl OllamaJournalLlm {
    pub fn new(client: std::sync::Arc<crate::llm::OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JournalLlm for OllamaJournalLlm {
    async fn generate(&self, model: &str, system: &str, prompt: &str) -> anyhow::Result<String> {
        Ok(self.client.generate_with_system(model, system, prompt).await?)
    }
}

#[derive(Debug)]
pub struct NarrationResult {
    pub narrated_text: String,
    pub claims: ClaimSet,
    pub verified: bool,
    pub attempts: usize,
    pub raw_files: Vec<String>,
}

pub struct Pipeline {
    llm: std::sync::Arc<dyn JournalLlm>,
    model: String,
    max_retries: usize,
}

impl Pipeline {
    pub fn new(llm: std::sync::Arc<dyn JournalLlm>, model: &str, max_retries: usize) -> Self {
        Self {
            llm,
            model: model.to_string(),
            max_retries,
        }
    }

    /// Runs the full pipeline over one batch. Verification failures retry
    /// the narration with a stricter prompt; after `max_retries + 1` total
    /// narration attempts the last narration is accepted with
    /// `verified: false`.
    pub async fn process(&self, entries: &[RawEntry]) -> anyhow::Result<NarrationResult> {
        if entries.is_empty() {
            anyhow::bail!("no entries to process");
        }

        let raw_files: Vec<String> = entries.iter().map(|e| e.filename.clone()).collect();

        let claims = self.extract_claims(entries).await?;
        if claims.claims.is_empty() {
            anyhow::bail!("no claims extracted from entries: nothing to narrate");
        }

        let mut narrated = String::new();
        let mut verified = false;
        let mut feedback = String::new();
        let mut attempts = 0;

        while attempts < self.max_retries + 1 {
            attempts += 1;

            narrated = if attempts == 1 {
                self.narrate(&claims).await?
            } else {
                self.narrate_strict(&claims, &feedback).await?
            };

            let result = self.verify(&claims, &narrated).await?;
            if result.passed {
                verified = true;
                break;
            }

            feedback = result.feedback;
            if !result.unsupported_claims.is_empty() {
                feedback.push_str("\nUnsupported statements: ");
                feedback.push_str(&result.unsupported_claims.join("; "));
            }
        }

        Ok(NarrationResult {
            narrated_text: narrated,
            claims,
            verified,
            attempts,
            raw_files,
        })
    }

    async fn extract_claims(&self, entries: &[RawEntry]) -> anyhow::Result<ClaimSet> {
        let prompt = prompts::build_claim_extraction_prompt(entries);
        let response = self
            .llm
            .generate(&self.model, prompts::SYSTEM_PROMPT, &prompt)
            .await?;

        let mut claims = parse_claims_response(&response)?;
        if let Some(first) = entries.first() {
            claims.date = first.day_date.clone();
        }
        Ok(claims)
    }

    async fn narrate(&self, claims: &ClaimSet) -> anyhow::Result<String> {
        let prompt = prompts::build_narration_prompt(claims);
        let response = self
            .llm
            .generate(&self.model, prompts::SYSTEM_PROMPT, &prompt)
            .await?;
        Ok(response.trim().to_string())
    }

    async fn narrate_strict(&self, claims: &ClaimSet, feedback: &str) -> anyhow::Result<String> {
        let prompt = prompts::build_strict_narration_prompt(claims, feedback);
        let response = self
            .llm
            .generate(&self.model, prompts::SYSTEM_PROMPT, &prompt)
            .await?;
        Ok(response.trim().to_string())
    }

    async fn verify(
        &self,
        claims: &ClaimSet,
        narrated: &str,
    ) -> anyhow::Result<VerificationResult> {
        let prompt = prompts::build_verification_prompt(claims, narrated);
        let response = self
            .llm
            .generate(&self.model, prompts::SYSTEM_PROMPT, &prompt)
            .await?;
        parse_verification_response(&response)
    }
}

/// Parses the claim-extraction reply: strict parse first, then the
/// first-`{`-to-last-`}` substring, then a bare claims array wrapper.
pub fn parse_claims_response(response: &str) -> anyhow::Result<ClaimSet> {
    let json = extract_json(response);
    if let Ok(claims) = serde_json::from_str::<ClaimSet>(json) {
        return Ok(claims);
    }

    #[derive(serde::Deserialize)]
    struct Wrapper {
        claims: Vec<crate::narrator::types::Claim>,
    }
    match serde_json::from_str::<Wrapper>(json) {
        Ok(wrapper) => Ok(ClaimSet {
            claims: wrapper.claims,
            date: String::new(),
        }),
        Err(e) => anyhow::bail!(
            "json parse error: {} (response: {})",
            e,
            truncate_str(response, 200)
        ),
    }
}

pub fn parse_verification_response(response: &str) -> anyhow::Result<VerificationResult> {
    serde_json::from_str(extract_json(response)).map_err(|e| {
        anyhow::anyhow!(
            "json parse error: {} (response: {})",
            e,
            truncate_str(response, 200)
        )
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Scripted fake: pops replies in order, records the prompts it saw.
    pub struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn new(replies: Vec<&str>) -> std::sync::Arc<Self> {
            std::sync::Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().map(String::from).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl JournalLlm for ScriptedLlm {
        async fn generate(
            &self,
            _model: &str,
            _system: &str,
            prompt: &str,
        ) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("scripted llm ran out of replies"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedLlm;
    use super::*;

    fn entry(id: &str, content: &str) -> RawEntry {
        RawEntry {
            filename: format!("2026-02-10_070000_{}.md", id),
            id: id.to_string(),
            created: chrono::Utc::now(),
            actor: "wolf".to_string(),
            device: "phone".to_string(),
            content: content.to_string(),
            day_date: "2026-02-10".to_string(),
        }
    }

    const CLAIMS_REPLY: &str = r#"{"claims":[{"fact":"Went for a run in the morning","quote":"Had a good run this morning."},{"fact":"Met Ana about the cave trip","quote":"Met with Ana about the cave trip."}]}"#;
    const VERIFY_PASS: &str = r#"{"passed":true,"unsupported_claims":[],"feedback":""}"#;
    const VERIFY_FAIL: &str = r#"{"passed":false,"unsupported_claims":["I also lost my keys"],"feedback":"Narration adds an unsupported statement"}"#;

    #[tokio::test]
    async fn test_happy_path_single_attempt() {
        let llm = ScriptedLlm::new(vec![
            CLAIMS_REPLY,
            "I went for a run and talked with Ana about the cave trip.",
            VERIFY_PASS,
        ]);
        let pipeline = Pipeline::new(llm.clone(), "qwen2.5:14b", 2);

        let result = pipeline
            .process(&[
                entry("cap_a", "Had a good run this morning."),
                entry("cap_b", "Met with Ana about the cave trip."),
            ])
            .await
            .unwrap();

        assert!(result.verified);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.claims.claims.len(), 2);
        assert_eq!(result.claims.date, "2026-02-10");
        assert_eq!(
            result.raw_files,
            vec![
                "2026-02-10_070000_cap_a.md".to_string(),
                "2026-02-10_070000_cap_b.md".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_verification_failure_retries_with_strict_prompt() {
        let llm = ScriptedLlm::new(vec![
            CLAIMS_REPLY,
            "I went for a run. I also lost my keys.",
            VERIFY_FAIL,
            "I went for a run and talked with Ana about the cave trip.",
            VERIFY_PASS,
        ]);
        let pipeline = Pipeline::new(llm.clone(), "qwen2.5:14b", 2);

        let result = pipeline
            .process(&[entry("cap_a", "Had a good run this morning.")])
            .await
            .unwrap();

        assert!(result.verified);
        assert_eq!(result.attempts, 2);
        assert!(!result.narrated_text.contains("lost my keys"));

        // The retry prompt carries the verifier feedback and the
        // unsupported statement.
        let prompts = llm.prompts.lock().unwrap();
        let strict = &prompts[3];
        assert!(strict.contains("PREVIOUS ATTEMPT FAILED VERIFICATION"));
        assert!(strict.contains("I also lost my keys"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_accepts_unverified() {
        let llm = ScriptedLlm::new(vec![
            CLAIMS_REPLY,
            "Attempt one.",
            VERIFY_FAIL,
            "Attempt two.",
            VERIFY_FAIL,
            "Attempt three.",
            VERIFY_FAIL,
        ]);
        let pipeline = Pipeline::new(llm, "qwen2.5:14b", 2);

        let result = pipeline
            .process(&[entry("cap_a", "Something happened.")])
            .await
            .unwrap();

        assert!(!result.verified);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.narrated_text, "Attempt three.");
    }

    #[tokio::test]
    async fn test_zero_claims_is_an_error() {
        let llm = ScriptedLlm::new(vec![r#"{"claims":[]}"#]);
        let pipeline = Pipeline::new(llm, "qwen2.5:14b", 2);
        let err = pipeline
            .process(&[entry("cap_a", "text")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing to narrate"));
    }

    #[test]
    fn test_parse_claims_with_surrounding_prose() {
        let reply = format!("Here are the claims:\n{}\nDone.", CLAIMS_REPLY);
        let claims = parse_claims_response(&reply).unwrap();
        assert_eq!(claims.claims.len(), 2);
    }

    #[test]
    fn test_parse_claims_garbage_fails() {
        assert!(parse_claims_response("no json here").is_err());
    }

    #[test]
    fn test_parse_verification_defaults() {
        let result = parse_verification_response(r#"{"passed":true}"#).unwrap();
        assert!(result.passed);
        assert!(result.unsupported_claims.is_empty());
    }
}
