//! Prompt templates for the three-stage narration pipeline.

use crate::narrator::types::{ClaimSet, RawEntry};

pub const SYSTEM_PROMPT: &str = "You are a journal assistant helping to narrate personal journal entries.\n\
You value accuracy and faithfulness to the source material above all else.\n\
You never invent details or embellish facts.\n\
You write in a warm but precise first-person voice.";

const CLAIM_EXTRACTION_PROMPT: &str = r#"You are a precise fact extractor. Your job is to extract ONLY explicit claims from journal text.

RULES:
1. Extract only facts that are explicitly stated in the text
2. Do NOT infer emotions, motivations, or causes unless explicitly stated
3. Do NOT add any information not present in the source
4. Each claim must have a supporting quote from the source text
5. Keep claims factual and objective

INPUT TEXT:
{input}

OUTPUT FORMAT (JSON):
{
  "claims": [
    {"fact": "The explicit fact here", "quote": "The exact supporting quote from text"},
    ...
  ]
}

Extract all explicit claims now:"#;

const NARRATION_PROMPT: &str = r#"You are a skilled journal narrator. Transform these factual claims into engaging first-person journal paragraphs.

RULES:
1. Write in first-person voice (I, me, my)
2. Be conversational and natural, as if writing in a personal journal
3. Do NOT add any facts not present in the claims
4. Do NOT include specific dates or times
5. Do NOT invent details, emotions, or context not supported by claims
6. Connect related claims into flowing paragraphs
7. Keep it concise: 1-4 paragraphs maximum
8. Maintain the emotional tone implied by the facts without embellishment

CLAIMS TO NARRATE:
{claims}

Write the journal entry now:"#;

const STRICT_NARRATION_PROMPT: &str = r#"You are a precise journal narrator. Transform these claims into first-person paragraphs with STRICT adherence to the source material.

CRITICAL RULES:
1. Every sentence must be directly supported by a claim
2. Use ONLY the facts provided - add nothing
3. Write in first-person (I, me, my)
4. No dates, times, or temporal markers
5. No invented emotions or reactions
6. Keep it factual and brief

CLAIMS:
{claims}

PREVIOUS ATTEMPT FAILED VERIFICATION. Issues found:
{feedback}

Write a more faithful version now:"#;

const VERIFICATION_PROMPT: &str = r#"You are a fact-checker. Compare the narrated text against the source claims and identify any unsupported statements.

CLAIMS (source of truth):
{claims}

NARRATED TEXT (to verify):
{narration}

TASK:
1. Check each sentence in the narrated text
2. Verify it is supported by one or more claims
3. Flag any sentences that add information not in the claims

OUTPUT FORMAT (JSON):
{
  "passed": true/false,
  "unsupported_claims": ["sentence 1 that has no support", "sentence 2...", ...],
  "feedback": "Brief explanation of issues if any"
}

Verify now:"#;

pub fn build_claim_extraction_prompt(entries: &[RawEntry]) -> String {
    let combined: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("--- Entry {} ---\n{}", i + 1, entry.content))
        .collect();
    CLAIM_EXTRACTION_PROMPT.replace("{input}", &combined.join("\n\n"))
}

fn numbered_facts(claims: &ClaimSet) -> String {
    claims
        .claims
        .iter()
        .enumerate()
        .map(|(i, claim)| format!("{}. {}", i + 1, claim.fact))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_narration_prompt(claims: &ClaimSet) -> String {
    NARRATION_PROMPT.replace("{claims}", &numbered_facts(claims))
}

pub fn build_strict_narration_prompt(claims: &ClaimSet, feedback: &str) -> String {
    STRICT_NARRATION_PROMPT
        .replace("{claims}", &numbered_facts(claims))
        .replace("{feedback}", feedback)
}

pub fn build_verification_prompt(claims: &ClaimSet, narration: &str) -> String {
    let with_quotes = claims
        .claims
        .iter()
        .enumerate()
        .map(|(i, claim)| format!("{}. {} (quote: \"{}\")", i + 1, claim.fact, claim.quote))
        .collect::<Vec<_>>()
        .join("\n");
    VERIFICATION_PROMPT
        .replace("{claims}", &with_quotes)
        .replace("{narration}", narration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::types::Claim;

    #[test]
    fn test_claim_prompt_numbers_entries() {
        let entries = vec![
            RawEntry {
                filename: "a.md".into(),
                id: "cap_a".into(),
                created: chrono::Utc::now(),
                actor: "wolf".into(),
                device: "d1".into(),
                content: "Had a good run this morning.".into(),
                day_date: "2026-02-10".into(),
            },
            RawEntry {
                filename: "b.md".into(),
                id: "cap_b".into(),
                created: chrono::Utc::now(),
                actor: "wolf".into(),
                device: "d1".into(),
                content: "Met with Ana about the cave trip.".into(),
                day_date: "2026-02-10".into(),
            },
        ];
        let prompt = build_claim_extraction_prompt(&entries);
        assert!(prompt.contains("--- Entry 1 ---\nHad a good run this morning."));
        assert!(prompt.contains("--- Entry 2 ---\nMet with Ana about the cave trip."));
    }

    #[test]
    fn test_verification_prompt_includes_quotes() {
        let claims = ClaimSet {
            claims: vec![Claim {
                fact: "Went for a run".into(),
                quote: "Had a good run".into(),
            }],
            date: "2026-02-10".into(),
        };
        let prompt = build_verification_prompt(&claims, "I went running.");
        assert!(prompt.contains("1. Went for a run (quote: \"Had a good run\")"));
        assert!(prompt.contains("I went running."));
    }
}
