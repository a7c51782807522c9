//! LLM-driven routing: free text → category + confidence, and purchase
//! text → structured transaction. Malformed model output downgrades to a
//! user-review result instead of failing the capture.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::llm::{extract_json, OllamaClient};
use crate::types::Category;

/// Below this the capture goes to the clarification queue. Exactly at the
/// threshold files.
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Below this a purchase parse is treated as unparseable by the handler.
pub const TRANSACTION_CONFIDENCE_FLOOR: f64 = 0.5;

/// How many choices a clarification can offer.
const MAX_CHOICES: usize = 4;

const CLASSIFIER_PROMPT: &str = r#"You are a personal note classifier. Classify the following capture into exactly one category.

Categories:
- Ideas: Creative thoughts, concepts, "what if" musings, inventions
- Projects: Actionable items with multiple steps, goals, tasks
- Financial: Money, transactions, purchases, bills (handled separately)
- Health: Body, mind, medical, fitness, wellness
- Life: Emotions, relationships, events, reflections, state of being
- Journal: Diary-style recounting of the day, things that happened
- Spirituality: Practice, meaning, contemplation
- Tasks: Single concrete to-dos

Capture: "{text}"
Actor: {actor}
Timestamp: {ts}

Respond in JSON:
{
  "category": "Ideas|Projects|Financial|Health|Life|Journal|Spirituality|Tasks",
  "confidence": 0.0-1.0,
  "title": "short descriptive title",
  "cleaned_text": "the capture, cleaned up and formatted",
  "tags": ["optional", "tags"]
}"#;

const TRANSACTION_PROMPT: &str = r#"Parse this purchase/transaction from natural speech.

Input: "{text}"
Actor: {actor}

Extract:
{
  "amount": number,
  "currency": "GBP|USD|EUR",
  "merchant": "store/vendor name",
  "label": "category like groceries, transport, etc",
  "notes": "any additional context",
  "confidence": 0.0-1.0
}

If you can't parse it reliably, set confidence below 0.5."#;

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    category: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    cleaned_text: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub category: Option<Category>,
    pub confidence: f64,
    pub title: String,
    pub cleaned_text: String,
    pub tags: Vec<String>,
    pub needs_review: bool,
    pub parse_error: bool,
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionParse {
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub merchant: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub confidence: f64,
}

pub struct Classifier<'a> {
    client: &'a OllamaClient,
}

impl<'a> Classifier<'a> {
    pub fn new(client: &'a OllamaClient) -> Self {
        Self { client }
    }

    /// Classifies a capture. Transport failure propagates (the handler
    /// turns it into pending_classification); a malformed or off-enum reply
    /// comes back as a parse_error result with the default choice list.
    pub async fn classify(
        &self,
        text: &str,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<Classification> {
        let prompt = CLASSIFIER_PROMPT
            .replace("{text}", text)
            .replace("{actor}", actor)
            .replace("{ts}", &timestamp.to_rfc3339());

        let response = self.client.generate(&prompt, false).await?;
        Ok(parse_classification(&response))
    }

    /// Parses a purchase capture. The caller decides what a low-confidence
    /// result means.
    pub async fn parse_transaction(
        &self,
        text: &str,
        actor: &str,
    ) -> anyhow::Result<TransactionParse> {
        let prompt = TRANSACTION_PROMPT
            .replace("{text}", text)
            .replace("{actor}", actor);

        let response = self.client.generate(&prompt, false).await?;
        let parsed: TransactionParse = serde_json::from_str(extract_json(&response))
            .map_err(|e| anyhow::anyhow!("parsing transaction response: {}", e))?;
        Ok(parsed)
    }
}

/// Pure parsing/validation half of classification, split out for tests.
pub fn parse_classification(response: &str) -> Classification {
    let raw: RawClassification = match serde_json::from_str(extract_json(response)) {
        Ok(raw) => raw,
        Err(_) => return parse_error_result(),
    };

    let Some(category) = Category::parse(&raw.category) else {
        return parse_error_result();
    };

    let needs_review = raw.confidence < CONFIDENCE_THRESHOLD;
    Classification {
        category: Some(category),
        confidence: raw.confidence,
        title: raw.title,
        cleaned_text: raw.cleaned_text,
        tags: raw.tags,
        needs_review,
        parse_error: false,
        choices: if needs_review {
            suggest_choices(Some(category))
        } else {
            Vec::new()
        },
    }
}

fn parse_error_result() -> Classification {
    Classification {
        category: None,
        confidence: 0.0,
        title: String::new(),
        cleaned_text: String::new(),
        tags: Vec::new(),
        needs_review: true,
        parse_error: true,
        choices: suggest_choices(None),
    }
}

/// Primary choice first, then the rest of the category list, capped at 4.
pub fn suggest_choices(primary: Option<Category>) -> Vec<String> {
    let mut choices = Vec::with_capacity(MAX_CHOICES);
    if let Some(primary) = primary {
        choices.push(primary.as_str().to_string());
    }
    for cat in Category::ALL {
        if choices.len() >= MAX_CHOICES {
            break;
        }
        if Some(cat) != primary {
            choices.push(cat.as_str().to_string());
        }
    }
    choices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classification_happy_path() {
        let reply = r#"{"category":"Ideas","confidence":0.9,"title":"Prototype eviction cache","cleaned_text":"Prototype an eviction cache for the feed","tags":["cache","feed"]}"#;
        let result = parse_classification(reply);
        assert_eq!(result.category, Some(Category::Ideas));
        assert!(!result.needs_review);
        assert!(!result.parse_error);
        assert!(result.choices.is_empty());
    }

    #[test]
    fn test_parse_classification_low_confidence() {
        let reply = r#"{"category":"Ideas","confidence":0.4,"title":"t","cleaned_text":"c","tags":[]}"#;
        let result = parse_classification(reply);
        assert!(result.needs_review);
        assert!(!result.parse_error);
        assert_eq!(
            result.choices,
            vec!["Ideas", "Projects", "Financial", "Health"]
        );
    }

    #[test]
    fn test_confidence_exactly_at_threshold_files() {
        let reply = r#"{"category":"Health","confidence":0.6,"title":"t","cleaned_text":"c","tags":[]}"#;
        let result = parse_classification(reply);
        assert!(!result.needs_review);
    }

    #[test]
    fn test_parse_classification_malformed_json() {
        let result = parse_classification("I think this is probably an idea?");
        assert!(result.parse_error);
        assert!(result.needs_review);
        assert_eq!(result.choices.len(), 4);
        assert_eq!(result.choices[0], "Ideas");
    }

    #[test]
    fn test_parse_classification_unknown_category() {
        let reply = r#"{"category":"Groceries","confidence":0.95,"title":"t","cleaned_text":"c","tags":[]}"#;
        let result = parse_classification(reply);
        assert!(result.parse_error);
        assert!(result.needs_review);
    }

    #[test]
    fn test_parse_classification_json_wrapped_in_prose() {
        let reply = "Here you go:\n{\"category\":\"Life\",\"confidence\":0.8,\"title\":\"t\",\"cleaned_text\":\"c\",\"tags\":[]}\nDone.";
        let result = parse_classification(reply);
        assert_eq!(result.category, Some(Category::Life));
        assert!(!result.parse_error);
    }

    #[test]
    fn test_suggest_choices_orders_primary_first() {
        let choices = suggest_choices(Some(Category::Health));
        assert_eq!(choices, vec!["Health", "Ideas", "Projects", "Financial"]);
        assert_eq!(choices.len(), 4);
    }
}
