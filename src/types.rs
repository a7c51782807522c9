use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capture categories. `Financial` captures normally arrive through purchase
/// mode; it stays in the set so clarifications can route to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Ideas,
    Projects,
    Financial,
    Health,
    Life,
    Journal,
    Spirituality,
    Tasks,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Ideas,
        Category::Projects,
        Category::Financial,
        Category::Health,
        Category::Life,
        Category::Journal,
        Category::Spirituality,
        Category::Tasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ideas => "Ideas",
            Category::Projects => "Projects",
            Category::Financial => "Financial",
            Category::Health => "Health",
            Category::Life => "Life",
            Category::Journal => "Journal",
            Category::Spirituality => "Spirituality",
            Category::Tasks => "Tasks",
        }
    }

    /// Case-insensitive, whitespace-tolerant parse. Unknown names are None;
    /// the classifier treats that the same as malformed JSON.
    pub fn parse(s: &str) -> Option<Category> {
        match s.trim().to_lowercase().as_str() {
            "ideas" => Some(Category::Ideas),
            "projects" => Some(Category::Projects),
            "financial" => Some(Category::Financial),
            "health" => Some(Category::Health),
            "life" => Some(Category::Life),
            "journal" => Some(Category::Journal),
            "spirituality" => Some(Category::Spirituality),
            "tasks" => Some(Category::Tasks),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Capture lifecycle statuses. A status is decided once and never mutated.
pub const STATUS_RECEIVED: &str = "received";
pub const STATUS_NEEDS_REVIEW: &str = "needs_review";
pub const STATUS_FILED: &str = "filed";
pub const STATUS_EXPIRED: &str = "expired";
pub const STATUS_NOT_FOUND: &str = "not_found";
pub const STATUS_PENDING_CLASSIFICATION: &str = "pending_classification";
pub const STATUS_PARSE_ERROR: &str = "parse_error";

/// Incoming capture payload from a client device.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts_local: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureResponse {
    pub capture_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClarifyRequest {
    #[serde(default)]
    pub capture_id: String,
    #[serde(default)]
    pub destination: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClarifyResponse {
    pub capture_id: String,
    pub status: String,
    pub ui_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingItem {
    pub capture_id: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub preview: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    pub pending: Vec<PendingItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LetterPayload {
    pub letter_id: String,
    #[serde(rename = "type")]
    pub letter_type: String,
    pub for_date: String,
    pub text: String,
    pub created_ts: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LettersResponse {
    pub letters: Vec<LetterPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ollama: String,
    pub vault: String,
    pub version: String,
}

/// Standard error envelope for every non-2xx API response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_case_insensitive() {
        assert_eq!(Category::parse("ideas"), Some(Category::Ideas));
        assert_eq!(Category::parse("  Health "), Some(Category::Health));
        assert_eq!(Category::parse("JOURNAL"), Some(Category::Journal));
        assert_eq!(Category::parse("groceries"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn test_category_roundtrip() {
        for cat in Category::ALL {
            assert_eq!(Category::parse(cat.as_str()), Some(cat));
        }
    }
}
