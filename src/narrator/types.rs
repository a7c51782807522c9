use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Narrator processing state, persisted atomically to
/// `Journal/_meta/journal_state.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalState {
    #[serde(default)]
    pub last_processed_raw: String,
    #[serde(default)]
    pub last_processed_ts: Option<DateTime<Utc>>,
    /// YYYY-MM-DD
    #[serde(default)]
    pub current_day: String,
    #[serde(default)]
    pub last_update_at: Option<DateTime<Utc>>,
    /// "open" or "closed"
    #[serde(default = "default_day_status")]
    pub day_status: String,
    #[serde(default)]
    pub last_night_run_at: Option<DateTime<Utc>>,
}

fn default_day_status() -> String {
    "open".to_string()
}

impl JournalState {
    pub fn initial() -> Self {
        Self {
            day_status: default_day_status(),
            ..Default::default()
        }
    }
}

/// A parsed raw journal capture file.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub filename: String,
    pub id: String,
    pub created: DateTime<Utc>,
    pub actor: String,
    pub device: String,
    pub content: String,
    /// YYYY-MM-DD from the filename.
    pub day_date: String,
}

/// One audit-log line per narrated batch, appended to
/// `Journal/_meta/journal_map.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationMapping {
    pub day: String,
    pub generated_at: String,
    pub raw_files: Vec<String>,
    pub model: String,
    pub verifier_passed: bool,
}

/// An extracted fact with its supporting quote, which must be a literal
/// substring of some source entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub fact: String,
    #[serde(default)]
    pub quote: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimSet {
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationResult {
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub unsupported_claims: Vec<String>,
    #[serde(default)]
    pub feedback: String,
}

/// Narrator configuration.
#[derive(Debug, Clone)]
pub struct NarrationConfig {
    pub vault_path: std::path::PathBuf,
    /// Vault-relative journal directory, normally "Journal".
    pub journal_dir: String,
    pub timezone: chrono_tz::Tz,
    pub model: String,
    /// Verification retries after the first narration attempt.
    pub max_retries: usize,
    /// Max raw entries per pipeline batch.
    pub batch_size: usize,
}

impl NarrationConfig {
    pub fn new(vault_path: impl Into<std::path::PathBuf>, timezone: chrono_tz::Tz, model: &str) -> Self {
        Self {
            vault_path: vault_path.into(),
            journal_dir: "Journal".to_string(),
            timezone,
            model: model.to_string(),
            max_retries: 2,
            batch_size: 10,
        }
    }
}
