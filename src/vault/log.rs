use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{writer, Vault};

/// One line of `Log/captures.jsonl`: every capture outcome, including
/// expiries, lands here in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureLogEntry {
    pub id: String,
    pub ts: String,
    pub actor: String,
    pub mode: String,
    pub raw: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub routed_to: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub confidence: f64,
    pub status: String,
    pub device: String,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

impl CaptureLogEntry {
    pub fn new(
        id: &str,
        actor: &str,
        mode: &str,
        raw: &str,
        routed_to: &str,
        status: &str,
        device_id: &str,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            ts: Utc::now().to_rfc3339(),
            actor: actor.to_string(),
            mode: mode.to_string(),
            raw: raw.to_string(),
            routed_to: routed_to.to_string(),
            confidence,
            status: status.to_string(),
            device: device_id.to_string(),
        }
    }
}

impl Vault {
    /// Appends a capture entry to `Log/captures.jsonl` under the log mutex.
    pub async fn log_capture(&self, entry: &CaptureLogEntry) -> anyhow::Result<()> {
        let _guard = self.log_lock.lock().await;
        let path = self.base_path().join("Log/captures.jsonl");
        let line = serde_json::to_vec(entry)?;
        writer::append_line(&path, &line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_capture_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());

        let entry = CaptureLogEntry::new(
            "cap_1", "wolf", "note", "some text", "Ideas", "filed", "d1", 0.9,
        );
        vault.log_capture(&entry).await.unwrap();
        vault.log_capture(&entry).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("Log/captures.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: CaptureLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.id, "cap_1");
        assert_eq!(parsed.status, "filed");
    }
}
