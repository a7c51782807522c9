//! Daily journal files under `Journal/Daily/`.
//!
//! Mutation contract: front-matter updates never rewrite the body, body
//! appends only touch the `updated_at` key, and every mutation is
//! write-temp-then-rename. The contract is single-process; narration runs
//! only from the in-process scheduler and handler triggers.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::vault::writer;

pub struct DailyWriter {
    daily_path: PathBuf,
}

impl DailyWriter {
    pub fn new(journal_path: &Path) -> Self {
        Self {
            daily_path: journal_path.join("Daily"),
        }
    }

    fn file_path(&self, date: &str) -> PathBuf {
        self.daily_path.join(format!("{}.md", date))
    }

    /// Appends a narrated batch to the day's file, creating it with
    /// front-matter on first write. Later batches are separated by a
    /// horizontal rule and bump `updated_at`.
    pub fn append_to_daily(&self, date: &str, narrated: &str) -> anyhow::Result<()> {
        let path = self.file_path(date);
        if !path.exists() {
            return self.create_daily_file(&path, date, narrated);
        }

        let existing = std::fs::read_to_string(&path)?;
        let mut updated = update_frontmatter_field(&existing, "updated_at", &Utc::now().to_rfc3339());
        updated = format!("{}\n\n---\n\n{}\n", updated.trim_end_matches('\n'), narrated);
        writer::write_atomic(&path, updated.as_bytes())
    }

    fn create_daily_file(&self, path: &Path, date: &str, narrated: &str) -> anyhow::Result<()> {
        let content = format!(
            "---\ndate: {}\nstatus: open\nupdated_at: {}\n---\n\n{}\n",
            date,
            Utc::now().to_rfc3339(),
            narrated
        );
        writer::write_atomic(path, content.as_bytes())
    }

    /// Marks the day's file closed. Missing files are a no-op.
    pub fn close_day(&self, date: &str) -> anyhow::Result<()> {
        let path = self.file_path(date);
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&path)?;
        let updated = update_frontmatter_field(&content, "status", "closed");
        let updated = update_frontmatter_field(&updated, "updated_at", &Utc::now().to_rfc3339());
        writer::write_atomic(&path, updated.as_bytes())
    }

    /// Reads the `status` front-matter key of a day's file. Missing file →
    /// empty string; missing key → "open".
    pub fn daily_status(&self, date: &str) -> anyhow::Result<String> {
        let path = self.file_path(date);
        if !path.exists() {
            return Ok(String::new());
        }

        let content = std::fs::read_to_string(&path)?;
        let mut in_frontmatter = false;
        for (i, line) in content.lines().enumerate() {
            if line == "---" {
                if i == 0 {
                    in_frontmatter = true;
                    continue;
                }
                break;
            }
            if in_frontmatter {
                if let Some(value) = line.strip_prefix("status:") {
                    return Ok(value.trim().to_string());
                }
            }
        }
        Ok("open".to_string())
    }
}

/// Rewrites one key inside the leading front-matter block, adding it before
/// the closing delimiter when absent. The body is carried through
/// untouched.
fn update_frontmatter_field(content: &str, field: &str, value: &str) -> String {
    let mut result = Vec::new();
    let mut in_frontmatter = false;
    let mut field_found = false;
    let prefix = format!("{}:", field);

    for (i, line) in content.lines().enumerate() {
        if i == 0 && line == "---" {
            in_frontmatter = true;
            result.push(line.to_string());
            continue;
        }
        if in_frontmatter && line == "---" {
            if !field_found {
                result.push(format!("{}: {}", field, value));
            }
            in_frontmatter = false;
            result.push(line.to_string());
            continue;
        }
        if in_frontmatter && line.starts_with(&prefix) {
            result.push(format!("{}: {}", field, value));
            field_found = true;
            continue;
        }
        result.push(line.to_string());
    }

    result.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DailyWriter::new(dir.path());

        writer
            .append_to_daily("2026-02-10", "First narrated batch.")
            .unwrap();
        let content = std::fs::read_to_string(dir.path().join("Daily/2026-02-10.md")).unwrap();
        assert!(content.starts_with("---\ndate: 2026-02-10\nstatus: open\n"));
        assert!(content.contains("First narrated batch."));

        writer
            .append_to_daily("2026-02-10", "Second narrated batch.")
            .unwrap();
        let content = std::fs::read_to_string(dir.path().join("Daily/2026-02-10.md")).unwrap();
        assert!(content.contains("First narrated batch.\n\n---\n\nSecond narrated batch."));
        // Front-matter still has exactly one status key.
        assert_eq!(content.matches("status:").count(), 1);
    }

    #[test]
    fn test_append_preserves_body() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DailyWriter::new(dir.path());
        writer.append_to_daily("2026-02-10", "Body one.").unwrap();
        writer.append_to_daily("2026-02-10", "Body two.").unwrap();
        writer.append_to_daily("2026-02-10", "Body three.").unwrap();

        let content = std::fs::read_to_string(dir.path().join("Daily/2026-02-10.md")).unwrap();
        assert!(content.contains("Body one."));
        assert!(content.contains("Body two."));
        assert!(content.contains("Body three."));
        // Front-matter close plus two batch separators.
        assert_eq!(content.matches("\n---\n\n").count(), 3);
    }

    #[test]
    fn test_close_day_sets_status() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DailyWriter::new(dir.path());
        writer.append_to_daily("2026-02-10", "Narration.").unwrap();

        assert_eq!(writer.daily_status("2026-02-10").unwrap(), "open");
        writer.close_day("2026-02-10").unwrap();
        assert_eq!(writer.daily_status("2026-02-10").unwrap(), "closed");

        let content = std::fs::read_to_string(dir.path().join("Daily/2026-02-10.md")).unwrap();
        assert!(content.contains("Narration."));
    }

    #[test]
    fn test_close_missing_day_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DailyWriter::new(dir.path());
        writer.close_day("2026-02-10").unwrap();
        assert_eq!(writer.daily_status("2026-02-10").unwrap(), "");
    }

    #[test]
    fn test_update_frontmatter_adds_missing_field() {
        let content = "---\ndate: 2026-02-10\n---\n\nBody.";
        let updated = update_frontmatter_field(content, "status", "closed");
        assert!(updated.contains("status: closed"));
        assert!(updated.contains("Body."));
    }
}
