//! The vault: a human-readable tree of markdown and jsonl files. All
//! multi-byte writes go through write-temp-then-rename; the two append-only
//! logs (capture log, per-actor ledgers) are serialised by mutexes owned
//! here.

mod ledger;
mod letters;
mod log;
pub mod writer;

pub use ledger::LedgerTransaction;
pub use letters::{extract_letter_body, Letter};
pub use log::CaptureLogEntry;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;

use crate::types::Category;

/// A note to be written to a category folder (or Journal/Raw/).
#[derive(Debug, Clone)]
pub struct Note {
    pub id: String,
    pub created: DateTime<Utc>,
    pub category: Category,
    pub confidence: f64,
    pub actor: String,
    pub device_id: String,
    pub tags: Vec<String>,
    pub title: String,
    pub content: String,
}

pub struct Vault {
    base_path: PathBuf,
    /// Guards Log/captures.jsonl.
    log_lock: Mutex<()>,
    /// Guards Financial/Ledger/transactions_<actor>.jsonl, one lock per actor.
    ledger_locks: Mutex<HashMap<String, std::sync::Arc<Mutex<()>>>>,
}

impl Vault {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            log_lock: Mutex::new(()),
            ledger_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Writes a note into `<Category>/YYYY-MM-DD-<slug>.md` and returns the
    /// vault-relative path.
    pub fn write_note(&self, note: &Note) -> anyhow::Result<String> {
        let date = note.created.format("%Y-%m-%d");
        let filename = format!("{}-{}.md", date, slugify(&note.title, "note"));
        let rel_path = format!("{}/{}", note.category.as_str(), filename);
        let full_path = self.base_path.join(&rel_path);

        writer::write_atomic(&full_path, build_note_content(note).as_bytes())?;
        Ok(rel_path)
    }

    /// Writes a journal capture into `Journal/Raw/YYYY-MM-DD_HHMMSS_<id>.md`
    /// for the narrator to pick up.
    pub fn write_raw_journal_capture(&self, note: &Note) -> anyhow::Result<String> {
        let filename = format!(
            "{}_{}_{}.md",
            note.created.format("%Y-%m-%d"),
            note.created.format("%H%M%S"),
            note.id
        );
        let rel_path = format!("Journal/Raw/{}", filename);
        let full_path = self.base_path.join(&rel_path);

        let content = format!(
            "---\nid: {}\ncreated: {}\nactor: {}\ndevice: {}\n---\n\n{}\n",
            note.id,
            note.created.to_rfc3339(),
            note.actor,
            note.device_id,
            note.content
        );
        writer::write_atomic(&full_path, content.as_bytes())?;
        Ok(rel_path)
    }

    /// Writes an idea-expansion research file under `Research/Ideas/`.
    pub fn write_research(
        &self,
        idea_id: &str,
        title: &str,
        body: &str,
    ) -> anyhow::Result<String> {
        let date = Utc::now().format("%Y-%m-%d");
        let filename = format!("{}-{}-research.md", date, slugify(title, "idea"));
        let rel_path = format!("Research/Ideas/{}", filename);
        let full_path = self.base_path.join(&rel_path);

        let content = format!(
            "---\nid: {id}_research\nsource_idea: {id}\ncreated: {created}\n---\n\n# Research: {title}\n\n{body}\n",
            id = idea_id,
            created = Utc::now().to_rfc3339(),
            title = title,
            body = body,
        );
        writer::write_atomic(&full_path, content.as_bytes())?;
        Ok(rel_path)
    }
}

fn build_note_content(note: &Note) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("id: {}\n", note.id));
    out.push_str(&format!("created: {}\n", note.created.to_rfc3339()));
    out.push_str(&format!(
        "category: {}\n",
        note.category.as_str().to_lowercase()
    ));
    out.push_str(&format!("confidence: {:.2}\n", note.confidence));
    out.push_str(&format!("actor: {}\n", note.actor));
    out.push_str(&format!("device: {}\n", note.device_id));
    if note.tags.is_empty() {
        out.push_str("tags: []\n");
    } else {
        out.push_str("tags:\n");
        for tag in &note.tags {
            out.push_str(&format!("  - {}\n", tag));
        }
    }
    out.push_str("---\n\n");
    out.push_str(&note.content);
    out.push('\n');
    out
}

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").expect("valid regex"));
static MULTI_HYPHEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));

/// Lowercases, maps spaces/underscores to hyphens, strips everything outside
/// `[a-z0-9-]`, collapses hyphen runs, trims, and truncates to 50 chars.
/// Falls back to `default` when nothing survives.
pub fn slugify(title: &str, default: &str) -> String {
    let lowered = title.to_lowercase().replace([' ', '_'], "-");
    let cleaned = NON_SLUG.replace_all(&lowered, "");
    let collapsed = MULTI_HYPHEN.replace_all(&cleaned, "-");
    let mut slug = collapsed.trim_matches('-').to_string();

    if slug.len() > 50 {
        slug.truncate(50);
        slug = slug.trim_end_matches('-').to_string();
    }

    if slug.is_empty() {
        default.to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn sample_note(category: Category) -> Note {
        Note {
            id: "cap_test1234".to_string(),
            created: "2026-02-10T09:00:00Z".parse().unwrap(),
            category,
            confidence: 0.9,
            actor: "wolf".to_string(),
            device_id: "d1".to_string(),
            tags: vec!["cache".to_string(), "feed".to_string()],
            title: "Prototype eviction cache".to_string(),
            content: "Prototype an eviction cache for the feed".to_string(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Prototype eviction cache", "note"), "prototype-eviction-cache");
        assert_eq!(slugify("Hello, World!", "note"), "hello-world");
        assert_eq!(slugify("snake_case_title", "note"), "snake-case-title");
        assert_eq!(slugify("---", "note"), "note");
        assert_eq!(slugify("", "idea"), "idea");
        assert_eq!(slugify("a  --  b", "note"), "a-b");
        let long = "word ".repeat(30);
        assert!(slugify(&long, "note").len() <= 50);
        assert!(!slugify(&long, "note").ends_with('-'));
    }

    #[test]
    fn test_write_note_path_and_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());
        let rel = vault.write_note(&sample_note(Category::Ideas)).unwrap();
        assert_eq!(rel, "Ideas/2026-02-10-prototype-eviction-cache.md");

        let content = std::fs::read_to_string(dir.path().join(&rel)).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("id: cap_test1234"));
        assert!(content.contains("category: ideas"));
        assert!(content.contains("confidence: 0.90"));
        assert!(content.contains("  - cache"));
        assert!(content.ends_with("Prototype an eviction cache for the feed\n"));
    }

    #[test]
    fn test_write_raw_journal_capture_filename() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());
        let rel = vault
            .write_raw_journal_capture(&sample_note(Category::Journal))
            .unwrap();
        assert_eq!(rel, "Journal/Raw/2026-02-10_090000_cap_test1234.md");
        let content = std::fs::read_to_string(dir.path().join(&rel)).unwrap();
        assert!(content.contains("actor: wolf"));
        assert!(content.contains("device: d1"));
    }
}
