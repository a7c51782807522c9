use chrono::Utc;

use super::{writer, Vault};

/// A daily or weekly letter bound for `Letters/{Daily,Weekly}/<for_date>.md`.
#[derive(Debug, Clone)]
pub struct Letter {
    pub id: String,
    /// "daily" or "weekly"
    pub letter_type: String,
    /// "2026-02-10" or "2026-W06"
    pub for_date: String,
    pub actor: String,
    pub content: String,
}

fn letter_subdir(letter_type: &str) -> anyhow::Result<&'static str> {
    match letter_type {
        "daily" => Ok("Daily"),
        "weekly" => Ok("Weekly"),
        other => anyhow::bail!("unknown letter type: {}", other),
    }
}

impl Vault {
    /// Writes a letter file and returns the vault-relative path.
    pub fn write_letter(&self, letter: &Letter) -> anyhow::Result<String> {
        let subdir = letter_subdir(&letter.letter_type)?;
        let rel_path = format!("Letters/{}/{}.md", subdir, letter.for_date);
        let full_path = self.base_path().join(&rel_path);

        let content = format!(
            "---\nid: {}\ntype: {}\nfor_date: {}\nactor: {}\ncreated: {}\n---\n\n{}\n",
            letter.id,
            letter.letter_type,
            letter.for_date,
            letter.actor,
            Utc::now().to_rfc3339(),
            letter.content,
        );
        writer::write_atomic(&full_path, content.as_bytes())?;
        Ok(rel_path)
    }

    /// Reads a letter file back, front-matter included.
    pub fn read_letter(&self, letter_type: &str, for_date: &str) -> anyhow::Result<String> {
        let subdir = letter_subdir(letter_type)?;
        let path = self
            .base_path()
            .join(format!("Letters/{}/{}.md", subdir, for_date));
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Strips a leading YAML front-matter block, returning just the letter body.
pub fn extract_letter_body(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---\n") else {
        return content;
    };
    match rest.find("\n---") {
        Some(idx) => {
            let after = &rest[idx + 4..];
            after.trim_start_matches(['\n', '\r'])
        }
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_letter() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());
        let letter = Letter {
            id: "let_2026-02-10_wolf_daily".to_string(),
            letter_type: "daily".to_string(),
            for_date: "2026-02-10".to_string(),
            actor: "wolf".to_string(),
            content: "INSIGHT: A steady day.\nACTION: Keep the thread going.".to_string(),
        };
        let rel = vault.write_letter(&letter).unwrap();
        assert_eq!(rel, "Letters/Daily/2026-02-10.md");

        let raw = vault.read_letter("daily", "2026-02-10").unwrap();
        assert!(raw.contains("id: let_2026-02-10_wolf_daily"));
        let body = extract_letter_body(&raw);
        assert!(body.starts_with("INSIGHT: A steady day."));
    }

    #[test]
    fn test_unknown_letter_type_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());
        let letter = Letter {
            id: "x".to_string(),
            letter_type: "monthly".to_string(),
            for_date: "2026-02".to_string(),
            actor: "wolf".to_string(),
            content: "text".to_string(),
        };
        assert!(vault.write_letter(&letter).is_err());
    }

    #[test]
    fn test_extract_letter_body_without_frontmatter() {
        assert_eq!(extract_letter_body("plain text"), "plain text");
    }
}
