//! Finds and parses raw journal files under `Journal/Raw/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::narrator::types::RawEntry;

// YYYY-MM-DD_HHMMSS_<capture_id>.md
static FILENAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})_(\d{6})_(.+)\.md$").expect("valid regex"));

pub struct Scanner {
    raw_path: PathBuf,
    timezone: Tz,
}

impl Scanner {
    pub fn new(journal_path: &Path, timezone: Tz) -> Self {
        Self {
            raw_path: journal_path.join("Raw"),
            timezone,
        }
    }

    /// Raw entries with `created` strictly after the watermark, sorted
    /// ascending by creation time. Files that fail to parse are skipped
    /// with a warning.
    pub fn scan_unprocessed(
        &self,
        last_processed_ts: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<RawEntry>> {
        let dir = match std::fs::read_dir(&self.raw_path) {
            Ok(dir) => dir,
            // No Raw/ folder yet means nothing to process.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for dirent in dir {
            let dirent = dirent?;
            let name = dirent.file_name().to_string_lossy().to_string();
            if dirent.path().is_dir() || !name.ends_with(".md") {
                continue;
            }

            let entry = match self.parse_raw_file(&name) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(file = %name, "Skipping invalid raw file: {}", e);
                    continue;
                }
            };

            let processed = match last_processed_ts {
                Some(watermark) => entry.created <= watermark,
                None => false,
            };
            if !processed {
                entries.push(entry);
            }
        }

        entries.sort_by_key(|e| e.created);
        Ok(entries)
    }

    fn parse_raw_file(&self, filename: &str) -> anyhow::Result<RawEntry> {
        let captures = FILENAME_PATTERN
            .captures(filename)
            .ok_or_else(|| anyhow::anyhow!("filename doesn't match expected pattern"))?;

        let day_date = captures[1].to_string();
        let time_str = &captures[2];
        let capture_id = captures[3].to_string();

        // Filename timestamps are local to the configured timezone.
        let naive = NaiveDateTime::parse_from_str(
            &format!("{}_{}", day_date, time_str),
            "%Y-%m-%d_%H%M%S",
        )?;
        let created = self
            .timezone
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| anyhow::anyhow!("timestamp not representable in timezone"))?
            .with_timezone(&Utc);

        let path = self.raw_path.join(filename);
        let raw = std::fs::read_to_string(&path)?;
        let (frontmatter, content) = split_frontmatter(&raw);

        let mut entry = RawEntry {
            filename: filename.to_string(),
            id: capture_id,
            created,
            actor: String::new(),
            device: String::new(),
            content,
            day_date,
        };

        // Front-matter overrides filename-derived fields.
        if let Some(id) = frontmatter.get("id") {
            entry.id = id.clone();
        }
        if let Some(actor) = frontmatter.get("actor") {
            entry.actor = actor.clone();
        }
        if let Some(device) = frontmatter.get("device") {
            entry.device = device.clone();
        }
        if let Some(created) = frontmatter.get("created") {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(created) {
                entry.created = parsed.with_timezone(&Utc);
            }
        }

        Ok(entry)
    }
}

/// Splits a markdown file into (front-matter map, body). Files without a
/// leading `---` block get an empty map and the whole text as body.
pub fn split_frontmatter(raw: &str) -> (HashMap<String, String>, String) {
    let mut frontmatter = HashMap::new();
    let mut body_lines: Vec<&str> = Vec::new();

    let mut in_frontmatter = false;
    let mut frontmatter_done = false;

    for (i, line) in raw.lines().enumerate() {
        if i == 0 && line == "---" {
            in_frontmatter = true;
            continue;
        }
        if in_frontmatter && line == "---" {
            in_frontmatter = false;
            frontmatter_done = true;
            continue;
        }
        if in_frontmatter {
            if let Some(idx) = line.find(':') {
                if idx > 0 {
                    frontmatter.insert(
                        line[..idx].trim().to_string(),
                        line[idx + 1..].trim().to_string(),
                    );
                }
            }
            continue;
        }
        // Skip leading blank lines right after the front-matter.
        if frontmatter_done && body_lines.is_empty() && line.is_empty() {
            continue;
        }
        body_lines.push(line);
    }

    (frontmatter, body_lines.join("\n"))
}

/// Groups entries by day date, preserving order within each day.
pub fn group_by_date(entries: &[RawEntry]) -> HashMap<String, Vec<RawEntry>> {
    let mut grouped: HashMap<String, Vec<RawEntry>> = HashMap::new();
    for entry in entries {
        grouped
            .entry(entry.day_date.clone())
            .or_default()
            .push(entry.clone());
    }
    grouped
}

/// Sorted unique day dates.
pub fn unique_dates(entries: &[RawEntry]) -> Vec<String> {
    let mut dates: Vec<String> = entries.iter().map(|e| e.day_date.clone()).collect();
    dates.sort();
    dates.dedup();
    dates
}
