//! Filesystem primitives for the vault: write-temp-then-rename and
//! fsync'd append, both with bounded retry.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;

/// Writes `content` to `path` atomically: a uniquely-named temp file in the
/// same directory is written, flushed, fsynced and renamed into place, so a
/// concurrent reader never observes a partial file. Retries up to 3 times
/// with 100 ms / 200 ms backoff.
pub fn write_atomic(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            std::thread::sleep(Duration::from_millis(100 * (1 << (attempt - 1))));
        }
        match write_atomic_once(path, content) {
            Ok(()) => return Ok(()),
            Err(e) => last_err = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "after {} attempts: {}",
        MAX_ATTEMPTS,
        last_err.expect("at least one attempt ran")
    ))
}

fn write_atomic_once(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path {} has no parent directory", path.display()))?;
    fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));

    let result = (|| -> anyhow::Result<()> {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(content)?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Appends `line` to `path`, creating the file (and parent directories) if
/// needed. A trailing newline is guaranteed; the write is fsynced. Same
/// retry policy as [`write_atomic`].
///
/// Append ordering across tasks is the caller's concern: the vault holds a
/// mutex per append-only file.
pub fn append_line(path: &Path, line: &[u8]) -> anyhow::Result<()> {
    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            std::thread::sleep(Duration::from_millis(100 * (1 << (attempt - 1))));
        }
        match append_line_once(path, line) {
            Ok(()) => return Ok(()),
            Err(e) => last_err = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "after {} attempts: {}",
        MAX_ATTEMPTS,
        last_err.expect("at least one attempt ran")
    ))
}

fn append_line_once(path: &Path, line: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path {} has no parent directory", path.display()))?;
    fs::create_dir_all(dir)?;

    let mut f = OpenOptions::new().append(true).create(true).open(path)?;
    f.write_all(line)?;
    if line.last() != Some(&b'\n') {
        f.write_all(b"\n")?;
    }
    f.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.md");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_write_atomic_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        write_atomic(&path, b"first version with some length").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        write_atomic(&path, b"content").unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_append_line_adds_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_line(&path, b"{\"a\":1}").unwrap();
        append_line(&path, b"{\"b\":2}\n").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\":1}\n{\"b\":2}\n");
    }
}
