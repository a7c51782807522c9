//! Journal state and the narration audit log under `Journal/_meta/`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::narrator::types::{JournalState, NarrationMapping};
use crate::vault::writer;

pub struct StateManager {
    meta_path: PathBuf,
}

impl StateManager {
    pub fn new(journal_path: &Path) -> Self {
        Self {
            meta_path: journal_path.join("_meta"),
        }
    }

    /// Creates Raw/, Daily/ and _meta/ under the journal directory.
    pub fn ensure_directories(journal_path: &Path) -> anyhow::Result<()> {
        for dir in ["Raw", "Daily", "_meta"] {
            std::fs::create_dir_all(journal_path.join(dir))?;
        }
        Ok(())
    }

    /// Loads state, or the initial state when no file exists yet.
    pub fn load(&self) -> anyhow::Result<JournalState> {
        let path = self.meta_path.join("journal_state.json");
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JournalState::initial()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persists state with write-temp-then-rename, stamping
    /// `last_update_at`.
    pub fn save(&self, state: &JournalState) -> anyhow::Result<()> {
        let mut state = state.clone();
        state.last_update_at = Some(Utc::now());

        let path = self.meta_path.join("journal_state.json");
        let data = serde_json::to_vec_pretty(&state)?;
        writer::write_atomic(&path, &data)
    }

    /// Appends one audit line to `journal_map.jsonl`. Narration is
    /// serialised at the batch level, so no lock is needed here.
    pub fn append_mapping(&self, mapping: &NarrationMapping) -> anyhow::Result<()> {
        let path = self.meta_path.join("journal_map.jsonl");
        let line = serde_json::to_vec(mapping)?;
        writer::append_line(&path, &line)
    }
}
