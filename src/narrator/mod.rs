//! Journal narrator: turns raw captures into grounded first-person prose
//! with an audit trail and crash-safe state.

pub mod pipeline;
pub mod prompts;
pub mod scanner;
pub mod state;
pub mod types;
pub mod writer;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use pipeline::{JournalLlm, Pipeline};
use scanner::Scanner;
use state::StateManager;
use types::{JournalState, NarrationConfig, NarrationMapping, RawEntry};
use writer::DailyWriter;

#[derive(Debug, Default, Serialize)]
pub struct UpdateResult {
    pub processed: usize,
    pub days: Vec<String>,
    pub errors: Vec<String>,
}

pub struct Narrator {
    config: NarrationConfig,
    state: StateManager,
    scanner: Scanner,
    pipeline: Pipeline,
    writer: DailyWriter,
    /// Serialises update runs: the watermark advance assumes one scan
    /// processes at a time.
    update_lock: Mutex<()>,
}

impl Narrator {
    pub fn new(llm: Arc<dyn JournalLlm>, config: NarrationConfig) -> anyhow::Result<Self> {
        let journal_path: PathBuf = config.vault_path.join(&config.journal_dir);
        StateManager::ensure_directories(&journal_path)?;

        Ok(Self {
            state: StateManager::new(&journal_path),
            scanner: Scanner::new(&journal_path, config.timezone),
            pipeline: Pipeline::new(llm, &config.model, config.max_retries),
            writer: DailyWriter::new(&journal_path),
            config,
            update_lock: Mutex::new(()),
        })
    }

    /// Processes all unprocessed raw entries into daily files. Re-running
    /// with no new files is a no-op: the watermark skips everything
    /// already narrated.
    pub async fn update(&self) -> anyhow::Result<UpdateResult> {
        let _guard = self.update_lock.lock().await;

        let mut state = self.state.load()?;
        let entries = self.scanner.scan_unprocessed(state.last_processed_ts)?;

        let mut result = UpdateResult::default();
        if entries.is_empty() {
            return Ok(result);
        }

        info!(count = entries.len(), "Narrator found unprocessed entries");

        let by_date = scanner::group_by_date(&entries);
        for date in scanner::unique_dates(&entries) {
            let day_entries = &by_date[&date];

            for batch in day_entries.chunks(self.config.batch_size) {
                match self.process_batch(&date, batch, &mut state).await {
                    Ok(()) => result.processed += batch.len(),
                    Err(e) => {
                        let msg = format!("failed to process batch for {}: {}", date, e);
                        warn!("Narrator: {}", msg);
                        result.errors.push(msg);
                        continue;
                    }
                }
            }

            result.days.push(date);
        }

        self.state.save(&state)?;
        info!(
            processed = result.processed,
            days = result.days.len(),
            "Narrator update complete"
        );
        Ok(result)
    }

    async fn process_batch(
        &self,
        date: &str,
        batch: &[RawEntry],
        state: &mut JournalState,
    ) -> anyhow::Result<()> {
        let outcome = self.pipeline.process(batch).await?;

        self.writer.append_to_daily(date, &outcome.narrated_text)?;

        let mapping = NarrationMapping {
            day: date.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            raw_files: outcome.raw_files,
            model: self.config.model.clone(),
            verifier_passed: outcome.verified,
        };
        if let Err(e) = self.state.append_mapping(&mapping) {
            warn!("Narrator: failed to append mapping: {}", e);
        }

        let last = batch.last().expect("batch is non-empty");
        state.last_processed_raw = last.filename.clone();
        state.last_processed_ts = Some(last.created);
        state.current_day = date.to_string();

        Ok(())
    }

    /// Nightly close: a final update sweep, then the day's file and state
    /// are marked closed.
    pub async fn nightly_close(&self) -> anyhow::Result<()> {
        let now = Utc::now().with_timezone(&self.config.timezone);
        let today = now.format("%Y-%m-%d").to_string();

        if let Err(e) = self.update().await {
            warn!("Narrator: update before close failed: {}", e);
        }

        self.writer.close_day(&today)?;

        let mut state = self.state.load()?;
        state.day_status = "closed".to_string();
        state.last_night_run_at = Some(Utc::now());
        self.state.save(&state)?;

        info!(day = %today, "Journal day closed");
        Ok(())
    }

    pub fn status(&self) -> anyhow::Result<JournalState> {
        self.state.load()
    }
}
