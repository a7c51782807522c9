//! Wall-clock job scheduling: cron expressions evaluated in the configured
//! timezone on a 30 s tick, each job bounded by its own timeout. Missed
//! triggers (e.g. across a restart) are not back-filled; the next run is
//! always computed from now.

pub mod ideas;
pub mod letters;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use croner::Cron;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::db::Store;
use crate::llm::OllamaClient;
use crate::narrator::Narrator;
use crate::types::STATUS_EXPIRED;
use crate::vault::{CaptureLogEntry, Vault};
use letters::LetterGenerator;

const TICK_INTERVAL: Duration = Duration::from_secs(30);
const LETTER_JOB_TIMEOUT: Duration = Duration::from_secs(300);
const MANUAL_LETTER_TIMEOUT: Duration = Duration::from_secs(120);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
enum JobKind {
    SignalDecay,
    DailyLetters,
    WeeklyLetters,
    ExpirePending,
    HealthCheck,
    JournalClose,
}

struct JobSpec {
    name: &'static str,
    kind: JobKind,
    cron: &'static str,
    timeout: Option<Duration>,
}

const JOBS: [JobSpec; 6] = [
    JobSpec {
        name: "signal-decay",
        kind: JobKind::SignalDecay,
        cron: "45 3 * * *",
        timeout: None,
    },
    JobSpec {
        name: "daily-letters",
        kind: JobKind::DailyLetters,
        cron: "50 3 * * *",
        timeout: Some(LETTER_JOB_TIMEOUT),
    },
    JobSpec {
        name: "weekly-letters",
        kind: JobKind::WeeklyLetters,
        cron: "50 3 * * 0",
        timeout: Some(LETTER_JOB_TIMEOUT),
    },
    JobSpec {
        name: "expire-pending",
        kind: JobKind::ExpirePending,
        cron: "0 * * * *",
        timeout: None,
    },
    JobSpec {
        name: "health-check",
        kind: JobKind::HealthCheck,
        cron: "*/5 * * * *",
        timeout: Some(HEALTH_CHECK_TIMEOUT),
    },
    JobSpec {
        name: "journal-close",
        kind: JobKind::JournalClose,
        cron: "55 23 * * *",
        timeout: Some(LETTER_JOB_TIMEOUT),
    },
];

pub struct Scheduler {
    store: Arc<Store>,
    vault: Arc<Vault>,
    llm: Arc<OllamaClient>,
    narrator: Arc<Narrator>,
    letter_gen: LetterGenerator,
    timezone: Tz,
    actors: Vec<String>,
}

pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stop(self) {
        self.task.abort();
        info!("Scheduler stopped");
    }
}

impl Scheduler {
    pub fn new(
        store: Arc<Store>,
        vault: Arc<Vault>,
        llm: Arc<OllamaClient>,
        narrator: Arc<Narrator>,
        timezone: Tz,
        actors: Vec<String>,
    ) -> Self {
        Self {
            letter_gen: LetterGenerator::new(store.clone(), llm.clone()),
            store,
            vault,
            llm,
            narrator,
            timezone,
            actors,
        }
    }

    /// Spawns the tick loop as a background task.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let task = tokio::spawn(async move {
            let mut slots: Vec<(usize, Cron, DateTime<Utc>)> = Vec::new();
            for (i, spec) in JOBS.iter().enumerate() {
                match Cron::new(spec.cron).parse() {
                    Ok(cron) => match self.next_run(&cron) {
                        Ok(next) => slots.push((i, cron, next)),
                        Err(e) => error!(job = spec.name, "No next occurrence: {}", e),
                    },
                    Err(e) => error!(job = spec.name, "Invalid cron expression: {}", e),
                }
            }
            info!(jobs = slots.len(), "Scheduler started");

            loop {
                tokio::time::sleep(TICK_INTERVAL).await;
                let now = Utc::now();
                for (idx, cron, next_run) in slots.iter_mut() {
                    if now < *next_run {
                        continue;
                    }
                    let spec = &JOBS[*idx];
                    self.run_job(spec).await;
                    match self.next_run(cron) {
                        Ok(next) => *next_run = next,
                        Err(e) => {
                            error!(job = spec.name, "Failed to compute next run: {}", e);
                            // Push far into the future rather than hot-loop.
                            *next_run = now + chrono::Duration::days(3650);
                        }
                    }
                }
            }
        });
        SchedulerHandle { task }
    }

    fn next_run(&self, cron: &Cron) -> anyhow::Result<DateTime<Utc>> {
        let now = Utc::now().with_timezone(&self.timezone);
        let next = cron
            .find_next_occurrence(&now, false)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(next.with_timezone(&Utc))
    }

    async fn run_job(&self, spec: &JobSpec) {
        info!(job = spec.name, "Running scheduled job");
        let work = self.dispatch(spec.kind);
        let outcome = match spec.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, work).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("job timed out after {:?}", timeout)),
            },
            None => work.await,
        };
        if let Err(e) = outcome {
            // Scheduler jobs never take the process down.
            error!(job = spec.name, "Scheduled job failed: {}", e);
        }
    }

    async fn dispatch(&self, kind: JobKind) -> anyhow::Result<()> {
        match kind {
            JobKind::SignalDecay => crate::signals::decay::decay_all(&self.store).await,
            JobKind::DailyLetters => {
                for actor in &self.actors {
                    self.generate_daily_for_actor(actor).await;
                }
                Ok(())
            }
            JobKind::WeeklyLetters => {
                for actor in &self.actors {
                    self.generate_weekly_for_actor(actor).await;
                }
                Ok(())
            }
            JobKind::ExpirePending => self.expire_pending().await,
            JobKind::HealthCheck => {
                if let Err(e) = self.llm.health_check().await {
                    warn!("Health check failed - Ollama unreachable: {}", e);
                }
                Ok(())
            }
            JobKind::JournalClose => self.narrator.nightly_close().await,
        }
    }

    async fn generate_daily_for_actor(&self, actor: &str) {
        let run_id = match self.store.start_scheduler_run(actor, "daily-letters").await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(actor = %actor, "Failed to record scheduler run: {}", e);
                None
            }
        };

        let result = self.write_daily_letter(actor).await;
        if let Some(run_id) = run_id {
            let err_msg = result.as_ref().err().map(|e| e.to_string());
            if let Err(e) = self
                .store
                .complete_scheduler_run(run_id, err_msg.as_deref())
                .await
            {
                warn!(actor = %actor, "Failed to complete scheduler run: {}", e);
            }
        }
        if let Err(e) = result {
            error!(actor = %actor, "Daily letter generation failed: {}", e);
        }
    }

    async fn write_daily_letter(&self, actor: &str) -> anyhow::Result<()> {
        let now = Utc::now();
        let local = now.with_timezone(&self.timezone);
        let content = self.letter_gen.generate_daily(actor, now).await?;

        let today = local.format("%Y-%m-%d").to_string();
        let letter_id = format!("let_{}_{}_daily", today, actor);
        let letter = crate::vault::Letter {
            id: letter_id.clone(),
            letter_type: "daily".to_string(),
            for_date: today.clone(),
            actor: actor.to_string(),
            content,
        };
        let path = self.vault.write_letter(&letter)?;
        self.store
            .save_letter(&letter_id, "daily", &today, actor, &path)
            .await?;
        info!(actor = %actor, path = %path, "Generated daily letter");
        Ok(())
    }

    async fn generate_weekly_for_actor(&self, actor: &str) {
        let run_id = match self.store.start_scheduler_run(actor, "weekly-letters").await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(actor = %actor, "Failed to record scheduler run: {}", e);
                None
            }
        };

        let result = self.write_weekly_letter(actor).await;
        if let Some(run_id) = run_id {
            let err_msg = result.as_ref().err().map(|e| e.to_string());
            if let Err(e) = self
                .store
                .complete_scheduler_run(run_id, err_msg.as_deref())
                .await
            {
                warn!(actor = %actor, "Failed to complete scheduler run: {}", e);
            }
        }
        if let Err(e) = result {
            error!(actor = %actor, "Weekly letter generation failed: {}", e);
        }
    }

    async fn write_weekly_letter(&self, actor: &str) -> anyhow::Result<()> {
        let now = Utc::now();
        let local = now.with_timezone(&self.timezone);
        let content = self.letter_gen.generate_weekly(actor, now).await?;

        let iso = local.iso_week();
        let week = format!("{}-W{:02}", iso.year(), iso.week());
        let letter_id = format!("let_{}_{}_weekly", week, actor);
        let letter = crate::vault::Letter {
            id: letter_id.clone(),
            letter_type: "weekly".to_string(),
            for_date: week.clone(),
            actor: actor.to_string(),
            content,
        };
        let path = self.vault.write_letter(&letter)?;
        self.store
            .save_letter(&letter_id, "weekly", &week, actor, &path)
            .await?;
        info!(actor = %actor, path = %path, "Generated weekly letter");
        Ok(())
    }

    /// Sweeps overdue clarifications and appends an expired entry to the
    /// vault capture log for each.
    async fn expire_pending(&self) -> anyhow::Result<()> {
        let expired = self.store.expire_pending().await?;
        if expired.is_empty() {
            return Ok(());
        }

        info!(count = expired.len(), "Expired pending clarifications");
        for e in &expired {
            let entry = CaptureLogEntry::new(
                &e.capture_id,
                &e.actor,
                "note",
                &e.raw_text,
                "",
                STATUS_EXPIRED,
                "",
                0.0,
            );
            if let Err(err) = self.vault.log_capture(&entry).await {
                warn!(capture_id = %e.capture_id, "Failed to log expired capture: {}", err);
            }
        }
        Ok(())
    }

    /// Immediate daily letter generation, used by the manual trigger
    /// endpoint.
    pub async fn generate_daily_now(&self, actor: &str) -> anyhow::Result<()> {
        tokio::time::timeout(MANUAL_LETTER_TIMEOUT, self.write_daily_letter(actor))
            .await
            .map_err(|_| anyhow::anyhow!("daily letter generation timed out"))?
    }

    /// Immediate weekly letter generation, used by the manual trigger
    /// endpoint.
    pub async fn generate_weekly_now(&self, actor: &str) -> anyhow::Result<()> {
        tokio::time::timeout(MANUAL_LETTER_TIMEOUT, self.write_weekly_letter(actor))
            .await
            .map_err(|_| anyhow::anyhow!("weekly letter generation timed out"))?
    }

    /// Immediate pending sweep, exposed for tests.
    pub async fn expire_pending_now(&self) -> anyhow::Result<()> {
        self.expire_pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_cron_expressions_parse() {
        for spec in &JOBS {
            let cron: Result<Cron, _> = Cron::new(spec.cron).parse();
            assert!(cron.is_ok(), "cron for {} failed to parse", spec.name);
        }
    }

    #[test]
    fn test_next_occurrence_is_in_the_future() {
        let cron: Cron = Cron::new("45 3 * * *").parse().unwrap();
        let now = Utc::now().with_timezone(&chrono_tz::Europe::London);
        let next = cron.find_next_occurrence(&now, false).unwrap();
        assert!(next > now);
    }
}
