//! Durable store: a single SQLite file in WAL mode holding captures, the
//! pending-clarification queue, letters, transactions, scheduler runs and
//! the signal table. All timestamps cross this boundary as UTC RFC3339
//! strings.

mod migrations;

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub capture_id: String,
    pub actor: String,
    pub mode: String,
    pub raw_text: String,
    pub routed_to: String,
    pub confidence: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PendingClarification {
    pub capture_id: String,
    pub actor: String,
    pub raw_text: String,
    pub choices: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub original_ts: Option<DateTime<Utc>>,
    pub device_id: String,
}

#[derive(Debug, Clone)]
pub struct ExpiredCapture {
    pub capture_id: String,
    pub actor: String,
    pub raw_text: String,
}

#[derive(Debug, Clone)]
pub struct LetterRecord {
    pub letter_id: String,
    pub letter_type: String,
    pub for_date: String,
    pub actor: String,
    pub created_at: String,
    pub file_path: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerRun {
    pub id: i64,
    pub actor: String,
    pub job_type: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: String,
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub key: String,
    pub signal_type: String,
    pub weight: f64,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ever_dominant: bool,
}

pub struct Store {
    pool: SqlitePool,
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

impl Store {
    /// Opens (creating if missing) the database file, enables WAL journaling
    /// with a 5 s busy timeout, and runs migrations.
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        migrations::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // -----------------------------------------------------------------
    // Capture log
    // -----------------------------------------------------------------

    /// Inserts a capture row. A duplicate capture_id violates the UNIQUE
    /// constraint and is surfaced as an error.
    pub async fn log_capture(
        &self,
        capture_id: &str,
        actor: &str,
        mode: &str,
        raw_text: &str,
        routed_to: &str,
        status: &str,
        confidence: f64,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO capture_log (capture_id, actor, mode, raw_text, routed_to, confidence, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(capture_id)
        .bind(actor)
        .bind(mode)
        .bind(raw_text)
        .bind(routed_to)
        .bind(confidence)
        .bind(status)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Captures for an actor since `since`, newest first, capped at 100.
    /// Includes every status; letter generation wants the full window.
    pub async fn get_recent_captures(
        &self,
        actor: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<CaptureRecord>> {
        let rows = sqlx::query(
            "SELECT capture_id, actor, mode, raw_text, routed_to, confidence, status, created_at
             FROM capture_log
             WHERE actor = ? AND created_at >= ?
             ORDER BY created_at DESC
             LIMIT 100",
        )
        .bind(actor)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CaptureRecord {
                capture_id: r.get("capture_id"),
                actor: r.get("actor"),
                mode: r.get("mode"),
                raw_text: r.get("raw_text"),
                routed_to: r.get::<Option<String>, _>("routed_to").unwrap_or_default(),
                confidence: r.get::<Option<f64>, _>("confidence").unwrap_or_default(),
                status: r.get("status"),
                created_at: parse_ts(&r.get::<String, _>("created_at")),
            })
            .collect())
    }

    // -----------------------------------------------------------------
    // Pending clarifications
    // -----------------------------------------------------------------

    /// Queues a clarification. Expiry is fixed at created_at + 24 h.
    pub async fn add_pending(
        &self,
        capture_id: &str,
        actor: &str,
        raw_text: &str,
        choices: &[String],
        original_ts: DateTime<Utc>,
        device_id: &str,
    ) -> anyhow::Result<()> {
        let now = Utc::now();
        let expires = now + chrono::Duration::hours(24);
        sqlx::query(
            "INSERT INTO pending_clarifications
                 (capture_id, actor, raw_text, choices, created_at, expires_at, original_ts, device_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(capture_id)
        .bind(actor)
        .bind(raw_text)
        .bind(serde_json::to_string(choices)?)
        .bind(now.to_rfc3339())
        .bind(expires.to_rfc3339())
        .bind(original_ts.to_rfc3339())
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Active rows (unresolved, unexpired) for an actor, oldest first.
    pub async fn get_pending(&self, actor: &str) -> anyhow::Result<Vec<PendingClarification>> {
        let rows = sqlx::query(
            "SELECT capture_id, actor, raw_text, choices, created_at, expires_at, original_ts, device_id
             FROM pending_clarifications
             WHERE actor = ? AND resolved_at IS NULL AND expires_at > ?
             ORDER BY created_at ASC",
        )
        .bind(actor)
        .bind(Utc::now().to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_pending).collect())
    }

    /// An unresolved row by id, regardless of expiry. The handler
    /// distinguishes not-found from expired-but-not-yet-swept.
    pub async fn get_pending_by_id(
        &self,
        capture_id: &str,
    ) -> anyhow::Result<Option<PendingClarification>> {
        let row = sqlx::query(
            "SELECT capture_id, actor, raw_text, choices, created_at, expires_at, original_ts, device_id
             FROM pending_clarifications
             WHERE capture_id = ? AND resolved_at IS NULL",
        )
        .bind(capture_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_pending))
    }

    /// Conditionally resolves an active row. True iff exactly one row
    /// changed; a race with expiry or a double clarify returns false.
    pub async fn resolve_pending(
        &self,
        capture_id: &str,
        destination: &str,
    ) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE pending_clarifications
             SET resolved_at = ?, destination = ?
             WHERE capture_id = ? AND resolved_at IS NULL AND expires_at > ?",
        )
        .bind(&now)
        .bind(destination)
        .bind(capture_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Atomically sweeps every active row past its expiry: selects, then
    /// marks resolved with destination 'expired', in one transaction.
    /// Returns the swept rows so the caller can log them.
    pub async fn expire_pending(&self) -> anyhow::Result<Vec<ExpiredCapture>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT capture_id, actor, raw_text
             FROM pending_clarifications
             WHERE resolved_at IS NULL AND expires_at <= ?",
        )
        .bind(&now)
        .fetch_all(&mut *tx)
        .await?;

        let expired: Vec<ExpiredCapture> = rows
            .into_iter()
            .map(|r| ExpiredCapture {
                capture_id: r.get("capture_id"),
                actor: r.get("actor"),
                raw_text: r.get("raw_text"),
            })
            .collect();

        sqlx::query(
            "UPDATE pending_clarifications
             SET resolved_at = ?, destination = 'expired'
             WHERE resolved_at IS NULL AND expires_at <= ?",
        )
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(expired)
    }

    // -----------------------------------------------------------------
    // Letters
    // -----------------------------------------------------------------

    pub async fn save_letter(
        &self,
        letter_id: &str,
        letter_type: &str,
        for_date: &str,
        actor: &str,
        file_path: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO letters (letter_id, type, for_date, actor, created_at, file_path)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(letter_id) DO UPDATE SET
                 created_at = excluded.created_at,
                 file_path = excluded.file_path",
        )
        .bind(letter_id)
        .bind(letter_type)
        .bind(for_date)
        .bind(actor)
        .bind(Utc::now().to_rfc3339())
        .bind(file_path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_letters(
        &self,
        actor: &str,
        letter_type: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<LetterRecord>> {
        let mut query =
            String::from("SELECT letter_id, type, for_date, actor, created_at, file_path FROM letters WHERE actor = ?");
        if !letter_type.is_empty() && letter_type != "all" {
            query.push_str(" AND type = ?");
        }
        if since.is_some() {
            query.push_str(" AND created_at >= ?");
        }
        query.push_str(" ORDER BY created_at DESC LIMIT 50");

        let mut q = sqlx::query(&query).bind(actor);
        if !letter_type.is_empty() && letter_type != "all" {
            q = q.bind(letter_type);
        }
        if let Some(since) = since {
            q = q.bind(since.to_rfc3339());
        }

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| LetterRecord {
                letter_id: r.get("letter_id"),
                letter_type: r.get("type"),
                for_date: r.get("for_date"),
                actor: r.get("actor"),
                created_at: r.get("created_at"),
                file_path: r.get("file_path"),
            })
            .collect())
    }

    // -----------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn log_transaction(
        &self,
        txn_id: &str,
        capture_id: &str,
        actor: &str,
        amount: f64,
        currency: &str,
        merchant: &str,
        label: &str,
        notes: &str,
        confidence: f64,
        raw_text: &str,
        device_id: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO transactions
                 (txn_id, capture_id, actor, amount, currency, merchant, label, notes, confidence, raw_text, device_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(txn_id)
        .bind(capture_id)
        .bind(actor)
        .bind(amount)
        .bind(currency)
        .bind(merchant)
        .bind(label)
        .bind(notes)
        .bind(confidence)
        .bind(raw_text)
        .bind(device_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Scheduler runs
    // -----------------------------------------------------------------

    pub async fn start_scheduler_run(&self, actor: &str, job_type: &str) -> anyhow::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO scheduler_runs (actor, job_type, status, started_at)
             VALUES (?, ?, 'running', ?)",
        )
        .bind(actor)
        .bind(job_type)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn complete_scheduler_run(&self, run_id: i64, error: Option<&str>) -> anyhow::Result<()> {
        let status = if error.is_some() { "failed" } else { "completed" };
        sqlx::query(
            "UPDATE scheduler_runs SET status = ?, completed_at = ?, error_message = ? WHERE id = ?",
        )
        .bind(status)
        .bind(Utc::now().to_rfc3339())
        .bind(error.unwrap_or(""))
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_last_scheduler_run(
        &self,
        actor: &str,
        job_type: &str,
    ) -> anyhow::Result<Option<SchedulerRun>> {
        let row = sqlx::query(
            "SELECT id, actor, job_type, status, started_at, completed_at, error_message
             FROM scheduler_runs
             WHERE actor = ? AND job_type = ?
             ORDER BY started_at DESC
             LIMIT 1",
        )
        .bind(actor)
        .bind(job_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SchedulerRun {
            id: r.get("id"),
            actor: r.get("actor"),
            job_type: r.get("job_type"),
            status: r.get("status"),
            started_at: parse_ts(&r.get::<String, _>("started_at")),
            completed_at: r
                .get::<Option<String>, _>("completed_at")
                .map(|s| parse_ts(&s)),
            error_message: r
                .get::<Option<String>, _>("error_message")
                .unwrap_or_default(),
        }))
    }

    // -----------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------

    pub async fn get_signal(&self, key: &str) -> anyhow::Result<Option<Signal>> {
        let row = sqlx::query(
            "SELECT key, type, weight, last_updated, created_at, ever_dominant
             FROM signals WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_signal))
    }

    /// Inserts or replaces a signal weight. `last_updated` is always bumped
    /// to now; the caller has already applied lazy decay.
    pub async fn upsert_signal(
        &self,
        key: &str,
        signal_type: &str,
        weight: f64,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO signals (key, type, weight, last_updated, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET weight = excluded.weight, last_updated = excluded.last_updated",
        )
        .bind(key)
        .bind(signal_type)
        .bind(weight)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_top_signals(
        &self,
        signal_type: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<Signal>> {
        let rows = sqlx::query(
            "SELECT key, type, weight, last_updated, created_at, ever_dominant
             FROM signals WHERE type = ?
             ORDER BY weight DESC
             LIMIT ?",
        )
        .bind(signal_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_signal).collect())
    }

    pub async fn get_all_signals(&self) -> anyhow::Result<Vec<Signal>> {
        let rows = sqlx::query(
            "SELECT key, type, weight, last_updated, created_at, ever_dominant FROM signals",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_signal).collect())
    }

    pub async fn update_signal_weight(&self, key: &str, weight: f64) -> anyhow::Result<()> {
        sqlx::query("UPDATE signals SET weight = ?, last_updated = ? WHERE key = ?")
            .bind(weight)
            .bind(Utc::now().to_rfc3339())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sets the ever_dominant floor flag. Meaningful for projects only.
    pub async fn mark_dominant(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE signals SET ever_dominant = 1 WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_signal(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM signals WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Cheap liveness probe for the health endpoint.
    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Raw pool access for tests that need to backdate rows.
    #[cfg(test)]
    pub(crate) fn pool_for_tests(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_pending(r: sqlx::sqlite::SqliteRow) -> PendingClarification {
    let choices: Vec<String> =
        serde_json::from_str(&r.get::<String, _>("choices")).unwrap_or_default();
    PendingClarification {
        capture_id: r.get("capture_id"),
        actor: r.get("actor"),
        raw_text: r.get("raw_text"),
        choices,
        created_at: parse_ts(&r.get::<String, _>("created_at")),
        expires_at: parse_ts(&r.get::<String, _>("expires_at")),
        original_ts: r
            .get::<Option<String>, _>("original_ts")
            .map(|s| parse_ts(&s)),
        device_id: r.get::<Option<String>, _>("device_id").unwrap_or_default(),
    }
}

fn row_to_signal(r: sqlx::sqlite::SqliteRow) -> Signal {
    Signal {
        key: r.get("key"),
        signal_type: r.get("type"),
        weight: r.get("weight"),
        last_updated: parse_ts(&r.get::<String, _>("last_updated")),
        created_at: parse_ts(&r.get::<String, _>("created_at")),
        ever_dominant: r.get::<i64, _>("ever_dominant") != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) async fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::open(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_log_capture_rejects_duplicate_id() {
        let (store, _dir) = temp_store().await;
        store
            .log_capture("cap_1", "wolf", "note", "text", "Ideas", "filed", 0.9)
            .await
            .unwrap();
        let dup = store
            .log_capture("cap_1", "wolf", "note", "text", "Ideas", "filed", 0.9)
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_recent_captures_window_and_order() {
        let (store, _dir) = temp_store().await;
        store
            .log_capture("cap_a", "wolf", "note", "first", "Ideas", "filed", 0.9)
            .await
            .unwrap();
        store
            .log_capture("cap_b", "wolf", "note", "second", "Health", "filed", 0.8)
            .await
            .unwrap();
        store
            .log_capture("cap_c", "wife", "note", "other actor", "Life", "filed", 0.8)
            .await
            .unwrap();

        let since = Utc::now() - chrono::Duration::hours(1);
        let captures = store.get_recent_captures("wolf", since).await.unwrap();
        assert_eq!(captures.len(), 2);
        assert!(captures.iter().all(|c| c.actor == "wolf"));
    }

    #[tokio::test]
    async fn test_pending_lifecycle() {
        let (store, _dir) = temp_store().await;
        let choices = vec!["Ideas".to_string(), "Projects".to_string()];
        store
            .add_pending("cap_p", "wolf", "ambiguous", &choices, Utc::now(), "d1")
            .await
            .unwrap();

        let pending = store.get_pending("wolf").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].choices, choices);
        // expires_at = created_at + 24h
        let delta = pending[0].expires_at - pending[0].created_at;
        assert_eq!(delta.num_hours(), 24);

        assert!(store.resolve_pending("cap_p", "Projects").await.unwrap());
        // Second resolve is a no-op.
        assert!(!store.resolve_pending("cap_p", "Ideas").await.unwrap());
        assert!(store.get_pending("wolf").await.unwrap().is_empty());
        assert!(store.get_pending_by_id("cap_p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expire_pending_sweeps_only_overdue() {
        let (store, _dir) = temp_store().await;
        store
            .add_pending("cap_old", "wolf", "stale", &["Ideas".to_string()], Utc::now(), "d1")
            .await
            .unwrap();
        store
            .add_pending("cap_new", "wolf", "fresh", &["Ideas".to_string()], Utc::now(), "d1")
            .await
            .unwrap();

        // Backdate one row past its expiry.
        let past = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        sqlx::query("UPDATE pending_clarifications SET expires_at = ? WHERE capture_id = 'cap_old'")
            .bind(&past)
            .execute(&store.pool)
            .await
            .unwrap();

        let expired = store.expire_pending().await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].capture_id, "cap_old");

        // The fresh row is still active; the swept one cannot be resolved.
        assert_eq!(store.get_pending("wolf").await.unwrap().len(), 1);
        assert!(!store.resolve_pending("cap_old", "Ideas").await.unwrap());
        // Idempotent: a second sweep finds nothing.
        assert!(store.expire_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_letters_actor_filter() {
        let (store, _dir) = temp_store().await;
        store
            .save_letter("let_2026-02-10_wolf_daily", "daily", "2026-02-10", "wolf", "Letters/Daily/2026-02-10.md")
            .await
            .unwrap();
        store
            .save_letter("let_2026-02-10_wife_daily", "daily", "2026-02-10", "wife", "Letters/Daily/2026-02-10.md")
            .await
            .unwrap();
        store
            .save_letter("let_2026-W06_wolf_weekly", "weekly", "2026-W06", "wolf", "Letters/Weekly/2026-W06.md")
            .await
            .unwrap();

        let all = store.get_letters("wolf", "", None).await.unwrap();
        assert_eq!(all.len(), 2);
        let daily = store.get_letters("wolf", "daily", None).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].letter_id, "let_2026-02-10_wolf_daily");

        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(store.get_letters("wolf", "", Some(future)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signal_upsert_and_dominance() {
        let (store, _dir) = temp_store().await;
        store.upsert_signal("term:sleep", "term", 1.0).await.unwrap();
        store.upsert_signal("term:sleep", "term", 2.0).await.unwrap();

        let s = store.get_signal("term:sleep").await.unwrap().unwrap();
        assert_eq!(s.weight, 2.0);
        assert!(!s.ever_dominant);

        store.upsert_signal("project:trip", "project", 3.0).await.unwrap();
        store.mark_dominant("project:trip").await.unwrap();
        let p = store.get_signal("project:trip").await.unwrap().unwrap();
        assert!(p.ever_dominant);

        let top = store.get_top_signals("term", 10).await.unwrap();
        assert_eq!(top.len(), 1);

        store.delete_signal("term:sleep").await.unwrap();
        assert!(store.get_signal("term:sleep").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scheduler_run_tracking() {
        let (store, _dir) = temp_store().await;
        let id = store.start_scheduler_run("wolf", "daily-letters").await.unwrap();
        store.complete_scheduler_run(id, None).await.unwrap();

        let run = store
            .get_last_scheduler_run("wolf", "daily-letters")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.status, "completed");
        assert!(run.completed_at.is_some());

        let id2 = store.start_scheduler_run("wolf", "daily-letters").await.unwrap();
        store
            .complete_scheduler_run(id2, Some("llm unreachable"))
            .await
            .unwrap();
        let run2 = store
            .get_last_scheduler_run("wolf", "daily-letters")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run2.status, "failed");
        assert_eq!(run2.error_message, "llm unreachable");
    }
}
