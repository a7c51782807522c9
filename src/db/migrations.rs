use sqlx::SqlitePool;
use tracing::info;

/// Creates all tables and indexes. Every statement is idempotent
/// (`IF NOT EXISTS`) so this is safe to run on every startup.
pub(crate) async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS capture_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            capture_id TEXT UNIQUE NOT NULL,
            actor TEXT NOT NULL,
            mode TEXT NOT NULL,
            raw_text TEXT NOT NULL,
            routed_to TEXT,
            confidence REAL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_clarifications (
            capture_id TEXT PRIMARY KEY,
            actor TEXT NOT NULL,
            raw_text TEXT NOT NULL,
            choices TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            resolved_at TEXT,
            destination TEXT,
            original_ts TEXT,
            device_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS letters (
            letter_id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            for_date TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at TEXT NOT NULL,
            file_path TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            txn_id TEXT UNIQUE NOT NULL,
            capture_id TEXT,
            actor TEXT NOT NULL,
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            merchant TEXT NOT NULL,
            label TEXT,
            notes TEXT,
            confidence REAL,
            raw_text TEXT,
            device_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scheduler_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actor TEXT NOT NULL,
            job_type TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Long-term decayed weights. Keys look like "term:sleep", "cat:Health",
    // "project:trip". ever_dominant floors project decay.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signals (
            key TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 0,
            last_updated TEXT NOT NULL,
            created_at TEXT NOT NULL,
            ever_dominant INTEGER DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pending_actor ON pending_clarifications(actor)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pending_expires ON pending_clarifications(expires_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_captures_actor_time ON capture_log(actor, created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_letters_date ON letters(for_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_letters_actor ON letters(actor, created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_actor ON transactions(actor)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scheduler_actor ON scheduler_runs(actor, job_type)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_type_weight ON signals(type, weight DESC)")
        .execute(pool)
        .await?;

    info!("Database migrations complete");
    Ok(())
}
