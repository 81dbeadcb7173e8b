use progress_core::Clock;
use sqlx::SqlitePool;

use super::SqliteInitError;

async fn ensure_ledger(pool: &SqlitePool, ledger: &str) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        r"
            CREATE TABLE IF NOT EXISTS {ledger} (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        "
    ))
    .execute(pool)
    .await?;
    Ok(())
}

async fn is_applied(pool: &SqlitePool, ledger: &str, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT 1 FROM {ledger} WHERE version = ?1"))
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn mark_applied(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    ledger: &str,
    version: i64,
    clock: &Clock,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        r"
            INSERT INTO {ledger} (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        "
    ))
    .bind(version)
    .bind(clock.now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

const REMOTE_LEDGER: &str = "schema_migrations";
const CACHE_LEDGER: &str = "cache_schema_migrations";

/// Runs versioned migrations for the remote document store.
///
/// Version 1 holds the document collections (progress, profiles), version 2
/// the account/session tables.
pub async fn run_migrations(pool: &SqlitePool, clock: &Clock) -> Result<(), SqliteInitError> {
    ensure_ledger(pool, REMOTE_LEDGER).await?;

    // Version 1: document collections.
    if !is_applied(pool, REMOTE_LEDGER, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_progress (
                    record_id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL UNIQUE,
                    completed_tutorials TEXT NOT NULL DEFAULT '[]',
                    completed_challenges TEXT NOT NULL DEFAULT '[]',
                    total_xp INTEGER NOT NULL CHECK (total_xp >= 0),
                    badges TEXT NOT NULL DEFAULT '[]',
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_profiles (
                    record_id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_user_profiles_user
                    ON user_profiles (user_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        mark_applied(&mut tx, REMOTE_LEDGER, 1, clock).await?;
        tx.commit().await?;
    }

    // Version 2: accounts and sessions.
    if !is_applied(pool, REMOTE_LEDGER, 2).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS accounts (
                    user_id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES accounts(user_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        mark_applied(&mut tx, REMOTE_LEDGER, 2, clock).await?;
        tx.commit().await?;
    }

    Ok(())
}

/// Runs versioned migrations for a client-side cache database.
///
/// Tracked in its own ledger so a cache file never carries the remote tables.
pub async fn run_cache_migrations(pool: &SqlitePool, clock: &Clock) -> Result<(), SqliteInitError> {
    ensure_ledger(pool, CACHE_LEDGER).await?;

    // Version 1: key-value entries.
    if !is_applied(pool, CACHE_LEDGER, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS local_cache (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        mark_applied(&mut tx, CACHE_LEDGER, 1, clock).await?;
        tx.commit().await?;
    }

    Ok(())
}
