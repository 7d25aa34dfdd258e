//! SQLite-backed item database implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Item CRUD lives in `items`.
//! Workers are separate OS processes with their own connections, so the file
//! runs in WAL mode with a busy timeout; the database is the only channel
//! between the orchestrator and its workers.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the SQLite-backed item and settings database.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/reelq/reelq.db` on Debian.
#[derive(Clone)]
pub struct ItemDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl ItemDb {
    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let state_dir = crate::config::state_dir()?;
        Self::open_at(state_dir.join("reelq.db")).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        let db = ItemDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // One table for every item kind so the queue is a single ordering.
        // Episode columns are NULL for movies.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL DEFAULT 'movie',
                series_title TEXT,
                season_number INTEGER,
                episode_number INTEGER,
                status TEXT NOT NULL,
                title TEXT,
                year TEXT,
                genre TEXT,
                description TEXT,
                rating TEXT,
                director TEXT,
                cast_members TEXT,
                poster_url TEXT,
                source_site TEXT,
                source_url TEXT,
                progress REAL NOT NULL DEFAULT 0.0,
                filepath TEXT,
                pid INTEGER,
                message TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_items_queue
            ON items (status, created_at, id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        self.seed_default_settings().await?;
        Ok(())
    }
}

/// Current time as Unix milliseconds (for DB timestamps and FIFO order).
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<ItemDb> {
    // Single connection to avoid in-memory pool handing back a different empty DB.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = ItemDb { pool };
    db.migrate().await?;
    Ok(db)
}
