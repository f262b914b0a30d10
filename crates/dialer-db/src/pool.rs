//! SQLite connection pool shared by the request handlers and the
//! transcription worker.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

/// Connection tuning read from the `[database]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits for the lock, in milliseconds.
    pub busy_timeout_ms: u64,
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("cannot open call database: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Per-connection setup: WAL journaling, foreign keys, busy timeout.
///
/// In-memory databases cannot use WAL and report `memory`; that is accepted.
fn prepare_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    if !matches!(mode.as_str(), "wal" | "memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode stayed '{mode}', expected wal")),
        ));
    }

    conn.pragma_update(None, "foreign_keys", true)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
}

/// Opens (creating if needed) the call database at `db_path`.
///
/// Every connection runs in WAL mode with foreign keys enabled and the
/// configured busy timeout. Checking a connection out waits at most as long
/// as a writer would wait for the lock, with a floor of one second.
///
/// `:memory:` works, but each pooled connection then gets its own private
/// database; tests sharing state across connections use a temporary file.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if no connection can be opened.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let busy_timeout_ms = settings.busy_timeout_ms;
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, busy_timeout_ms));

    let checkout_timeout = Duration::from_millis(busy_timeout_ms.max(1_000));
    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(checkout_timeout)
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        max_size = settings.pool_max_size,
        busy_timeout_ms,
        "database pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pragma<T: rusqlite::types::FromSql>(conn: &Connection, name: &str) -> T {
        conn.query_row(&format!("PRAGMA {name}"), [], |row| row.get(0))
            .expect("pragma should be readable")
    }

    #[test]
    fn file_pool_applies_settings_to_every_connection() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("calls.db");
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 3,
        };

        let pool = create_pool(path.to_str().unwrap(), settings).expect("pool should open");
        assert_eq!(pool.max_size(), 3);

        let first = pool.get().expect("first connection");
        let second = pool.get().expect("second connection");
        for conn in [&first, &second] {
            assert_eq!(pragma::<String>(conn, "journal_mode"), "wal");
            assert_eq!(pragma::<i64>(conn, "foreign_keys"), 1);
            assert_eq!(pragma::<i64>(conn, "busy_timeout"), 2_500);
        }
    }

    #[test]
    fn in_memory_pool_is_accepted() {
        let pool = create_pool(":memory:", DbRuntimeSettings::default()).expect("pool should open");
        let conn = pool.get().expect("connection");
        let mode: String = pragma(&conn, "journal_mode");
        assert!(matches!(mode.as_str(), "wal" | "memory"), "got {mode}");
    }

    #[test]
    fn file_pool_shares_data_between_connections() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("shared.db");
        let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default())
            .expect("pool should open");

        crate::run_migrations(&pool.get().expect("connection")).expect("migrations");
        let count: i64 = pool
            .get()
            .expect("connection")
            .query_row("SELECT COUNT(*) FROM call_logs", [], |row| row.get(0))
            .expect("call_logs should exist on every connection");
        assert_eq!(count, 0);
    }
}
