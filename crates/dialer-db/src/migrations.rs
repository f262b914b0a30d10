//! Schema migrations for the call subsystem.
//!
//! The schema ships inside the binary. Each step is recorded by name in
//! `_dialer_migrations` together with the transaction that applied it, so a
//! half-applied step leaves no trace and is retried on the next start.

use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use thiserror::Error;

const LEDGER_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS _dialer_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// One schema step.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    name: &'static str,
    sql: &'static str,
}

const SCHEMA: &[SchemaStep] = &[
    SchemaStep {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    SchemaStep {
        name: "001_user_sessions",
        sql: include_str!("migrations/001_user_sessions.sql"),
    },
    SchemaStep {
        name: "002_call_logs",
        sql: include_str!("migrations/002_call_logs.sql"),
    },
];

#[derive(Debug, Error)]
pub enum MigrationError {
    /// A step's SQL or its ledger entry failed; the step was rolled back.
    #[error("schema step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The ledger could not be created or read.
    #[error("migration ledger unavailable: {0}")]
    Ledger(rusqlite::Error),
}

fn applied_steps(conn: &Connection) -> Result<HashSet<String>, MigrationError> {
    conn.execute_batch(LEDGER_TABLE_SQL)
        .map_err(MigrationError::Ledger)?;

    let mut stmt = conn
        .prepare("SELECT name FROM _dialer_migrations")
        .map_err(MigrationError::Ledger)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(MigrationError::Ledger)?
        .collect::<Result<HashSet<_>, _>>()
        .map_err(MigrationError::Ledger)?;
    Ok(names)
}

fn apply_step(conn: &Connection, step: &SchemaStep) -> Result<(), MigrationError> {
    let failed = |source| MigrationError::Step {
        step: step.name,
        source,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    tx.execute_batch(step.sql).map_err(failed)?;
    tx.execute(
        "INSERT INTO _dialer_migrations (name) VALUES (?1)",
        [step.name],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

fn migrate(conn: &Connection, schema: &[SchemaStep]) -> Result<usize, MigrationError> {
    let applied = applied_steps(conn)?;

    let known: HashSet<&str> = schema.iter().map(|s| s.name).collect();
    for name in applied.iter().filter(|n| !known.contains(n.as_str())) {
        tracing::warn!(migration = %name, "database has a migration this build does not know");
    }

    let pending: Vec<&SchemaStep> = schema
        .iter()
        .filter(|step| !applied.contains(step.name))
        .collect();
    for step in &pending {
        tracing::info!(migration = step.name, "applying migration");
        apply_step(conn, step)?;
    }
    Ok(pending.len())
}

/// Brings the schema up to date and returns how many steps ran.
///
/// Safe to call on every start; an up-to-date database returns `0`.
///
/// # Errors
///
/// Returns `MigrationError::Step` naming the step that failed, or
/// `MigrationError::Ledger` when the ledger cannot be read.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    migrate(conn, SCHEMA)
}

/// Name of the newest step recorded in the ledger, if any.
///
/// # Errors
///
/// Returns `MigrationError::Ledger` when the ledger cannot be read.
pub fn current_schema(conn: &Connection) -> Result<Option<String>, MigrationError> {
    conn.execute_batch(LEDGER_TABLE_SQL)
        .map_err(MigrationError::Ledger)?;
    conn.query_row(
        "SELECT name FROM _dialer_migrations ORDER BY id DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
    .map_err(MigrationError::Ledger)
}
