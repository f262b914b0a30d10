//! Database layer for the dialer.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and embedded SQL migrations. Every table the call subsystem touches is
//! created through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: the webhook handlers and the token endpoint
//!   read and write concurrently; WAL allows concurrent readers with a
//!   single writer, which matches the call-log access pattern (one insert
//!   per call, two small patches later).
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so the schema cannot drift from the code using it.

mod migrations;
mod pool;

pub use migrations::{current_schema, run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
