//! `dialer-server` binary.
//!
//! Usage: `dialer-server [config.toml]`. Without an argument the path comes
//! from `DIALER_CONFIG_PATH`, then falls back to `./config.toml`; a missing
//! file means built-in defaults plus environment overrides.

use dialer_db::{DbPool, DbRuntimeSettings, MigrationError, PoolError};
use dialer_server::config::{self, Config, ConfigError, LoggingConfig};
use dialer_server::{app, AppState};
use std::net::SocketAddr;
use std::process::ExitCode;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
enum BootError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Pool(#[from] PoolError),
    #[error("database connection for migrations: {0}")]
    Checkout(String),
    #[error("migrations: {0}")]
    Migration(#[from] MigrationError),
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server stopped: {0}")]
    Serve(std::io::Error),
}

/// Picks the config file: CLI argument, then env var, then the default.
fn config_path(arg: Option<String>, env: Option<String>) -> (String, &'static str) {
    let non_blank = |v: &String| !v.trim().is_empty();
    match (arg.filter(non_blank), env.filter(non_blank)) {
        (Some(path), _) => (path, "argument"),
        (None, Some(path)) => (path, "DIALER_CONFIG_PATH"),
        (None, None) => (DEFAULT_CONFIG_PATH.to_string(), "default"),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_database(config: &Config) -> Result<DbPool, BootError> {
    let pool = dialer_db::create_pool(
        &config.database.path,
        DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )?;

    let conn = pool.get().map_err(|e| BootError::Checkout(e.to_string()))?;
    let applied = dialer_db::run_migrations(&conn)?;
    let schema = dialer_db::current_schema(&conn)?;
    tracing::info!(
        path = %config.database.path,
        applied,
        schema = schema.as_deref().unwrap_or("-"),
        "call database ready"
    );
    Ok(pool)
}

async fn run() -> Result<(), BootError> {
    let (path, source) = config_path(
        std::env::args().nth(1),
        std::env::var("DIALER_CONFIG_PATH").ok(),
    );
    let config = config::load_config(Some(&path))?;
    init_tracing(&config.logging);
    tracing::info!(path = %path, source, "configuration loaded");

    let pool = open_database(&config)?;
    let router = app(AppState::from_config(pool, &config));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BootError::Bind { addr, source })?;
    tracing::info!(%addr, public_url = %config.server.public_url, "dialer server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(BootError::Serve)?;

    tracing::info!("dialer server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Tracing may not be initialised yet when config loading fails.
            eprintln!("dialer-server: {e}");
            tracing::error!(error = %e, "dialer server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "shutting down; finishing in-flight requests");
}
