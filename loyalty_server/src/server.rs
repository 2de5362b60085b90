use std::path::Path;

use log::*;
use loyalty_engine::{AccrualClient, SqliteDatabase};
use tokio_util::sync::CancellationToken;

use crate::{accrual_worker::start_accrual_worker, config::ServerConfig, errors::ServerError};

/// Opens the store, starts the accrual worker, and runs until the process is asked to stop.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    ensure_database_directory(&config.database_url)?;
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not open {}. {e}", config.database_url)))?;
    info!("🚀️ Connected to {}", db.url());
    if config.run_migrations {
        db.run_migrations().await?;
        info!("🚀️ Database migrations complete");
    }
    let client = AccrualClient::new(&config.accrual_system_address, config.accrual_timeout)?;
    info!("🚀️ Accrual system at {}", client.base_url());

    let cancel = CancellationToken::new();
    let worker =
        start_accrual_worker(db.clone(), client, config.reconciler_config(), config.poll_interval, cancel.clone());
    shutdown_signal().await;
    info!("🚀️ Shutting down. Waiting for the accrual worker to finish its current pass");
    cancel.cancel();
    let result = worker.await.map_err(|e| ServerError::BackendError(format!("The accrual worker panicked. {e}")));
    db.close().await;
    result
}

/// SQLite creates the database file on demand, but not the directory that holds it.
fn ensure_database_directory(url: &str) -> Result<(), ServerError> {
    let path = url.trim_start_matches("sqlite:").trim_start_matches("//");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🚀️ Creating database directory {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        },
        _ => Ok(()),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    r = tokio::signal::ctrl_c() => log_signal_result(r),
                    _ = term.recv() => info!("🚀️ Received SIGTERM"),
                }
            },
            Err(e) => {
                warn!("🚀️ Could not listen for SIGTERM. Only Ctrl-C will stop the server. {e}");
                log_signal_result(tokio::signal::ctrl_c().await);
            },
        }
    }
    #[cfg(not(unix))]
    log_signal_result(tokio::signal::ctrl_c().await);
}

fn log_signal_result(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("🚀️ Received Ctrl-C"),
        Err(e) => error!("🚀️ Could not listen for Ctrl-C. {e}"),
    }
}
