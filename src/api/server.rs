//! API server lifecycle: binds the listener, mounts `his_api_router()`,
//! and runs axum in a background task with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::oneshot;

use crate::api::router::his_api_router;
use crate::api::types::issue_staff_token;
use crate::config::ConfigError;
use crate::core_state::{CoreError, CoreState};
use crate::db::{self, DatabaseError};
use crate::models::enums::StaffRole;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Server handle
// ═══════════════════════════════════════════════════════════

/// Handle to a running API server.
pub struct HisServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl HisServer {
    /// Signal a graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!("API server task failed: {e}");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════

/// Bind `addr` and serve the API in a background tokio task.
pub async fn start_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<HisServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr()?;

    let app = his_api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(HisServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

/// On an empty staff table, create one Admin account and return its token.
/// Returns `None` once any account exists.
pub fn bootstrap_admin(conn: &Connection) -> Result<Option<String>, DatabaseError> {
    if db::count_staff_accounts(conn)? > 0 {
        return Ok(None);
    }
    let (account, token) = issue_staff_token(conn, "Administrator", StaffRole::Admin, None)?;
    tracing::warn!(staff_id = %account.id, "No staff accounts found, bootstrap admin created");
    Ok(Some(token))
}
