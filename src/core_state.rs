//! Application state shared by every HTTP handler.
//!
//! Holds no connections: each request opens its own, so SQLite's
//! `busy_timeout` queues concurrent writers instead of a process-wide lock.

use std::path::{Path, PathBuf};

use crate::db;

/// Immutable application state, wrapped in `Arc` at startup.
#[derive(Debug, Clone)]
pub struct CoreState {
    db_path: PathBuf,
}

impl CoreState {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Create the database directory if needed and bring the schema up to
    /// date. Called once before the server starts accepting requests.
    pub fn initialize(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        db::open_database(&self.db_path)?;
        tracing::info!(path = %self.db_path.display(), "Database ready");
        Ok(())
    }

    /// Open a database connection for one request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
