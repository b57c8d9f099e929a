//! Shared types for the HTTP API: handler state, the authenticated staff
//! context and bearer token helpers.

use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::authorization::{self, Action, AuthorizationError};
use crate::core_state::CoreState;
use crate::db::{self, DatabaseError};
use crate::models::enums::StaffRole;
use crate::models::StaffAccount;

// ═══════════════════════════════════════════════════════════
// API context: shared state for all handlers
// ═══════════════════════════════════════════════════════════

/// Handler state. Cloned per request; everything inside is `Arc`.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run database work on the blocking pool with a fresh connection.
    /// `BEGIN IMMEDIATE` may wait out the busy timeout, so this never runs
    /// on an async worker.
    pub async fn with_db<T, E, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        E: Into<ApiError>,
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
            let conn = core.open_db()?;
            work(&conn).map_err(Into::into)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Database task failed: {e}")))?
    }
}

/// Authenticated staff member, injected by the auth middleware.
#[derive(Debug, Clone)]
pub struct StaffContext {
    pub staff_id: Uuid,
    pub display_name: String,
    pub role: StaffRole,
    pub practitioner_id: Option<Uuid>,
}

impl StaffContext {
    /// Recorded as `created_by` / `allocated_by` / `pharmacist_id`.
    pub fn actor(&self) -> String {
        self.staff_id.to_string()
    }

    pub fn require(&self, action: Action) -> Result<(), AuthorizationError> {
        authorization::authorize(self.role, action)
    }
}

impl From<StaffAccount> for StaffContext {
    fn from(account: StaffAccount) -> Self {
        Self {
            staff_id: account.id,
            display_name: account.display_name,
            role: account.role,
            practitioner_id: account.practitioner_id,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tokens
// ═══════════════════════════════════════════════════════════

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Create an active staff account and return it with its plaintext token.
/// Only the hash is stored; the token cannot be recovered later.
pub fn issue_staff_token(
    conn: &Connection,
    display_name: &str,
    role: StaffRole,
    practitioner_id: Option<Uuid>,
) -> Result<(StaffAccount, String), DatabaseError> {
    let token = generate_token();
    let account = StaffAccount {
        id: Uuid::new_v4(),
        display_name: display_name.to_string(),
        role,
        practitioner_id,
        is_active: true,
    };
    db::insert_staff_account(conn, &account, &hash_token(&token))?;
    tracing::info!(staff_id = %account.id, role = %role, "Staff token issued");
    Ok((account, token))
}
