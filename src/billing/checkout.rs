//! Checkout session ledger with idempotent completion.
//!
//! Shares the SQLite connection with the credit ledger so finalizing a
//! session and granting its credits commit in a single transaction.

use crate::billing::catalog::CreditPackage;
use crate::ledger::store::{now_epoch, CreditLedger};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Status of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    /// Session opened, waiting for the user to pay.
    Pending,
    /// Payment confirmed, credits granted.
    Complete,
    /// Payment failed or the provider session expired.
    Failed,
}

impl CheckoutStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "complete" => Self::Complete,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A checkout session record.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    /// Internal session ID (generated, returned to the client).
    pub session_id: String,
    /// User who opened the session.
    pub user_id: String,
    /// Credit package ID.
    pub package_id: String,
    /// Amount in BRL cents.
    pub amount_cents: u32,
    /// Credits to grant on completion.
    pub credits: u32,
    /// Current status.
    pub status: CheckoutStatus,
    /// Payment Provider session ID, set after the provider session is opened.
    pub provider_session_id: Option<String>,
    /// Unix timestamp (seconds) of creation.
    pub created_at: i64,
    /// Unix timestamp (seconds) of last update.
    pub updated_at: i64,
}

/// Checkout failures, distinct from business outcomes: a session in the wrong
/// state is a caller error, a storage fault is infrastructure.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout session not found: {0}")]
    SessionNotFound(String),
    #[error("checkout session is {0:?}, not pending")]
    NotPending(CheckoutStatus),
    #[error("checkout storage unavailable: {0}")]
    Store(#[from] rusqlite::Error),
}

const SELECT_SESSION: &str = "SELECT session_id, user_id, package_id, amount_cents, credits, \
     status, provider_session_id, created_at, updated_at \
     FROM checkout_sessions WHERE session_id = ?1";

/// Checkout session store.
pub struct CheckoutStore {
    conn: Arc<Mutex<Connection>>,
    free_credits: u32,
}

impl CheckoutStore {
    /// Attach to the ledger's database, creating the sessions table.
    pub fn attach(ledger: &CreditLedger) -> Result<Self, CheckoutError> {
        let conn = ledger.connection();
        conn.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS checkout_sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                package_id TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                credits INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                provider_session_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_checkout_user ON checkout_sessions(user_id);",
        )?;

        Ok(Self {
            conn,
            free_credits: ledger.free_credits(),
        })
    }

    /// Open a pending session for a package.
    pub fn create(
        &self,
        user_id: &str,
        package: &CreditPackage,
    ) -> Result<CheckoutSession, CheckoutError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = now_epoch();

        let record = CheckoutSession {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
            package_id: package.id.to_string(),
            amount_cents: package.price_cents,
            credits: package.credits,
            status: CheckoutStatus::Pending,
            provider_session_id: None,
            created_at: now,
            updated_at: now,
        };

        self.conn.lock().execute(
            "INSERT INTO checkout_sessions \
             (session_id, user_id, package_id, amount_cents, credits, status, \
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.session_id,
                record.user_id,
                record.package_id,
                record.amount_cents,
                record.credits,
                record.status.as_str(),
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(record)
    }

    /// Store the provider's session ID after the provider session is opened.
    pub fn set_provider_session(
        &self,
        session_id: &str,
        provider_session_id: &str,
    ) -> Result<(), CheckoutError> {
        let now = now_epoch();
        self.conn.lock().execute(
            "UPDATE checkout_sessions SET provider_session_id = ?1, updated_at = ?2
             WHERE session_id = ?3",
            params![provider_session_id, now, session_id],
        )?;
        Ok(())
    }

    /// Get a session by internal ID.
    pub fn get(&self, session_id: &str) -> Result<Option<CheckoutSession>, CheckoutError> {
        let conn = self.conn.lock();
        let result = conn.query_row(SELECT_SESSION, params![session_id], row_to_session);

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Finalize a confirmed purchase: mark the session complete and grant its
    /// credits in a single transaction.
    ///
    /// Idempotent — a session already complete is returned as-is without a
    /// second grant, so reloading the success page never double-grants.
    pub fn finalize_complete(&self, session_id: &str) -> Result<CheckoutSession, CheckoutError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = now_epoch();

        let record = match tx.query_row(SELECT_SESSION, params![session_id], row_to_session) {
            Ok(record) => record,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(CheckoutError::SessionNotFound(session_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // Idempotent: already finalized
        if record.status == CheckoutStatus::Complete {
            tx.commit()?;
            return Ok(record);
        }
        if record.status != CheckoutStatus::Pending {
            return Err(CheckoutError::NotPending(record.status));
        }

        tx.execute(
            "UPDATE checkout_sessions SET status = 'complete', updated_at = ?1
             WHERE session_id = ?2",
            params![now, session_id],
        )?;

        // Grant credits; a first-time user still receives the free allotment
        // underneath the purchase.
        tx.execute(
            "INSERT INTO accounts (user_id, credits, message_count, created_at, updated_at)
             VALUES (?1, ?2 + ?3, 0, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                 credits = credits + ?3,
                 updated_at = ?4",
            params![record.user_id, self.free_credits, record.credits, now],
        )?;

        tx.commit()?;

        Ok(CheckoutSession {
            status: CheckoutStatus::Complete,
            updated_at: now,
            ..record
        })
    }

    /// Mark a pending session failed (provider reported expiry or failure).
    pub fn mark_failed(&self, session_id: &str) -> Result<(), CheckoutError> {
        let now = now_epoch();
        self.conn.lock().execute(
            "UPDATE checkout_sessions SET status = 'failed', updated_at = ?1
             WHERE session_id = ?2 AND status = 'pending'",
            params![now, session_id],
        )?;
        Ok(())
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckoutSession> {
    let status: String = row.get(5)?;
    Ok(CheckoutSession {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        package_id: row.get(2)?,
        amount_cents: row.get(3)?,
        credits: row.get(4)?,
        status: CheckoutStatus::from_str(&status),
        provider_session_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ── Tests ────────────────────────────────────────────────────────
