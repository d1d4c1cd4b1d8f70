//! SQLite-backed account and session storage.
//!
//! Fluente accounts are username + password only; the web client keeps the
//! session token and sends it back as a bearer header. Tokens are random hex,
//! hashed at rest, and expire after a configurable TTL. The credit ledger
//! bootstraps the free allotment lazily, so registration writes nothing
//! besides the user row.

use anyhow::{bail, Result};
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sessions live for 30 days unless configured otherwise.
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 3600;

/// Session tokens are 32 random bytes (64 hex chars).
const TOKEN_BYTES: usize = 32;

/// Per-user password salt length in bytes.
const SALT_BYTES: usize = 16;

/// SHA-256 stretching rounds for stored passwords.
const PASSWORD_ROUNDS: u32 = 100_000;

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: i64,
}

/// A live session resolved from a bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub expires_at: i64,
}

/// Account and session store.
pub struct AuthStore {
    conn: Mutex<rusqlite::Connection>,
    session_ttl_secs: u64,
}

impl AuthStore {
    /// Open (or create) the auth database at the given path.
    pub fn new(db_path: &Path, session_ttl_secs: Option<u64>) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                salt TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            session_ttl_secs: session_ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS),
        })
    }

    // ── Accounts ────────────────────────────────────────────────────

    /// Create an account. Returns the new user ID.
    pub fn register(&self, username: &str, password: &str) -> Result<String> {
        let username = username.trim();
        if username.is_empty() {
            bail!("Username cannot be empty");
        }
        if username.len() > 64 {
            bail!("Username too long (max 64 characters)");
        }
        if password.len() < 8 {
            bail!("Password must be at least 8 characters");
        }

        let user_id = uuid::Uuid::new_v4().to_string();
        let salt = random_hex(SALT_BYTES);
        let password_hash = hash_password(password, &salt);

        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO users (id, username, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![user_id, username, password_hash, salt, epoch_secs()],
        );

        match inserted {
            Ok(_) => Ok(user_id),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                bail!("Username '{username}' is already taken")
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check username + password and return the account on success.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let conn = self.conn.lock();
        let row: Result<(User, String, String), _> = conn.query_row(
            "SELECT id, username, created_at, password_hash, salt
             FROM users WHERE username = ?1 COLLATE NOCASE",
            rusqlite::params![username.trim()],
            |row| Ok((row_to_user(row)?, row.get(3)?, row.get(4)?)),
        );

        match row {
            Ok((user, stored_hash, salt)) => {
                let attempt = hash_password(password, &salt);
                if !constant_time_eq(stored_hash.as_bytes(), attempt.as_bytes()) {
                    bail!("Invalid username or password");
                }
                Ok(user)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                // Burn a hash anyway so unknown usernames take as long as
                // wrong passwords.
                let _ = hash_password(password, "0000000000000000");
                bail!("Invalid username or password");
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an account by ID.
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?1",
            rusqlite::params![user_id],
            row_to_user,
        );

        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Count registered accounts (the `max_users` gate).
    pub fn user_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ── Sessions ────────────────────────────────────────────────────

    /// Mint a session token for an account. The plaintext token is returned
    /// once and only its hash is stored.
    pub fn create_session(&self, user_id: &str) -> Result<String> {
        let token = random_hex(TOKEN_BYTES);
        let now = epoch_secs();
        let expires_at = now + self.session_ttl_secs as i64;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![hash_token(&token), user_id, now, expires_at],
        )?;

        Ok(token)
    }

    /// Resolve a bearer token to its session, if valid and unexpired.
    pub fn validate_session(&self, token: &str) -> Option<Session> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT user_id, expires_at FROM sessions
             WHERE token_hash = ?1 AND expires_at > ?2",
            rusqlite::params![hash_token(token), epoch_secs()],
            |row| {
                Ok(Session {
                    user_id: row.get(0)?,
                    expires_at: row.get(1)?,
                })
            },
        )
        .ok()
    }

    /// Revoke a session by token (logout).
    pub fn revoke_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            rusqlite::params![hash_token(token)],
        )?;
        Ok(deleted > 0)
    }

    /// Delete expired sessions. Run at gateway startup so the table does not
    /// grow without bound.
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            rusqlite::params![epoch_secs()],
        )?;
        Ok(deleted as u64)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: row.get(2)?,
    })
}

// ── Crypto helpers ──────────────────────────────────────────────────

/// Random bytes from the OS, hex encoded (salts and session tokens).
fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Salted, iterated SHA-256 (key stretching).
fn hash_password(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();

    for _ in 1..PASSWORD_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }

    hex::encode(digest)
}

/// Single-pass SHA-256 — tokens are already high-entropy.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Constant-time comparison for password hash checks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, AuthStore) {
        store_with_ttl(Some(3600))
    }

    fn store_with_ttl(ttl: Option<u64>) -> (TempDir, AuthStore) {
        let tmp = TempDir::new().unwrap();
        let store = AuthStore::new(&tmp.path().join("auth.db"), ttl).unwrap();
        (tmp, store)
    }

    #[test]
    fn register_and_login_roundtrip() {
        let (_tmp, store) = store();

        let user_id = store.register("maria", "segredo-forte-123").unwrap();
        let user = store.authenticate("maria", "segredo-forte-123").unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.username, "maria");
    }

    #[test]
    fn duplicate_username_rejected_case_insensitively() {
        let (_tmp, store) = store();
        store.register("Maria", "segredo-forte-123").unwrap();

        let err = store.register("maria", "outro-segredo-1").unwrap_err();
        assert!(err.to_string().contains("already taken"));
    }

    #[test]
    fn wrong_password_rejected() {
        let (_tmp, store) = store();
        store.register("joao", "segredo-forte-123").unwrap();

        let err = store.authenticate("joao", "chute-errado-999").unwrap_err();
        assert!(err.to_string().contains("Invalid"));
    }

    #[test]
    fn unknown_username_rejected() {
        let (_tmp, store) = store();

        let err = store.authenticate("fantasma", "qualquer-senha-1").unwrap_err();
        assert!(err.to_string().contains("Invalid"));
    }

    #[test]
    fn register_validates_username_and_password() {
        let (_tmp, store) = store();

        let empty = store.register("   ", "segredo-forte-123").unwrap_err();
        assert!(empty.to_string().contains("empty"));

        let long = store.register(&"a".repeat(65), "segredo-forte-123").unwrap_err();
        assert!(long.to_string().contains("too long"));

        let short = store.register("joao", "curta").unwrap_err();
        assert!(short.to_string().contains("8 characters"));
    }

    #[test]
    fn token_resolves_to_its_session() {
        let (_tmp, store) = store();
        let user_id = store.register("maria", "segredo-forte-123").unwrap();

        let token = store.create_session(&user_id).unwrap();
        let session = store.validate_session(&token).unwrap();
        assert_eq!(session.user_id, user_id);
    }

    #[test]
    fn garbage_token_resolves_to_nothing() {
        let (_tmp, store) = store();
        assert!(store.validate_session("nao-e-um-token").is_none());
    }

    #[test]
    fn revoked_token_stops_resolving() {
        let (_tmp, store) = store();
        let user_id = store.register("maria", "segredo-forte-123").unwrap();
        let token = store.create_session(&user_id).unwrap();

        assert!(store.revoke_session(&token).unwrap());
        assert!(store.validate_session(&token).is_none());
        // Second revoke finds nothing to delete
        assert!(!store.revoke_session(&token).unwrap());
    }

    #[test]
    fn expired_sessions_are_purged() {
        // TTL of zero expires tokens at mint time.
        let (_tmp, store) = store_with_ttl(Some(0));
        let user_id = store.register("maria", "segredo-forte-123").unwrap();
        let stale = store.create_session(&user_id).unwrap();

        assert!(store.validate_session(&stale).is_none());
        assert_eq!(store.cleanup_expired_sessions().unwrap(), 1);
        assert_eq!(store.cleanup_expired_sessions().unwrap(), 0);
    }

    #[test]
    fn user_count_tracks_registrations() {
        let (_tmp, store) = store();

        assert_eq!(store.user_count().unwrap(), 0);
        store.register("maria", "segredo-forte-123").unwrap();
        store.register("joao", "segredo-forte-456").unwrap();
        assert_eq!(store.user_count().unwrap(), 2);
    }

    #[test]
    fn lookup_user_by_id() {
        let (_tmp, store) = store();
        let user_id = store.register("maria", "segredo-forte-123").unwrap();

        let user = store.get_user(&user_id).unwrap().unwrap();
        assert_eq!(user.username, "maria");
        assert!(store.get_user("id-inexistente").unwrap().is_none());
    }

    #[test]
    fn password_hashing_is_salted_and_deterministic() {
        let same = hash_password("segredo", "sal_fixo");
        assert_eq!(same, hash_password("segredo", "sal_fixo"));
        assert_ne!(same, hash_password("segredo", "sal_outro"));
        assert_ne!(same, hash_password("segredo2", "sal_fixo"));
    }
}
