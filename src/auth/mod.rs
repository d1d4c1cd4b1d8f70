//! User authentication.
//!
//! Provides:
//! - User registration with username/password (iterated SHA-256, 100k rounds + per-user salt)
//! - Session token management (opaque hex tokens, SHA-256 hashed for storage, time-limited)
//! - SQLite-backed persistent storage
//!
//! ## Design Decisions
//! - No external JWT dependency — sessions use opaque random tokens with
//!   server-side SHA-256 hashed lookup.
//! - Password hashing uses iterated SHA-256 (100k rounds) + per-user salt.
//! - Session tokens are opaque hex strings; server-side lookup for validation.

pub mod store;

pub use store::{AuthStore, Session, User};
