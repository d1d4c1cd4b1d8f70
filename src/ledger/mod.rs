//! Credit ledger for the practice-chat allowance.
//!
//! Tracks, per user, a credit balance and a per-credit message counter, and is
//! the single source of truth for how much conversation allowance remains.
//! Two consumption policies exist (one is selected per deployment):
//!
//! - **Per message batch**: every user turn increments the counter; the Nth
//!   message of a credit (default 20) deducts the credit and resets the
//!   counter in the same operation.
//! - **Per conversation**: one whole credit is charged when a conversation
//!   starts; individual turns are free.
//!
//! ## Design
//! - SQLite-backed account records (local-first, WAL mode)
//! - Read-modify-write serialized behind a single guarded connection
//! - Business outcomes ("out of credits") are structured return values,
//!   never errors; only storage faults propagate as `Err`

pub mod policy;
pub mod store;

pub use policy::ConsumePolicy;
pub use store::{
    Balance, ConsumeOutcome, CreditLedger, DeductOutcome, DEFAULT_BATCH_SIZE, DEFAULT_FREE_CREDITS,
};
