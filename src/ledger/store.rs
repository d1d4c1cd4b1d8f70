//! SQLite-backed credit account store.
//!
//! One row per user: `credits` (whole conversation allotments remaining) and
//! `message_count` (messages spent against the currently-active credit,
//! always `< batch_size` after a successful operation).

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Free credit allotment granted to accounts on first use.
pub const DEFAULT_FREE_CREDITS: u32 = 3;

/// Messages consumable per credit under the per-message-batch policy.
pub const DEFAULT_BATCH_SIZE: u32 = 20;

/// A user's current allowance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Whole conversation allotments remaining.
    pub credits: u32,
    /// Messages consumed against the currently-active credit.
    pub message_count: u32,
}

/// Result of a per-message consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsumeOutcome {
    /// Whether the message was accounted (false = allowance exhausted).
    pub success: bool,
    /// Credits remaining after the call.
    pub remaining_credits: u32,
    /// Message counter after the call.
    pub message_count: u32,
    /// Whether this call crossed a batch boundary and deducted a credit.
    pub credit_deducted: bool,
}

/// Result of a flat one-credit spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeductOutcome {
    /// Whether a credit was deducted.
    pub success: bool,
    /// Credits remaining after the call.
    pub remaining_credits: u32,
}

/// Credit ledger with SQLite persistence.
///
/// All mutations are applied under a single connection guard, so two
/// concurrent operations for the same user can never both observe the same
/// pre-update state (no lost-update race at the batch boundary).
pub struct CreditLedger {
    conn: Arc<Mutex<Connection>>,
    free_credits: u32,
    batch_size: u32,
}

impl CreditLedger {
    /// Open (or create) the ledger database at the given path.
    pub fn open(db_path: &Path, free_credits: u32, batch_size: u32) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                user_id TEXT PRIMARY KEY,
                credits INTEGER NOT NULL DEFAULT 0,
                message_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;

        anyhow::ensure!(batch_size >= 1, "batch_size must be at least 1");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            free_credits,
            batch_size,
        })
    }

    /// Shared connection handle, for stores that must commit in the same
    /// transaction as a credit grant (checkout finalization).
    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub(crate) fn free_credits(&self) -> u32 {
        self.free_credits
    }

    /// Read a user's balance. Unknown users see the default free allotment;
    /// no row is written until the first mutation.
    pub fn balance(&self, user_id: &str) -> anyhow::Result<Balance> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT credits, message_count FROM accounts WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
        );

        match row {
            Ok((credits, message_count)) => Ok(Balance {
                credits,
                message_count,
            }),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(Balance {
                credits: self.free_credits,
                message_count: 0,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Account one user-authored chat turn against the active credit.
    ///
    /// Fails (`success: false`) only when the balance is exhausted. Otherwise
    /// increments the message counter; at the batch boundary the deduction and
    /// the counter reset commit in the same transaction, so a persisted
    /// `message_count >= batch_size` is never observable.
    pub fn consume_message(&self, user_id: &str) -> anyhow::Result<ConsumeOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = now_epoch();

        ensure_account(&tx, user_id, self.free_credits, now)?;

        let (credits, message_count): (u32, u32) = tx.query_row(
            "SELECT credits, message_count FROM accounts WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if credits == 0 {
            // No active credit left to spend against. Expected business
            // outcome, not an error.
            tx.commit()?;
            return Ok(ConsumeOutcome {
                success: false,
                remaining_credits: 0,
                message_count,
                credit_deducted: false,
            });
        }

        let new_count = message_count + 1;
        let outcome = if new_count >= self.batch_size {
            // Boundary transition: the final message of the batch is the one
            // that triggers the charge.
            tx.execute(
                "UPDATE accounts SET credits = credits - 1, message_count = 0, updated_at = ?1
                 WHERE user_id = ?2 AND credits >= 1",
                params![now, user_id],
            )?;
            ConsumeOutcome {
                success: true,
                remaining_credits: credits - 1,
                message_count: 0,
                credit_deducted: true,
            }
        } else {
            tx.execute(
                "UPDATE accounts SET message_count = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![new_count, now, user_id],
            )?;
            ConsumeOutcome {
                success: true,
                remaining_credits: credits,
                message_count: new_count,
                credit_deducted: false,
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Grant purchased credits. The message counter is untouched.
    ///
    /// Not idempotent by itself — the checkout store guarantees a given
    /// purchase confirmation is applied at most once.
    pub fn add_credits(&self, user_id: &str, amount: u32) -> anyhow::Result<u32> {
        anyhow::ensure!(amount > 0, "credit grant must be a positive amount");

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = now_epoch();

        ensure_account(&tx, user_id, self.free_credits, now)?;
        tx.execute(
            "UPDATE accounts SET credits = credits + ?1, updated_at = ?2 WHERE user_id = ?3",
            params![amount, now, user_id],
        )?;
        let total: u32 = tx.query_row(
            "SELECT credits FROM accounts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(total)
    }

    /// Flat one-credit spend (per-conversation policy), independent of the
    /// message counter.
    pub fn deduct_credit(&self, user_id: &str) -> anyhow::Result<DeductOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = now_epoch();

        ensure_account(&tx, user_id, self.free_credits, now)?;

        // Guarded decrement: never drives the balance negative.
        let updated = tx.execute(
            "UPDATE accounts SET credits = credits - 1, updated_at = ?1
             WHERE user_id = ?2 AND credits >= 1",
            params![now, user_id],
        )?;

        if updated == 0 {
            tx.commit()?;
            return Ok(DeductOutcome {
                success: false,
                remaining_credits: 0,
            });
        }

        let remaining: u32 = tx.query_row(
            "SELECT credits FROM accounts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(DeductOutcome {
            success: true,
            remaining_credits: remaining,
        })
    }
}

/// Create the account row with the free allotment if it does not exist yet.
fn ensure_account(
    conn: &Connection,
    user_id: &str,
    free_credits: u32,
    now: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO accounts (user_id, credits, message_count, created_at, updated_at)
         VALUES (?1, ?2, 0, ?3, ?3)",
        params![user_id, free_credits, now],
    )?;
    Ok(())
}

/// Get current epoch seconds.
pub(crate) fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn open_ledger(free_credits: u32, batch_size: u32) -> (TempDir, CreditLedger) {
        let tmp = TempDir::new().unwrap();
        let ledger =
            CreditLedger::open(&tmp.path().join("credits.db"), free_credits, batch_size).unwrap();
        (tmp, ledger)
    }

    fn ledger() -> (TempDir, CreditLedger) {
        open_ledger(DEFAULT_FREE_CREDITS, DEFAULT_BATCH_SIZE)
    }

    #[test]
    fn unknown_user_sees_free_allotment() {
        let (_tmp, ledger) = ledger();
        let balance = ledger.balance("fresh_user").unwrap();
        assert_eq!(
            balance,
            Balance {
                credits: 3,
                message_count: 0
            }
        );
    }

    #[test]
    fn balance_is_idempotent() {
        let (_tmp, ledger) = ledger();
        let first = ledger.balance("fresh_user").unwrap();
        let second = ledger.balance("fresh_user").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn consume_increments_counter_without_deduction() {
        let (_tmp, ledger) = ledger();

        let outcome = ledger.consume_message("user_a").unwrap();
        assert!(outcome.success);
        assert!(!outcome.credit_deducted);
        assert_eq!(outcome.remaining_credits, 3);
        assert_eq!(outcome.message_count, 1);
    }

    #[test]
    fn twentieth_message_deducts_and_resets() {
        let (_tmp, ledger) = open_ledger(1, 20);

        for n in 1..=19 {
            let outcome = ledger.consume_message("user_a").unwrap();
            assert!(outcome.success, "call {n} should succeed");
            assert!(!outcome.credit_deducted, "call {n} should not deduct");
            assert_eq!(outcome.message_count, n);
            assert_eq!(outcome.remaining_credits, 1);
        }

        let boundary = ledger.consume_message("user_a").unwrap();
        assert!(boundary.success);
        assert!(boundary.credit_deducted);
        assert_eq!(boundary.remaining_credits, 0);
        assert_eq!(boundary.message_count, 0);

        // Allowance exhausted: the 21st call fails without mutation.
        let exhausted = ledger.consume_message("user_a").unwrap();
        assert!(!exhausted.success);
        assert!(!exhausted.credit_deducted);
        assert_eq!(exhausted.remaining_credits, 0);

        let balance = ledger.balance("user_a").unwrap();
        assert_eq!(
            balance,
            Balance {
                credits: 0,
                message_count: 0
            }
        );
    }

    #[test]
    fn counter_never_persists_at_batch_size() {
        let (_tmp, ledger) = open_ledger(2, 5);

        for _ in 0..10 {
            ledger.consume_message("user_a").unwrap();
            let balance = ledger.balance("user_a").unwrap();
            assert!(balance.message_count < 5);
        }
    }

    #[test]
    fn add_credits_leaves_counter_unchanged() {
        let (_tmp, ledger) = open_ledger(0, 20);

        // Drive the account to {credits: 0, message_count: 5} via the
        // per-conversation path plus direct grants.
        ledger.add_credits("user_a", 1).unwrap();
        for _ in 0..5 {
            ledger.consume_message("user_a").unwrap();
        }
        let before = ledger.balance("user_a").unwrap();
        assert_eq!(before.message_count, 5);

        let deducted = ledger.deduct_credit("user_a").unwrap();
        assert!(deducted.success);
        assert_eq!(ledger.balance("user_a").unwrap().credits, 0);

        let total = ledger.add_credits("user_a", 20).unwrap();
        assert_eq!(total, 20);
        let after = ledger.balance("user_a").unwrap();
        assert_eq!(
            after,
            Balance {
                credits: 20,
                message_count: 5
            }
        );
    }

    #[test]
    fn add_credits_rejects_zero() {
        let (_tmp, ledger) = ledger();
        assert!(ledger.add_credits("user_a", 0).is_err());
    }

    #[test]
    fn purchase_after_bootstrap_accumulates() {
        let (_tmp, ledger) = ledger();

        // New account defaults to 3; the 20-credit package lands on 23.
        let total = ledger.add_credits("user_a", 20).unwrap();
        assert_eq!(total, 23);
        assert_eq!(
            ledger.balance("user_a").unwrap(),
            Balance {
                credits: 23,
                message_count: 0
            }
        );
    }

    #[test]
    fn deduct_credit_spends_exactly_one() {
        let (_tmp, ledger) = ledger();

        let outcome = ledger.deduct_credit("user_a").unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.remaining_credits, 2);
    }

    #[test]
    fn deduct_credit_empty_balance_fails_without_mutation() {
        let (_tmp, ledger) = open_ledger(0, 20);

        let outcome = ledger.deduct_credit("user_a").unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.remaining_credits, 0);

        let balance = ledger.balance("user_a").unwrap();
        assert_eq!(balance.credits, 0);
    }

    #[test]
    fn balances_are_independent_per_user() {
        let (_tmp, ledger) = ledger();

        ledger.consume_message("user_a").unwrap();
        ledger.consume_message("user_a").unwrap();
        ledger.deduct_credit("user_b").unwrap();

        assert_eq!(ledger.balance("user_a").unwrap().message_count, 2);
        assert_eq!(ledger.balance("user_b").unwrap().credits, 2);
        assert_eq!(ledger.balance("user_c").unwrap().credits, 3);
    }

    #[test]
    fn concurrent_boundary_consumes_deduct_exactly_once() {
        let (_tmp, ledger) = open_ledger(1, 20);
        let ledger = Arc::new(ledger);

        // Drive the account to {credits: 1, message_count: 19}.
        for _ in 0..19 {
            ledger.consume_message("race_user").unwrap();
        }

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.consume_message("race_user").unwrap())
            })
            .collect();
        let outcomes: Vec<ConsumeOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let deductions = outcomes.iter().filter(|o| o.credit_deducted).count();
        assert_eq!(deductions, 1, "exactly one call crosses the boundary");

        let balance = ledger.balance("race_user").unwrap();
        assert_eq!(balance.credits, 0, "credits end at 0, never negative");
        assert_eq!(balance.message_count, 0);
    }
}
