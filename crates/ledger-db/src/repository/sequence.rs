//! # Sequence Allocator
//!
//! Atomic allocation of invoice numbers and KOT tokens.
//!
//! ## Allocation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                allocate(branch_no, category)                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE sequence_counters SET last_value = last_value + 1    │   │
//! │  │     WHERE branch_no = ? AND category = ? RETURNING last_value   │   │
//! │  │                                                                 │   │
//! │  │  2. No counter row yet? Seed it from the highest existing       │   │
//! │  │     token with the prefix (legacy data keeps its sequence)      │   │
//! │  │     and INSERT the row at seed + 1                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT → "{prefix}-{:05}"                                              │
//! │                                                                         │
//! │  Two concurrent calls on the same prefix serialize on the counter      │
//! │  row; they can never return the same value.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `peek` is the read-only half of the preview/commit pair: it reports the
//! token the next allocation will produce without reserving it, so a
//! preview never burns a number and repeated previews agree until a
//! commit lands.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use ledger_core::sequence::{format_token, parse_suffix};
use ledger_core::SequenceCategory;

/// Atomic per-(branch, category) token allocator.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    pool: SqlitePool,
}

impl SequenceAllocator {
    /// Creates a new SequenceAllocator.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceAllocator { pool }
    }

    /// Allocates and returns the next token for the pair.
    ///
    /// Sequential calls return strictly increasing suffixes; the counter
    /// update and (on first use) the seeding scan commit together.
    pub async fn allocate(
        &self,
        branch_no: i64,
        category: SequenceCategory,
    ) -> DbResult<String> {
        let prefix = category.prefix(branch_no);
        let mut tx = self.pool.begin().await?;

        let bumped: Option<i64> = sqlx::query_scalar(
            "UPDATE sequence_counters SET last_value = last_value + 1 \
             WHERE branch_no = ?1 AND category = ?2 RETURNING last_value",
        )
        .bind(branch_no)
        .bind(category.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let value = match bumped {
            Some(v) => v,
            None => {
                let seed = highest_existing(&mut *tx, branch_no, &prefix, category).await?;
                let next = seed + 1;

                sqlx::query(
                    "INSERT INTO sequence_counters (branch_no, category, last_value) \
                     VALUES (?1, ?2, ?3)",
                )
                .bind(branch_no)
                .bind(category.as_str())
                .bind(next)
                .execute(&mut *tx)
                .await?;

                debug!(branch_no, category = %category, seed, "Seeded sequence counter");
                next
            }
        };

        tx.commit().await?;

        Ok(format_token(&prefix, value))
    }

    /// Returns the token the next allocation would produce, WITHOUT
    /// reserving it.
    pub async fn peek(&self, branch_no: i64, category: SequenceCategory) -> DbResult<String> {
        let prefix = category.prefix(branch_no);

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM sequence_counters \
             WHERE branch_no = ?1 AND category = ?2",
        )
        .bind(branch_no)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let next = match current {
            Some(v) => v + 1,
            None => {
                let mut conn = self.pool.acquire().await?;
                highest_existing(&mut *conn, branch_no, &prefix, category).await? + 1
            }
        };

        Ok(format_token(&prefix, next))
    }
}

/// Highest numeric suffix among existing tokens with the prefix, 0 when
/// none exist. KOT tokens live in `kot_orders`; invoice prefixes are
/// scanned across both ledgers.
async fn highest_existing(
    conn: &mut SqliteConnection,
    branch_no: i64,
    prefix: &str,
    category: SequenceCategory,
) -> DbResult<i64> {
    let pattern = format!("{prefix}-%");

    let candidates: Vec<Option<String>> = if category.is_kot() {
        vec![
            sqlx::query_scalar(
                "SELECT token FROM kot_orders \
                 WHERE branch_no = ?1 AND token LIKE ?2 \
                 ORDER BY token DESC LIMIT 1",
            )
            .bind(branch_no)
            .bind(&pattern)
            .fetch_optional(&mut *conn)
            .await?,
        ]
    } else {
        vec![
            sqlx::query_scalar(
                "SELECT invoice_no FROM bills \
                 WHERE branch_no = ?1 AND invoice_no LIKE ?2 \
                 ORDER BY invoice_no DESC LIMIT 1",
            )
            .bind(branch_no)
            .bind(&pattern)
            .fetch_optional(&mut *conn)
            .await?,
            sqlx::query_scalar(
                "SELECT invoice_no FROM advance_bills \
                 WHERE branch_no = ?1 AND invoice_no LIKE ?2 \
                 ORDER BY invoice_no DESC LIMIT 1",
            )
            .bind(branch_no)
            .bind(&pattern)
            .fetch_optional(&mut *conn)
            .await?,
        ]
    };

    let highest = candidates
        .into_iter()
        .flatten()
        .filter_map(|token| parse_suffix(&token).ok())
        .max()
        .unwrap_or(0);

    Ok(highest)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_first_allocation_starts_at_one() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        let token = seq.allocate(1, SequenceCategory::Cash).await.unwrap();
        assert_eq!(token, "INVCL1-00001");

        let token = seq.allocate(1, SequenceCategory::Cash).await.unwrap();
        assert_eq!(token, "INVCL1-00002");
    }

    #[tokio::test]
    async fn test_sequences_are_independent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        assert_eq!(
            seq.allocate(1, SequenceCategory::Cash).await.unwrap(),
            "INVCL1-00001"
        );
        assert_eq!(
            seq.allocate(1, SequenceCategory::Online).await.unwrap(),
            "INVOL1-00001"
        );
        assert_eq!(
            seq.allocate(2, SequenceCategory::Cash).await.unwrap(),
            "INVCL2-00001"
        );
        assert_eq!(
            seq.allocate(1, SequenceCategory::Kot).await.unwrap(),
            "KOT1-00001"
        );
    }

    #[tokio::test]
    async fn test_sequential_allocations_increase() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        let mut tokens = Vec::new();
        for _ in 0..5 {
            tokens.push(seq.allocate(7, SequenceCategory::Default).await.unwrap());
        }

        let expected: Vec<String> =
            (1..=5).map(|n| format!("INV7-{:05}", n)).collect();
        assert_eq!(tokens, expected);
    }

    #[tokio::test]
    async fn test_counter_seeds_from_legacy_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        // a pre-existing invoice from before the counter table was in use
        sqlx::query(
            "INSERT INTO bills (id, branch_no, invoice_no, bill_type, bill_date, \
             payment_type, created_at, updated_at) \
             VALUES ('b1', 1, 'INVCL1-00041', 'sale', '2025-01-01', 'cash', \
             '2025-01-01T10:00:00Z', '2025-01-01T10:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let token = db.sequences().allocate(1, SequenceCategory::Cash).await.unwrap();
        assert_eq!(token, "INVCL1-00042");
    }

    #[tokio::test]
    async fn test_peek_does_not_reserve() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        let preview = seq.peek(1, SequenceCategory::Cash).await.unwrap();
        assert_eq!(preview, "INVCL1-00001");

        // repeated previews agree
        assert_eq!(seq.peek(1, SequenceCategory::Cash).await.unwrap(), preview);

        // the allocation gets the previewed value
        assert_eq!(
            seq.allocate(1, SequenceCategory::Cash).await.unwrap(),
            preview
        );
        assert_eq!(
            seq.peek(1, SequenceCategory::Cash).await.unwrap(),
            "INVCL1-00002"
        );
    }
}
