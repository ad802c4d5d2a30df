//! # Sync Outbox Repository
//!
//! The durable queue of remote writes that have not happened yet.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LOCAL OPERATION (e.g. record_sale)                                     │
//! │       │                                                                 │
//! │  ┌────▼────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. INSERT INTO bills / bill_items                              │   │
//! │  │  2. INSERT INTO sync_outbox (entity_type, entity_id, payload)   │   │
//! │  └────┬────────────────────────────────────────────────────────────┘   │
//! │       ▼                                                                 │
//! │  COMMIT ← the sale and its pending mirror commit together              │
//! │       │                                                                 │
//! │  ┌────▼────────────────────────────────────────────────────────────┐   │
//! │  │  MIRROR (ledger-sync)                                           │   │
//! │  │  • immediately after commit, and again on flush                 │   │
//! │  │  • success → mark_synced(entry) + bills.synced = 1              │   │
//! │  │  • failure → mark_failed(entry): attempts += 1, last_error      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  A sale is never lost: offline just means entries queue up.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use ledger_core::OutboxEntry;

const ENTRY_COLUMNS: &str = "id, entity_type, entity_id, op, payload, attempts, \
     last_error, created_at, attempted_at, synced_at";

/// Inserts an outbox entry on an existing connection, so callers can put
/// it inside the same transaction as the ledger row it mirrors.
pub(crate) async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: &OutboxEntry,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO sync_outbox \
         (id, entity_type, entity_id, op, payload, attempts, last_error, \
          created_at, attempted_at, synced_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&entry.id)
    .bind(&entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.op)
    .bind(&entry.payload)
    .bind(entry.attempts)
    .bind(&entry.last_error)
    .bind(entry.created_at)
    .bind(entry.attempted_at)
    .bind(entry.synced_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Repository for sync outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Queues an entry on its own (outside any ledger transaction).
    pub async fn queue(&self, entry: &OutboxEntry) -> DbResult<()> {
        debug!(
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            op = %entry.op,
            "Queuing for sync"
        );

        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, entry).await
    }

    /// Gets a single entry by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<OutboxEntry>> {
        let entry = sqlx::query_as::<_, OutboxEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_outbox WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Gets pending entries (`synced_at IS NULL`), oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_outbox \
             WHERE synced_at IS NULL ORDER BY created_at ASC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as successfully mirrored.
    pub async fn mark_synced(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE sync_outbox SET synced_at = ?2, attempted_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a mirror failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE sync_outbox SET attempts = attempts + 1, last_error = ?2, \
             attempted_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts pending entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_outbox WHERE synced_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes entries synced more than `days_old` days ago.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_old_entries(&self, days_old: u32) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM sync_outbox \
             WHERE synced_at IS NOT NULL \
             AND synced_at < datetime('now', '-' || ?1 || ' days')",
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
