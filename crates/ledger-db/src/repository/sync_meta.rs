//! # Sync Meta Repository
//!
//! Per-table last-synchronized timestamps, stamped by the replicator on
//! every successful apply. Surfaced for operational visibility; nothing
//! in the core reads it back for its own logic.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use ledger_core::SyncMeta;

/// Repository for sync timestamps.
#[derive(Debug, Clone)]
pub struct SyncMetaRepository {
    pool: SqlitePool,
}

impl SyncMetaRepository {
    /// Creates a new SyncMetaRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncMetaRepository { pool }
    }

    /// Upserts the last-sync timestamp for a table.
    pub async fn stamp(&self, table_name: &str, when: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO sync_meta (table_name, last_synced_at) VALUES (?1, ?2) \
             ON CONFLICT(table_name) DO UPDATE SET last_synced_at = excluded.last_synced_at",
        )
        .bind(table_name)
        .bind(when)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets the last-sync timestamp for a table.
    pub async fn get(&self, table_name: &str) -> DbResult<Option<SyncMeta>> {
        let meta = sqlx::query_as::<_, SyncMeta>(
            "SELECT table_name, last_synced_at FROM sync_meta WHERE table_name = ?1",
        )
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meta)
    }

    /// Lists all stamps.
    pub async fn list(&self) -> DbResult<Vec<SyncMeta>> {
        let rows = sqlx::query_as::<_, SyncMeta>(
            "SELECT table_name, last_synced_at FROM sync_meta ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_stamp_upserts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_meta();

        let first = Utc::now();
        repo.stamp("products", first).await.unwrap();

        let later = first + chrono::Duration::seconds(60);
        repo.stamp("products", later).await.unwrap();

        let stored = repo.get("products").await.unwrap().unwrap();
        assert_eq!(stored.last_synced_at, later);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
