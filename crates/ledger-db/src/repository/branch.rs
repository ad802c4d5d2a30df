//! # Branch Repository
//!
//! Branch identity rows and the single-active-branch invariant: after any
//! successful login exactly one row exists in `branches`. A local login
//! keeps the verified row and purges the rest; a remote login replaces the
//! whole table inside one transaction.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use ledger_core::Branch;

/// Repository for branch rows.
#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    /// Creates a new BranchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    /// Finds a branch by login name.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            "SELECT id, branch_no, name, username, password_hash, address, tax_id, created_at \
             FROM branches WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    /// Returns the active branch row, if any.
    pub async fn get_active(&self) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            "SELECT id, branch_no, name, username, password_hash, address, tax_id, created_at \
             FROM branches ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    /// Inserts a branch row (seeding and tests; logins use
    /// [`replace_all`](Self::replace_all)).
    pub async fn insert(&self, branch: &Branch) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO branches \
             (id, branch_no, name, username, password_hash, address, tax_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&branch.id)
        .bind(branch.branch_no)
        .bind(&branch.name)
        .bind(&branch.username)
        .bind(&branch.password_hash)
        .bind(&branch.address)
        .bind(&branch.tax_id)
        .bind(branch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes every branch row except the given one (local login path).
    ///
    /// ## Returns
    /// Number of purged rows.
    pub async fn purge_others(&self, keep_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM branches WHERE id != ?1")
            .bind(keep_id)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!(purged, keep_id = %keep_id, "Purged stale branch rows");
        }

        Ok(purged)
    }

    /// Replaces the whole branch table with the given row, atomically
    /// (remote login path).
    pub async fn replace_all(&self, branch: &Branch) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM branches").execute(&mut *tx).await?;

        sqlx::query(
            "INSERT INTO branches \
             (id, branch_no, name, username, password_hash, address, tax_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&branch.id)
        .bind(branch.branch_no)
        .bind(&branch.name)
        .bind(&branch.username)
        .bind(&branch.password_hash)
        .bind(&branch.address)
        .bind(&branch.tax_id)
        .bind(branch.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(branch_no = branch.branch_no, username = %branch.username, "Active branch replaced");
        Ok(())
    }

    /// Counts branch rows (invariant checks and diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM branches")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
