//! # Expense Repository
//!
//! Branch-scoped expense rows. Like the ledgers, an expense commits
//! together with its outbox entry so offline-recorded expenses reach the
//! remote store eventually.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::query::{self, ExpenseFilter};
use ledger_core::{Expense, OutboxEntry};

/// Repository for expenses.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Inserts an expense and (when given) its outbox entry in one
    /// transaction.
    pub async fn insert(
        &self,
        expense: &Expense,
        outbox: Option<&OutboxEntry>,
    ) -> DbResult<()> {
        debug!(id = %expense.id, amount_cents = expense.amount_cents, "Inserting expense");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO expenses \
             (id, branch_no, category_id, amount_cents, note, expense_date, synced, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&expense.id)
        .bind(expense.branch_no)
        .bind(&expense.category_id)
        .bind(expense.amount_cents)
        .bind(&expense.note)
        .bind(expense.expense_date)
        .bind(expense.synced)
        .bind(expense.created_at)
        .execute(&mut *tx)
        .await?;

        if let Some(entry) = outbox {
            super::outbox::insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an expense by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            "SELECT id, branch_no, category_id, amount_cents, note, expense_date, \
             synced, created_at FROM expenses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expense)
    }

    /// Filtered expense list, newest first.
    pub async fn list(&self, filter: &ExpenseFilter) -> DbResult<Vec<Expense>> {
        let mut qb = query::expense_select(filter);
        let rows = qb.build_query_as::<Expense>().fetch_all(&self.pool).await?;

        Ok(rows)
    }

    /// Sets the synced flag.
    pub async fn mark_synced(&self, id: &str, synced: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE expenses SET synced = ?2 WHERE id = ?1")
            .bind(id)
            .bind(synced)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_insert_and_filter() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.expenses();

        for (branch, amount) in [(1, 500), (1, 700), (2, 900)] {
            repo.insert(
                &Expense {
                    id: Uuid::new_v4().to_string(),
                    branch_no: branch,
                    category_id: None,
                    amount_cents: amount,
                    note: None,
                    expense_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                    synced: false,
                    created_at: Utc::now(),
                },
                None,
            )
            .await
            .unwrap();
        }

        let filter = ExpenseFilter {
            branch_no: Some(1),
            ..Default::default()
        };
        let rows = repo.list(&filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|e| e.branch_no == 1));
    }
}
