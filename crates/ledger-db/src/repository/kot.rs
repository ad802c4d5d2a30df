//! # KOT Repository
//!
//! Kitchen order ticket persistence. Creation commits the header and its
//! lines together; status changes are conditional single-row updates so a
//! concurrent transition or a missing row surfaces as `NotFound` instead
//! of silently overwriting.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use ledger_core::{KotItem, KotOrder, KotStatus};

const ORDER_COLUMNS: &str =
    "id, branch_no, token, status, table_no, note, created_at, updated_at";

/// Repository for kitchen order tickets.
#[derive(Debug, Clone)]
pub struct KotRepository {
    pool: SqlitePool,
}

impl KotRepository {
    /// Creates a new KotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        KotRepository { pool }
    }

    /// Inserts an order header and its items in one transaction.
    pub async fn insert_with_items(
        &self,
        order: &KotOrder,
        items: &[KotItem],
    ) -> DbResult<()> {
        debug!(id = %order.id, token = %order.token, items = items.len(), "Inserting KOT");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO kot_orders \
             (id, branch_no, token, status, table_no, note, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&order.id)
        .bind(order.branch_no)
        .bind(&order.token)
        .bind(order.status)
        .bind(&order.table_no)
        .bind(&order.note)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO kot_items (id, order_id, product_id, quantity, note) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(&item.note)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an order by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<KotOrder>> {
        let order = sqlx::query_as::<_, KotOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM kot_orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all items for an order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<KotItem>> {
        let items = sqlx::query_as::<_, KotItem>(
            "SELECT id, order_id, product_id, quantity, note \
             FROM kot_items WHERE order_id = ?1 ORDER BY rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Moves an order from `expected` to `next`, guarded on the current
    /// status. Zero rows affected means the order does not exist in the
    /// expected state (missing, or raced by another update).
    pub async fn update_status(
        &self,
        id: &str,
        expected: KotStatus,
        next: KotStatus,
    ) -> DbResult<()> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "UPDATE kot_orders SET status = ?3, updated_at = ?4 \
             WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("KotOrder", id));
        }

        Ok(())
    }

    /// Non-terminal orders for a branch, oldest first (urgency display).
    pub async fn open_orders(&self, branch_no: i64) -> DbResult<Vec<KotOrder>> {
        let orders = sqlx::query_as::<_, KotOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM kot_orders \
             WHERE branch_no = ?1 AND status IN ('pending', 'baking') \
             ORDER BY created_at ASC"
        ))
        .bind(branch_no)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use uuid::Uuid;

    fn order(token: &str) -> KotOrder {
        let now = Utc::now();
        KotOrder {
            id: Uuid::new_v4().to_string(),
            branch_no: 3,
            token: token.to_string(),
            status: KotStatus::Pending,
            table_no: Some("T2".to_string()),
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.kots();

        let o = order("KOT3-00001");
        let items = vec![KotItem {
            id: Uuid::new_v4().to_string(),
            order_id: o.id.clone(),
            product_id: None,
            quantity: 2,
            note: Some("no onions".to_string()),
        }];

        repo.insert_with_items(&o, &items).await.unwrap();

        let stored = repo.get_by_id(&o.id).await.unwrap().unwrap();
        assert_eq!(stored.status, KotStatus::Pending);
        assert_eq!(repo.items(&o.id).await.unwrap().len(), 1);
        assert_eq!(repo.open_orders(3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guarded_status_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.kots();

        let o = order("KOT3-00002");
        repo.insert_with_items(&o, &[]).await.unwrap();

        repo.update_status(&o.id, KotStatus::Pending, KotStatus::Baking)
            .await
            .unwrap();

        // guard mismatch: the order is no longer pending
        let stale = repo
            .update_status(&o.id, KotStatus::Pending, KotStatus::Cancelled)
            .await;
        assert!(matches!(stale, Err(DbError::NotFound { .. })));

        // unknown id
        let missing = repo
            .update_status("nope", KotStatus::Pending, KotStatus::Baking)
            .await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));

        repo.update_status(&o.id, KotStatus::Baking, KotStatus::Ready)
            .await
            .unwrap();
        assert!(repo.open_orders(3).await.unwrap().is_empty());
    }
}
