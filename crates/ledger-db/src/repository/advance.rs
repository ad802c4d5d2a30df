//! # Advance Bill Repository
//!
//! The deposit ledger, structurally parallel to [`super::bill`]: a header
//! with advance/balance amounts, its line items, and the outbox entry all
//! commit in one transaction.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use ledger_core::{AdvanceBill, AdvanceBillItem, OutboxEntry};

const ADVANCE_COLUMNS: &str = "id, branch_no, invoice_no, customer_id, bill_date, \
     taxable_cents, tax_cents, discount_cents, total_cents, advance_cents, \
     balance_cents, payment_type, synced, created_at, updated_at";

/// Repository for the advance (deposit) ledger.
#[derive(Debug, Clone)]
pub struct AdvanceRepository {
    pool: SqlitePool,
}

impl AdvanceRepository {
    /// Creates a new AdvanceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AdvanceRepository { pool }
    }

    /// Inserts an advance bill, its items, and (when given) the outbox
    /// entry mirroring it - all in one transaction.
    pub async fn insert_with_items(
        &self,
        bill: &AdvanceBill,
        items: &[AdvanceBillItem],
        outbox: Option<&OutboxEntry>,
    ) -> DbResult<()> {
        debug!(
            id = %bill.id,
            invoice_no = %bill.invoice_no,
            advance_cents = bill.advance_cents,
            "Inserting advance bill"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO advance_bills \
             (id, branch_no, invoice_no, customer_id, bill_date, \
              taxable_cents, tax_cents, discount_cents, total_cents, \
              advance_cents, balance_cents, payment_type, synced, \
              created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&bill.id)
        .bind(bill.branch_no)
        .bind(&bill.invoice_no)
        .bind(&bill.customer_id)
        .bind(bill.bill_date)
        .bind(bill.taxable_cents)
        .bind(bill.tax_cents)
        .bind(bill.discount_cents)
        .bind(bill.total_cents)
        .bind(bill.advance_cents)
        .bind(bill.balance_cents)
        .bind(bill.payment_type)
        .bind(bill.synced)
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO advance_bill_items \
                 (id, bill_id, product_id, quantity, unit_price_cents, \
                  taxable_cents, tax_cents, line_total_cents) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&item.id)
            .bind(&item.bill_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.taxable_cents)
            .bind(item.tax_cents)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(entry) = outbox {
            super::outbox::insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an advance bill by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<AdvanceBill>> {
        let bill = sqlx::query_as::<_, AdvanceBill>(&format!(
            "SELECT {ADVANCE_COLUMNS} FROM advance_bills WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    /// Gets an advance bill by its invoice number within a branch.
    pub async fn get_by_invoice(
        &self,
        branch_no: i64,
        invoice_no: &str,
    ) -> DbResult<Option<AdvanceBill>> {
        let bill = sqlx::query_as::<_, AdvanceBill>(&format!(
            "SELECT {ADVANCE_COLUMNS} FROM advance_bills \
             WHERE branch_no = ?1 AND invoice_no = ?2"
        ))
        .bind(branch_no)
        .bind(invoice_no)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    /// Gets all items for an advance bill.
    pub async fn items(&self, bill_id: &str) -> DbResult<Vec<AdvanceBillItem>> {
        let items = sqlx::query_as::<_, AdvanceBillItem>(
            "SELECT id, bill_id, product_id, quantity, unit_price_cents, \
             taxable_cents, tax_cents, line_total_cents \
             FROM advance_bill_items WHERE bill_id = ?1 ORDER BY rowid",
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sets the synced flag.
    pub async fn mark_synced(&self, id: &str, synced: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE advance_bills SET synced = ?2 WHERE id = ?1")
            .bind(id)
            .bind(synced)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("AdvanceBill", id));
        }

        Ok(())
    }

    /// Recent advance bills for a branch, newest first.
    pub async fn list_recent(&self, branch_no: i64, limit: u32) -> DbResult<Vec<AdvanceBill>> {
        let bills = sqlx::query_as::<_, AdvanceBill>(&format!(
            "SELECT {ADVANCE_COLUMNS} FROM advance_bills \
             WHERE branch_no = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))
        .bind(branch_no)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(bills)
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
    use ledger_core::PaymentType;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_advance_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.advances();

        let now = Utc::now();
        let bill = AdvanceBill {
            id: Uuid::new_v4().to_string(),
            branch_no: 2,
            invoice_no: "INV2-00001".to_string(),
            customer_id: None,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            taxable_cents: 1_000,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: 1_000,
            advance_cents: 400,
            balance_cents: 600,
            payment_type: PaymentType::Cash,
            synced: false,
            created_at: now,
            updated_at: now,
        };
        let item = AdvanceBillItem {
            id: Uuid::new_v4().to_string(),
            bill_id: bill.id.clone(),
            product_id: None,
            quantity: 4,
            unit_price_cents: 250,
            taxable_cents: 1_000,
            tax_cents: 0,
            line_total_cents: 1_000,
        };

        repo.insert_with_items(&bill, &[item], None).await.unwrap();

        let stored = repo.get_by_invoice(2, "INV2-00001").await.unwrap().unwrap();
        assert_eq!(stored.advance_cents, 400);
        assert_eq!(stored.balance_cents, 600);
        assert_eq!(repo.items(&bill.id).await.unwrap().len(), 1);

        repo.mark_synced(&bill.id, true).await.unwrap();
        assert!(repo.get_by_id(&bill.id).await.unwrap().unwrap().synced);
    }
}
