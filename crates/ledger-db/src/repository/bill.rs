//! # Bill Repository
//!
//! Sale ledger persistence.
//!
//! ## Atomicity Contract
//! A bill commits as a unit: header, every line item, and the outbox entry
//! that mirrors it land in ONE transaction. Either the sale exists with
//! all of its parts and its pending remote write, or nothing exists.
//!
//! Amendments follow the same rule: the header update and the `amend`
//! outbox entry commit together, with `synced` reset to 0 until the
//! mirror confirms the remote side.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::query::{self, BillFilter, BillSummaryRow, SalesTotalRow};
use ledger_core::{Bill, BillItem, OutboxEntry, PaymentType};

const BILL_COLUMNS: &str = "id, branch_no, invoice_no, bill_type, customer_id, bill_date, \
     taxable_cents, tax_cents, discount_cents, total_cents, payment_type, \
     synced, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, bill_id, product_id, quantity, unit_price_cents, \
     taxable_cents, tax_cents, line_total_cents";

/// One bill line enriched with its referenced product (print/report reads).
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct EnrichedBillItem {
    pub id: String,
    pub bill_id: String,
    pub product_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub taxable_cents: i64,
    pub tax_cents: i64,
    pub line_total_cents: i64,
    pub product_name: Option<String>,
    pub product_unit: Option<String>,
    pub product_tax_rate_bps: Option<u32>,
}

/// Repository for sale ledger operations.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    /// Creates a new BillRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    /// Inserts a bill header, its items, and (when given) the outbox entry
    /// mirroring it - all in one transaction.
    pub async fn insert_with_items(
        &self,
        bill: &Bill,
        items: &[BillItem],
        outbox: Option<&OutboxEntry>,
    ) -> DbResult<()> {
        debug!(
            id = %bill.id,
            invoice_no = %bill.invoice_no,
            items = items.len(),
            "Inserting bill"
        );

        let mut tx = self.pool.begin().await?;

        insert_header(&mut tx, bill).await?;

        for item in items {
            insert_item(&mut tx, item).await?;
        }

        if let Some(entry) = outbox {
            super::outbox::insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a bill by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Bill>> {
        let bill = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    /// Gets a bill by its invoice number within a branch.
    pub async fn get_by_invoice(
        &self,
        branch_no: i64,
        invoice_no: &str,
    ) -> DbResult<Option<Bill>> {
        let bill = sqlx::query_as::<_, Bill>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills \
             WHERE branch_no = ?1 AND invoice_no = ?2"
        ))
        .bind(branch_no)
        .bind(invoice_no)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bill)
    }

    /// Gets all items for a bill, in insertion order.
    pub async fn items(&self, bill_id: &str) -> DbResult<Vec<BillItem>> {
        let items = sqlx::query_as::<_, BillItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM bill_items WHERE bill_id = ?1 ORDER BY rowid"
        ))
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets bill items joined with their product rows.
    pub async fn items_with_products(&self, bill_id: &str) -> DbResult<Vec<EnrichedBillItem>> {
        let items = sqlx::query_as::<_, EnrichedBillItem>(
            "SELECT i.id, i.bill_id, i.product_id, i.quantity, i.unit_price_cents, \
             i.taxable_cents, i.tax_cents, i.line_total_cents, \
             p.name AS product_name, p.unit AS product_unit, \
             p.tax_rate_bps AS product_tax_rate_bps \
             FROM bill_items i \
             LEFT JOIN products p ON p.id = i.product_id \
             WHERE i.bill_id = ?1 ORDER BY i.rowid",
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sets the synced flag on a bill.
    pub async fn mark_synced(&self, id: &str, synced: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE bills SET synced = ?2 WHERE id = ?1")
            .bind(id)
            .bind(synced)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Bill", id));
        }

        Ok(())
    }

    /// Applies an amendment: new invoice number and payment type, synced
    /// reset to 0, plus the `amend` outbox entry - one transaction.
    ///
    /// Fails with `NotFound` when the bill id matches no row.
    pub async fn amend(
        &self,
        id: &str,
        new_invoice_no: &str,
        new_payment_type: PaymentType,
        outbox: &OutboxEntry,
    ) -> DbResult<()> {
        let now = chrono::Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE bills SET invoice_no = ?2, payment_type = ?3, synced = 0, \
             updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(new_invoice_no)
        .bind(new_payment_type)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Bill", id));
        }

        super::outbox::insert_entry(&mut tx, outbox).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Paginated, filtered bill list with joined customer names.
    pub async fn list(&self, filter: &BillFilter) -> DbResult<Vec<BillSummaryRow>> {
        let mut qb = query::bill_select(filter);
        let rows = qb
            .build_query_as::<BillSummaryRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Total row count for the same filter (pagination).
    pub async fn count(&self, filter: &BillFilter) -> DbResult<i64> {
        let mut qb = query::bill_count(filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(count)
    }

    /// Per-payment-type totals over a date range.
    pub async fn sales_summary(
        &self,
        branch_no: i64,
        date_from: chrono::NaiveDate,
        date_to: chrono::NaiveDate,
    ) -> DbResult<Vec<SalesTotalRow>> {
        let mut qb = query::sales_summary(branch_no, date_from, date_to);
        let rows = qb
            .build_query_as::<SalesTotalRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

async fn insert_header(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    bill: &Bill,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO bills \
         (id, branch_no, invoice_no, bill_type, customer_id, bill_date, \
          taxable_cents, tax_cents, discount_cents, total_cents, payment_type, \
          synced, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    )
    .bind(&bill.id)
    .bind(bill.branch_no)
    .bind(&bill.invoice_no)
    .bind(bill.bill_type)
    .bind(&bill.customer_id)
    .bind(bill.bill_date)
    .bind(bill.taxable_cents)
    .bind(bill.tax_cents)
    .bind(bill.discount_cents)
    .bind(bill.total_cents)
    .bind(bill.payment_type)
    .bind(bill.synced)
    .bind(bill.created_at)
    .bind(bill.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item: &BillItem,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO bill_items \
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
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{NaiveDate, Utc};
    use ledger_core::{Bill, BillItem, BillType, PaymentType};
    use uuid::Uuid;

    fn bill(invoice_no: &str, payment: PaymentType, total: i64) -> Bill {
        let now = Utc::now();
        Bill {
            id: Uuid::new_v4().to_string(),
            branch_no: 1,
            invoice_no: invoice_no.to_string(),
            bill_type: BillType::Sale,
            customer_id: None,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            taxable_cents: total,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: total,
            payment_type: payment,
            synced: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(bill_id: &str, qty: i64, unit: i64) -> BillItem {
        BillItem {
            id: Uuid::new_v4().to_string(),
            bill_id: bill_id.to_string(),
            product_id: None,
            quantity: qty,
            unit_price_cents: unit,
            taxable_cents: qty * unit,
            tax_cents: 0,
            line_total_cents: qty * unit,
        }
    }

    #[tokio::test]
    async fn test_insert_round_trip_with_items() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bills();

        let b = bill("INVCL1-00001", PaymentType::Cash, 500);
        let items = vec![item(&b.id, 2, 150), item(&b.id, 1, 200)];

        repo.insert_with_items(&b, &items, None).await.unwrap();

        let stored = repo.get_by_invoice(1, "INVCL1-00001").await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 500);
        assert!(!stored.synced);

        let stored_items = repo.items(&b.id).await.unwrap();
        assert_eq!(stored_items.len(), 2);
        assert_eq!(stored_items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_rejected_whole_transaction() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bills();

        let first = bill("INVCL1-00001", PaymentType::Cash, 100);
        repo.insert_with_items(&first, &[item(&first.id, 1, 100)], None)
            .await
            .unwrap();

        // same invoice number: header insert fails, nothing of the second
        // bill may remain
        let dup = bill("INVCL1-00001", PaymentType::Cash, 900);
        let err = repo
            .insert_with_items(&dup, &[item(&dup.id, 3, 300)], None)
            .await
            .unwrap_err();
        assert!(err.is_duplicate());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bill_items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_mark_synced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bills();

        let b = bill("INVOL1-00001", PaymentType::Online, 250);
        repo.insert_with_items(&b, &[item(&b.id, 1, 250)], None)
            .await
            .unwrap();

        repo.mark_synced(&b.id, true).await.unwrap();
        assert!(repo.get_by_id(&b.id).await.unwrap().unwrap().synced);

        let missing = repo.mark_synced("no-such-id", true).await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_by_payment_type() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bills();

        let cash = bill("INVCL1-00001", PaymentType::Cash, 100);
        let online = bill("INVOL1-00001", PaymentType::Online, 200);
        repo.insert_with_items(&cash, &[item(&cash.id, 1, 100)], None)
            .await
            .unwrap();
        repo.insert_with_items(&online, &[item(&online.id, 1, 200)], None)
            .await
            .unwrap();

        let filter = BillFilter {
            branch_no: Some(1),
            payment_type: Some(PaymentType::Cash),
            page: 1,
            per_page: 10,
            ..Default::default()
        };

        let rows = repo.list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].invoice_no, "INVCL1-00001");
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }
}
