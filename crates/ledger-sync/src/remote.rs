//! # Remote Store Client
//!
//! The shared multi-branch ledger, reached over PostgreSQL.
//!
//! ## Contract
//! - The pool is LAZY: constructing a [`RemoteStore`] never touches the
//!   network, so the device boots fine fully offline. Connections are
//!   opened per operation and every operation is bounded by the
//!   configured timeout; expiry is handled exactly like "unreachable".
//! - The core never alters the remote schema. It inserts/updates rows
//!   matching the agreed shapes (text uuid keys, bigint cents, date and
//!   timestamptz columns) with `$n` bound parameters, inside remote
//!   transactions that commit or roll back remote-side only.
//! - Mirror writes are keyed on the row id with `ON CONFLICT DO NOTHING`,
//!   so a re-pushed outbox entry (crash between remote commit and local
//!   bookkeeping) cannot duplicate a bill.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::debug;

use ledger_core::{AdvanceBill, AdvanceBillItem, Bill, BillItem, Branch, Expense};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::replicator::{ColumnKind, FilterValue, PullFilter, PulledRow, SqlValue, TableSpec};

/// Client for the shared remote ledger.
#[derive(Clone)]
pub struct RemoteStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl RemoteStore {
    /// Builds the client with a lazy pool. Fails only on configuration
    /// errors (missing/invalid URL), never on network state.
    pub fn connect_lazy(config: &SyncConfig) -> SyncResult<Self> {
        let url = config
            .remote_url()
            .ok_or(SyncError::RemoteNotConfigured)?;

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(config.remote.connect_timeout_secs))
            .connect_lazy(url)
            .map_err(|e| SyncError::InvalidUrl(e.to_string()))?;

        Ok(RemoteStore {
            pool,
            op_timeout: Duration::from_secs(config.remote.operation_timeout_secs),
        })
    }

    /// Bounds a remote operation by the configured timeout.
    async fn bounded<T, F>(&self, fut: F) -> SyncResult<T>
    where
        F: std::future::Future<Output = SyncResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.op_timeout.as_secs())),
        }
    }

    // =========================================================================
    // Authentication lookup
    // =========================================================================

    /// Finds a branch row by login name in the shared store.
    pub async fn find_branch(&self, username: &str) -> SyncResult<Option<Branch>> {
        let username = username.to_string();
        self.bounded(async {
            sqlx::query_as::<_, Branch>(
                "SELECT id, branch_no, name, username, password_hash, address, tax_id, \
                 created_at FROM branches WHERE username = $1",
            )
            .bind(&username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))
        })
        .await
    }

    // =========================================================================
    // Mirror writes
    // =========================================================================

    /// Inserts a bill header and its items in one remote transaction.
    pub async fn mirror_bill(&self, bill: &Bill, items: &[BillItem]) -> SyncResult<()> {
        self.bounded(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;

            sqlx::query(
                "INSERT INTO bills \
                 (id, branch_no, invoice_no, bill_type, customer_id, bill_date, \
                  taxable_cents, tax_cents, discount_cents, total_cents, \
                  payment_type, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(&bill.id)
            .bind(bill.branch_no)
            .bind(&bill.invoice_no)
            .bind(bill.bill_type.as_str())
            .bind(&bill.customer_id)
            .bind(bill.bill_date)
            .bind(bill.taxable_cents)
            .bind(bill.tax_cents)
            .bind(bill.discount_cents)
            .bind(bill.total_cents)
            .bind(bill.payment_type.as_str())
            .bind(bill.created_at)
            .bind(bill.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;

            for item in items {
                sqlx::query(
                    "INSERT INTO bill_items \
                     (id, bill_id, product_id, quantity, unit_price_cents, \
                      taxable_cents, tax_cents, line_total_cents) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (id) DO NOTHING",
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
                .await
                .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;
            }

            tx.commit()
                .await
                .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;

            debug!(invoice_no = %bill.invoice_no, "Bill mirrored to remote store");
            Ok(())
        })
        .await
    }

    /// Inserts an advance bill and its items in one remote transaction.
    pub async fn mirror_advance(
        &self,
        bill: &AdvanceBill,
        items: &[AdvanceBillItem],
    ) -> SyncResult<()> {
        self.bounded(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;

            sqlx::query(
                "INSERT INTO advance_bills \
                 (id, branch_no, invoice_no, customer_id, bill_date, \
                  taxable_cents, tax_cents, discount_cents, total_cents, \
                  advance_cents, balance_cents, payment_type, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
                 ON CONFLICT (id) DO NOTHING",
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
            .bind(bill.payment_type.as_str())
            .bind(bill.created_at)
            .bind(bill.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;

            for item in items {
                sqlx::query(
                    "INSERT INTO advance_bill_items \
                     (id, bill_id, product_id, quantity, unit_price_cents, \
                      taxable_cents, tax_cents, line_total_cents) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (id) DO NOTHING",
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
                .await
                .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;
            }

            tx.commit()
                .await
                .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;

            Ok(())
        })
        .await
    }

    /// Inserts an expense row.
    pub async fn mirror_expense(&self, expense: &Expense) -> SyncResult<()> {
        self.bounded(async {
            sqlx::query(
                "INSERT INTO expenses \
                 (id, branch_no, category_id, amount_cents, note, expense_date, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(&expense.id)
            .bind(expense.branch_no)
            .bind(&expense.category_id)
            .bind(expense.amount_cents)
            .bind(&expense.note)
            .bind(expense.expense_date)
            .bind(expense.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;

            Ok(())
        })
        .await
    }

    /// Applies an amendment remotely: new invoice number and payment type
    /// on the existing row, inside a remote transaction.
    ///
    /// Zero rows affected means the original insert has not reached the
    /// remote store yet; the error is retryable and the outbox keeps the
    /// entry until the insert lands first (entries flush oldest-first).
    pub async fn apply_bill_amend(
        &self,
        bill_id: &str,
        new_invoice_no: &str,
        new_payment_type: &str,
    ) -> SyncResult<()> {
        let bill_id = bill_id.to_string();
        let new_invoice_no = new_invoice_no.to_string();
        let new_payment_type = new_payment_type.to_string();

        self.bounded(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;

            let result = sqlx::query(
                "UPDATE bills SET invoice_no = $2, payment_type = $3, updated_at = now() \
                 WHERE id = $1",
            )
            .bind(&bill_id)
            .bind(&new_invoice_no)
            .bind(&new_payment_type)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;

            if result.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;
                return Err(SyncError::RemoteWrite(format!(
                    "bill {bill_id} not present remotely yet"
                )));
            }

            tx.commit()
                .await
                .map_err(|e| SyncError::RemoteWrite(e.to_string()))?;

            Ok(())
        })
        .await
    }

    // =========================================================================
    // Replication reads
    // =========================================================================

    /// Fetches rows for a table spec with an optional filter, normalizing
    /// values to the portable [`SqlValue`] form.
    pub async fn fetch_rows(
        &self,
        spec: &TableSpec,
        filter: &PullFilter,
    ) -> SyncResult<Vec<PulledRow>> {
        let mut sql = format!("SELECT {} FROM {}", spec.select_list(), spec.remote_name());

        let bound: Vec<FilterValue> = match filter {
            PullFilter::None => Vec::new(),
            PullFilter::Eq(column, value) => {
                sql.push_str(&format!(" WHERE {column} = $1"));
                vec![value.clone()]
            }
            PullFilter::In(column, values) => {
                if values.is_empty() {
                    return Ok(Vec::new());
                }
                let placeholders: Vec<String> =
                    (1..=values.len()).map(|i| format!("${i}")).collect();
                sql.push_str(&format!(
                    " WHERE {column} IN ({})",
                    placeholders.join(", ")
                ));
                values.clone()
            }
        };

        let spec = *spec;
        self.bounded(async move {
            let mut q = sqlx::query(&sql);
            for value in &bound {
                q = match value {
                    FilterValue::Int(v) => q.bind(*v),
                    FilterValue::Text(v) => q.bind(v.as_str()),
                };
            }

            let rows = q
                .fetch_all(&self.pool)
                .await
                .map_err(|e| SyncError::RemoteQuery(e.to_string()))?;

            rows.iter().map(|row| decode_row(&spec, row)).collect()
        })
        .await
    }
}

/// Decodes one remote row into the portable value form, by column kind.
fn decode_row(spec: &TableSpec, row: &sqlx::postgres::PgRow) -> SyncResult<PulledRow> {
    let mut values = Vec::with_capacity(spec.columns.len());

    for (index, column) in spec.columns.iter().enumerate() {
        let value = match column.kind {
            ColumnKind::Text => row
                .try_get::<Option<String>, _>(index)
                .map(|v| v.map(SqlValue::Text)),
            ColumnKind::Integer => row
                .try_get::<Option<i64>, _>(index)
                .map(|v| v.map(SqlValue::Integer)),
            ColumnKind::Real => row
                .try_get::<Option<f64>, _>(index)
                .map(|v| v.map(SqlValue::Real)),
            ColumnKind::Boolean => row
                .try_get::<Option<bool>, _>(index)
                .map(|v| v.map(|b| SqlValue::Integer(b as i64))),
            ColumnKind::Timestamp => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
                .map(|v| v.map(|ts| SqlValue::Text(ts.to_rfc3339()))),
            ColumnKind::Date => row
                .try_get::<Option<chrono::NaiveDate>, _>(index)
                .map(|v| v.map(|d| SqlValue::Text(d.to_string()))),
        }
        .map_err(|e| {
            SyncError::RemoteQuery(format!(
                "{}.{}: decode failed: {e}",
                spec.local_table, column.name
            ))
        })?;

        values.push(value.unwrap_or(SqlValue::Null));
    }

    Ok(values)
}
