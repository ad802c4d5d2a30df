//! # Bulk Replicator
//!
//! Pull-based copy of remote rows into the local store.
//!
//! ## Pull Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      pull(spec, filter)                                 │
//! │                                                                         │
//! │  1. SELECT <columns> FROM <remote table>                               │
//! │     [WHERE col = $1 | WHERE col IN ($1…$n)]      ← values bound        │
//! │                                                                         │
//! │  2. Normalize: timestamps → RFC3339 text, dates → ISO text,            │
//! │     booleans → 0/1                                                     │
//! │                                                                         │
//! │  3. ONE local transaction:                                             │
//! │     INSERT OR IGNORE INTO <local table> (…) VALUES (…)  per row        │
//! │     → re-pulling rows that already exist is a no-op, never an error    │
//! │                                                                         │
//! │  4. Stamp sync_meta[local table] = now                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Used at application start (reference tables) and right after a remote
//! login (the branch's billing/expense history).

use chrono::Utc;
use tracing::{debug, info};

use ledger_db::{query, Database};

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;

// =============================================================================
// Table Specs
// =============================================================================

/// Portable column kinds driving both the remote decode and the local bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Date,
}

/// One replicated column. `remote_expr` substitutes a SQL expression for
/// the column on the remote side (e.g. pulled ledger rows are mirrored by
/// definition, so `synced` selects the constant 1).
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub remote_expr: Option<&'static str>,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        remote_expr: None,
    }
}

/// Declarative description of one replicated table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Local table name.
    pub local_table: &'static str,
    /// Remote table name when it differs from the local one.
    pub remote_table: Option<&'static str>,
    /// Replicated columns; the first column is the primary key.
    pub columns: &'static [Column],
}

impl TableSpec {
    /// Remote table name (defaults to the local name).
    pub fn remote_name(&self) -> &'static str {
        self.remote_table.unwrap_or(self.local_table)
    }

    /// Local column name list.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Remote SELECT list, honoring `remote_expr` substitutions.
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.remote_expr.unwrap_or(c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The replicated tables. Column order must match the local schema's
/// column names; the first column is the primary key.
pub mod tables {
    use super::{col, Column, ColumnKind::*, TableSpec};

    pub const CATEGORIES: TableSpec = TableSpec {
        local_table: "categories",
        remote_table: None,
        columns: &[col("id", Text), col("name", Text)],
    };

    pub const PRODUCTS: TableSpec = TableSpec {
        local_table: "products",
        remote_table: None,
        columns: &[
            col("id", Text),
            col("name", Text),
            col("category_id", Text),
            col("price_cents", Integer),
            col("tax_rate_bps", Integer),
            col("unit", Text),
            col("is_active", Boolean),
            col("created_at", Timestamp),
        ],
    };

    pub const CUSTOMERS: TableSpec = TableSpec {
        local_table: "customers",
        remote_table: None,
        columns: &[
            col("id", Text),
            col("name", Text),
            col("phone", Text),
            col("email", Text),
            col("address", Text),
            col("created_at", Timestamp),
        ],
    };

    pub const EXPENSE_CATEGORIES: TableSpec = TableSpec {
        local_table: "expense_categories",
        remote_table: None,
        columns: &[col("id", Text), col("name", Text)],
    };

    pub const BILLS: TableSpec = TableSpec {
        local_table: "bills",
        remote_table: None,
        columns: &[
            col("id", Text),
            col("branch_no", Integer),
            col("invoice_no", Text),
            col("bill_type", Text),
            col("customer_id", Text),
            col("bill_date", Date),
            col("taxable_cents", Integer),
            col("tax_cents", Integer),
            col("discount_cents", Integer),
            col("total_cents", Integer),
            col("payment_type", Text),
            // remote rows are mirrored by definition
            Column {
                name: "synced",
                kind: Integer,
                remote_expr: Some("1"),
            },
            col("created_at", Timestamp),
            col("updated_at", Timestamp),
        ],
    };

    pub const BILL_ITEMS: TableSpec = TableSpec {
        local_table: "bill_items",
        remote_table: None,
        columns: &[
            col("id", Text),
            col("bill_id", Text),
            col("product_id", Text),
            col("quantity", Integer),
            col("unit_price_cents", Integer),
            col("taxable_cents", Integer),
            col("tax_cents", Integer),
            col("line_total_cents", Integer),
        ],
    };

    pub const EXPENSES: TableSpec = TableSpec {
        local_table: "expenses",
        remote_table: None,
        columns: &[
            col("id", Text),
            col("branch_no", Integer),
            col("category_id", Text),
            col("amount_cents", Integer),
            col("note", Text),
            col("expense_date", Date),
            Column {
                name: "synced",
                kind: Integer,
                remote_expr: Some("1"),
            },
            col("created_at", Timestamp),
        ],
    };
}

// =============================================================================
// Pulled Values & Filters
// =============================================================================

/// A remote value normalized to a portable form: timestamps and dates
/// become text, booleans become 0/1.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

/// One pulled row, values in spec column order.
pub type PulledRow = Vec<SqlValue>;

/// A filter value bound into the remote SELECT.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

/// Remote-side row filter.
#[derive(Debug, Clone)]
pub enum PullFilter {
    /// Whole table.
    None,
    /// `WHERE <column> = $1`.
    Eq(&'static str, FilterValue),
    /// `WHERE <column> IN ($1…$n)`. An empty list matches nothing.
    In(&'static str, Vec<FilterValue>),
}

impl PullFilter {
    /// Branch-scope filter used for post-login history pulls.
    pub fn branch(branch_no: i64) -> Self {
        PullFilter::Eq("branch_no", FilterValue::Int(branch_no))
    }
}

// =============================================================================
// Replicator
// =============================================================================

/// Pulls remote rows into the local store.
#[derive(Clone)]
pub struct Replicator {
    db: Database,
    remote: RemoteStore,
}

impl Replicator {
    /// Creates a new Replicator.
    pub fn new(db: Database, remote: RemoteStore) -> Self {
        Replicator { db, remote }
    }

    /// Pulls one table: remote SELECT, idempotent local apply, sync_meta
    /// stamp. Returns the number of rows actually inserted (rows already
    /// present locally count zero).
    pub async fn pull(&self, spec: &TableSpec, filter: &PullFilter) -> SyncResult<u64> {
        let rows = self.remote.fetch_rows(spec, filter).await?;

        if rows.is_empty() {
            debug!(table = spec.local_table, "Pull returned no rows");
            return Ok(0);
        }

        let inserted = apply_rows(&self.db, spec, &rows).await?;
        self.db.sync_meta().stamp(spec.local_table, Utc::now()).await?;

        info!(
            table = spec.local_table,
            pulled = rows.len(),
            inserted,
            "Pull applied"
        );

        Ok(inserted)
    }

    /// Pulls the reference tables (application start).
    pub async fn pull_reference_data(&self) -> SyncResult<u64> {
        let mut total = 0;
        for spec in [
            &tables::CATEGORIES,
            &tables::PRODUCTS,
            &tables::CUSTOMERS,
            &tables::EXPENSE_CATEGORIES,
        ] {
            total += self.pull(spec, &PullFilter::None).await?;
        }
        Ok(total)
    }

    /// Pulls a branch's historical ledger rows (post-login): bills and
    /// expenses scoped by branch, then bill items scoped by the set of
    /// just-pulled bill ids.
    pub async fn pull_branch_history(&self, branch_no: i64) -> SyncResult<u64> {
        let mut total = 0;

        let bill_rows = self
            .remote
            .fetch_rows(&tables::BILLS, &PullFilter::branch(branch_no))
            .await?;

        // column 0 of the BILLS spec is the primary key
        let bill_ids: Vec<FilterValue> = bill_rows
            .iter()
            .filter_map(|row| match row.first() {
                Some(SqlValue::Text(id)) => Some(FilterValue::Text(id.clone())),
                _ => None,
            })
            .collect();

        if !bill_rows.is_empty() {
            total += apply_rows(&self.db, &tables::BILLS, &bill_rows).await?;
            self.db.sync_meta().stamp("bills", Utc::now()).await?;
        }

        total += self.pull(&tables::EXPENSES, &PullFilter::branch(branch_no)).await?;

        if !bill_ids.is_empty() {
            total += self
                .pull(&tables::BILL_ITEMS, &PullFilter::In("bill_id", bill_ids))
                .await?;
        }

        info!(branch_no, inserted = total, "Branch history pulled");
        Ok(total)
    }
}

/// Applies pulled rows into the local table inside ONE transaction, using
/// INSERT OR IGNORE keyed on the primary key. Safe to call repeatedly
/// with the same rows: the second apply inserts nothing.
pub async fn apply_rows(
    db: &Database,
    spec: &TableSpec,
    rows: &[PulledRow],
) -> SyncResult<u64> {
    let sql = query::insert_or_ignore(spec.local_table, &spec.column_names());

    let mut tx = db
        .pool()
        .begin()
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

    let mut inserted = 0u64;
    for row in rows {
        if row.len() != spec.columns.len() {
            return Err(SyncError::Serialization(format!(
                "{}: pulled row has {} values, spec has {} columns",
                spec.local_table,
                row.len(),
                spec.columns.len()
            )));
        }

        let mut q = sqlx::query(&sql);
        for value in row {
            q = match value {
                SqlValue::Null => q.bind(None::<String>),
                SqlValue::Integer(v) => q.bind(*v),
                SqlValue::Real(v) => q.bind(*v),
                SqlValue::Text(v) => q.bind(v.as_str()),
            };
        }

        let result = q
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        inserted += result.rows_affected();
    }

    tx.commit()
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

    Ok(inserted)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_db::DbConfig;

    fn product_row(id: &str, name: &str) -> PulledRow {
        vec![
            SqlValue::Text(id.to_string()),
            SqlValue::Text(name.to_string()),
            SqlValue::Null,
            SqlValue::Integer(450),
            SqlValue::Integer(500),
            SqlValue::Text("pc".to_string()),
            SqlValue::Integer(1),
            SqlValue::Text("2025-01-01T09:00:00Z".to_string()),
        ]
    }

    #[tokio::test]
    async fn test_apply_rows_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let rows = vec![product_row("p1", "Espresso"), product_row("p2", "Ristretto")];

        let first = apply_rows(&db, &tables::PRODUCTS, &rows).await.unwrap();
        assert_eq!(first, 2);

        // the second apply of the same rows inserts nothing and fails nothing
        let second = apply_rows(&db, &tables::PRODUCTS, &rows).await.unwrap();
        assert_eq!(second, 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_applied_rows_are_readable_as_entities() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        apply_rows(&db, &tables::PRODUCTS, &[product_row("p1", "Espresso")])
            .await
            .unwrap();

        let product = db.catalog().get_product("p1").await.unwrap().unwrap();
        assert_eq!(product.name, "Espresso");
        assert_eq!(product.price_cents, 450);
        assert!(product.is_active);
    }

    #[tokio::test]
    async fn test_column_count_mismatch_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let short_row = vec![SqlValue::Text("p1".to_string())];
        let err = apply_rows(&db, &tables::PRODUCTS, &[short_row])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Serialization(_)));
    }

    #[test]
    fn test_bills_spec_leads_with_primary_key() {
        // pull_branch_history reads bill ids out of column 0
        assert_eq!(tables::BILLS.columns[0].name, "id");
        assert_eq!(tables::BILL_ITEMS.columns[0].name, "id");
    }

    #[test]
    fn test_select_list_substitutes_remote_exprs() {
        let list = tables::BILLS.select_list();
        assert!(list.contains("invoice_no"));
        // synced is selected as the constant 1, not as a remote column
        assert!(!list.contains("synced"));
        assert!(list.contains(", 1,"));
    }
}
