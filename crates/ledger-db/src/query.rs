//! # Query Builders
//!
//! Stateless helpers assembling the list/report queries from structured
//! filters, on top of `sqlx::QueryBuilder`.
//!
//! ## Trust Boundary Rule
//! Every value that crosses the trust boundary (search text, date ranges,
//! payment filters, pagination) is attached with `push_bind` and travels
//! as a bound parameter. The only identifiers spliced into SQL text are
//! table and column names owned by compiled-in specs, never caller data.

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};

use ledger_core::{BillType, PaymentType};

// =============================================================================
// Filters
// =============================================================================

/// Filter for bill list/report queries.
#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub branch_no: Option<i64>,
    pub bill_type: Option<BillType>,
    pub payment_type: Option<PaymentType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Matches invoice numbers and customer names (substring).
    pub search: Option<String>,
    pub synced: Option<bool>,
    /// 1-based page number; 0 is treated as 1.
    pub page: u32,
    pub per_page: u32,
}

impl BillFilter {
    /// Rows to skip for the requested page.
    pub fn offset(&self) -> i64 {
        let page = self.page.max(1);
        (page as i64 - 1) * self.limit()
    }

    /// Page size, clamped to 1..=200.
    pub fn limit(&self) -> i64 {
        (self.per_page.clamp(1, 200)) as i64
    }
}

/// Filter for expense list queries.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub branch_no: Option<i64>,
    pub category_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

// =============================================================================
// Row Shapes
// =============================================================================

/// One row of the paginated bill list (header + joined customer name).
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct BillSummaryRow {
    pub id: String,
    pub invoice_no: String,
    pub bill_type: BillType,
    pub payment_type: PaymentType,
    pub bill_date: NaiveDate,
    pub total_cents: i64,
    pub synced: bool,
    pub customer_name: Option<String>,
}

/// One row of the daily sales summary, grouped by payment type.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SalesTotalRow {
    pub payment_type: PaymentType,
    pub bill_count: i64,
    pub total_cents: i64,
}

// =============================================================================
// SELECT / COUNT Builders
// =============================================================================

const BILL_LIST_COLUMNS: &str = "b.id, b.invoice_no, b.bill_type, b.payment_type, \
     b.bill_date, b.total_cents, b.synced, c.name AS customer_name";

/// Builds the paginated bill list query for a filter.
pub fn bill_select(filter: &BillFilter) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {BILL_LIST_COLUMNS} FROM bills b \
         LEFT JOIN customers c ON c.id = b.customer_id WHERE 1=1"
    ));

    push_bill_filters(&mut qb, filter);

    qb.push(" ORDER BY b.created_at DESC LIMIT ");
    qb.push_bind(filter.limit());
    qb.push(" OFFSET ");
    qb.push_bind(filter.offset());

    qb
}

/// Builds the matching COUNT query for the same filter.
pub fn bill_count(filter: &BillFilter) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM bills b \
         LEFT JOIN customers c ON c.id = b.customer_id WHERE 1=1",
    );

    push_bill_filters(&mut qb, filter);
    qb
}

/// Builds the per-payment-type sales summary over a date range.
pub fn sales_summary(
    branch_no: i64,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT b.payment_type, COUNT(*) AS bill_count, \
         SUM(b.total_cents) AS total_cents \
         FROM bills b WHERE b.branch_no = ",
    );
    qb.push_bind(branch_no);
    qb.push(" AND b.bill_date >= ");
    qb.push_bind(date_from);
    qb.push(" AND b.bill_date <= ");
    qb.push_bind(date_to);
    qb.push(" GROUP BY b.payment_type ORDER BY b.payment_type");
    qb
}

fn push_bill_filters(qb: &mut QueryBuilder<'static, Sqlite>, filter: &BillFilter) {
    if let Some(branch_no) = filter.branch_no {
        qb.push(" AND b.branch_no = ");
        qb.push_bind(branch_no);
    }

    if let Some(bill_type) = filter.bill_type {
        qb.push(" AND b.bill_type = ");
        qb.push_bind(bill_type);
    }

    if let Some(payment_type) = filter.payment_type {
        qb.push(" AND b.payment_type = ");
        qb.push_bind(payment_type);
    }

    if let Some(from) = filter.date_from {
        qb.push(" AND b.bill_date >= ");
        qb.push_bind(from);
    }

    if let Some(to) = filter.date_to {
        qb.push(" AND b.bill_date <= ");
        qb.push_bind(to);
    }

    if let Some(synced) = filter.synced {
        qb.push(" AND b.synced = ");
        qb.push_bind(synced);
    }

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (b.invoice_no LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR c.name LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

/// Builds the expense list query for a filter.
pub fn expense_select(filter: &ExpenseFilter) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, branch_no, category_id, amount_cents, note, expense_date, \
         synced, created_at FROM expenses WHERE 1=1",
    );

    if let Some(branch_no) = filter.branch_no {
        qb.push(" AND branch_no = ");
        qb.push_bind(branch_no);
    }

    if let Some(category_id) = &filter.category_id {
        qb.push(" AND category_id = ");
        qb.push_bind(category_id.clone());
    }

    if let Some(from) = filter.date_from {
        qb.push(" AND expense_date >= ");
        qb.push_bind(from);
    }

    if let Some(to) = filter.date_to {
        qb.push(" AND expense_date <= ");
        qb.push_bind(to);
    }

    qb.push(" ORDER BY expense_date DESC, created_at DESC");
    qb
}

// =============================================================================
// INSERT Builders
// =============================================================================

/// Builds `INSERT OR IGNORE INTO <table> (<cols>) VALUES (?, ?, ...)`.
///
/// Table and column identifiers come from compiled-in table specs (the
/// replicator's), never from callers; the VALUES are all placeholders.
/// Re-inserting an existing primary key is a no-op, which is what makes
/// repeated replication pulls safe.
pub fn insert_or_ignore(table: &str, columns: &[&str]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_select_binds_values() {
        let filter = BillFilter {
            branch_no: Some(1),
            payment_type: Some(PaymentType::Cash),
            search: Some("Rob'); DROP TABLE bills;--".to_string()),
            page: 2,
            per_page: 25,
            ..Default::default()
        };

        let qb = bill_select(&filter);
        let sql = qb.sql();

        // all values travel as parameters, never in the SQL text
        assert!(!sql.contains("DROP TABLE"));
        assert!(!sql.contains("Rob"));
        assert!(sql.contains("b.branch_no = ?"));
        assert!(sql.contains("b.payment_type = ?"));
        assert!(sql.contains("LIKE ?"));
        assert!(sql.contains("LIMIT ?"));
        assert!(sql.contains("OFFSET ?"));
    }

    #[test]
    fn test_bill_count_matches_filters() {
        let filter = BillFilter {
            synced: Some(false),
            date_from: NaiveDate::from_ymd_opt(2025, 1, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 1, 31),
            ..Default::default()
        };

        let qb = bill_count(&filter);
        let sql = qb.sql();

        assert!(sql.starts_with("SELECT COUNT(*)"));
        assert!(sql.contains("b.synced = ?"));
        assert!(sql.contains("b.bill_date >= ?"));
        assert!(sql.contains("b.bill_date <= ?"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_pagination_math() {
        let filter = BillFilter {
            page: 3,
            per_page: 20,
            ..Default::default()
        };
        assert_eq!(filter.limit(), 20);
        assert_eq!(filter.offset(), 40);

        // page 0 behaves as page 1; per_page 0 clamps to 1
        let filter = BillFilter::default();
        assert_eq!(filter.limit(), 1);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_insert_or_ignore_shape() {
        let sql = insert_or_ignore("products", &["id", "name", "price_cents"]);
        assert_eq!(
            sql,
            "INSERT OR IGNORE INTO products (id, name, price_cents) VALUES (?, ?, ?)"
        );
    }
}
