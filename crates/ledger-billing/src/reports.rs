//! # Read / Report Services
//!
//! The read-only surface for the UI's bill lists and for the print
//! subsystem, which reads already-committed rows with joined customer and
//! item/product data and never touches the core's invariants.
//!
//! Every query is scoped to the session's branch and built from bound
//! parameters (see `ledger_db::query`).

use chrono::NaiveDate;
use serde::Serialize;

use ledger_core::{Bill, Customer};
use ledger_db::query::{BillFilter, BillSummaryRow, SalesTotalRow};
use ledger_db::repository::bill::EnrichedBillItem;
use ledger_db::{Database, DbError};

use crate::error::BillingResult;
use crate::session::Session;

/// One page of a filtered bill list.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

/// A committed bill with everything the printable form needs.
#[derive(Debug, Clone, Serialize)]
pub struct BillDetail {
    pub bill: Bill,
    pub customer: Option<Customer>,
    pub items: Vec<EnrichedBillItem>,
}

/// Read-only report operations.
pub struct ReportService {
    db: Database,
}

impl ReportService {
    /// Creates a new ReportService.
    pub fn new(db: Database) -> Self {
        ReportService { db }
    }

    /// Paginated bill list. The filter's branch scope is forced to the
    /// session's branch whatever the caller passed.
    pub async fn list_bills(
        &self,
        session: &Session,
        mut filter: BillFilter,
    ) -> BillingResult<Page<BillSummaryRow>> {
        filter.branch_no = Some(session.branch_no());

        let rows = self.db.bills().list(&filter).await?;
        let total = self.db.bills().count(&filter).await?;

        Ok(Page {
            rows,
            total,
            page: filter.page.max(1),
            per_page: filter.limit() as u32,
        })
    }

    /// Full bill detail: header, joined customer, items enriched with
    /// their product rows. `NotFound` when the id matches no bill in this
    /// branch.
    pub async fn bill_detail(
        &self,
        session: &Session,
        bill_id: &str,
    ) -> BillingResult<BillDetail> {
        let bill = self
            .db
            .bills()
            .get_by_id(bill_id)
            .await?
            .filter(|b| b.branch_no == session.branch_no())
            .ok_or_else(|| DbError::not_found("Bill", bill_id))?;

        let customer = match &bill.customer_id {
            Some(id) => self.db.catalog().get_customer(id).await?,
            None => None,
        };

        let items = self.db.bills().items_with_products(bill_id).await?;

        Ok(BillDetail {
            bill,
            customer,
            items,
        })
    }

    /// Per-payment-type sales totals over a date range.
    pub async fn daily_summary(
        &self,
        session: &Session,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> BillingResult<Vec<SalesTotalRow>> {
        let rows = self
            .db
            .bills()
            .sales_summary(session.branch_no(), date_from, date_to)
            .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
