//! # Domain Types
//!
//! Core domain types for the billing ledger.
//!
//! ## Dual-Key Identity Pattern
//! Every ledger entity has:
//! - `id`: UUID v4 - immutable, used for database relations and for keying
//!   outbox entries (globally unique without coordination, offline-safe)
//! - Business token: (invoice_no, KOT token) - human-readable, allocated
//!   per branch prefix by the sequence allocator
//!
//! The `synced` flag on ledger rows marks whether the remote mirror write
//! has succeeded: 0 = local-only, 1 = mirrored. It is the ONLY place remote
//! consistency is represented; remote failures never surface as errors from
//! a recording operation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, TaxRate};

// =============================================================================
// Payment Type
// =============================================================================

/// How a bill (or bill component) was paid.
///
/// A `Split` input is decomposed before persistence (see [`crate::split`]):
/// the stored rows carry `split` for the online portion and `cash` for the
/// cash portion; `split-cash` only appears as a sequence category, never as
/// a stored payment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
pub enum PaymentType {
    Cash,
    Online,
    Split,
}

impl PaymentType {
    /// Stable textual form, matching the stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Online => "online",
            PaymentType::Split => "split",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Bill Type
// =============================================================================

/// Discriminates sale ledger rows from advance (deposit) rows in queries
/// that span both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    Sale,
    Advance,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Sale => "sale",
            BillType::Advance => "advance",
        }
    }
}

// =============================================================================
// KOT Status
// =============================================================================

/// Kitchen order ticket status.
///
/// State machine:
/// ```text
///   pending ──► baking ──► ready
///      │           │
///      └───────────┴─────► cancelled
/// ```
/// `ready` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum KotStatus {
    Pending,
    Baking,
    Ready,
    Cancelled,
}

impl KotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KotStatus::Pending => "pending",
            KotStatus::Baking => "baking",
            KotStatus::Ready => "ready",
            KotStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, KotStatus::Ready | KotStatus::Cancelled)
    }

    /// Whether the state machine allows moving from `self` to `to`.
    pub fn can_transition(&self, to: KotStatus) -> bool {
        match (self, to) {
            (KotStatus::Pending, KotStatus::Baking) => true,
            (KotStatus::Baking, KotStatus::Ready) => true,
            (KotStatus::Pending | KotStatus::Baking, KotStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for KotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Branch
// =============================================================================

/// The single tenant/site identity active on a device.
///
/// Exactly one row exists locally after a successful login; prior rows are
/// purged by the authenticator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Branch {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Small numeric branch code used in token prefixes (`INVCL{branch_no}`).
    pub branch_no: i64,

    /// Display name.
    pub name: String,

    /// Login name (unique across branches).
    pub username: String,

    /// argon2 PHC-format password hash.
    pub password_hash: String,

    /// Street address printed on receipts.
    pub address: Option<String>,

    /// Tax registration number.
    pub tax_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Bill / BillItem
// =============================================================================

/// A finalized sale ledger row (or one component of a split sale).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Bill {
    pub id: String,
    pub branch_no: i64,

    /// Business token, unique per branch+prefix (e.g. `INVCL1-00042`).
    pub invoice_no: String,

    pub bill_type: BillType,
    pub customer_id: Option<String>,
    pub bill_date: NaiveDate,

    pub taxable_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    pub payment_type: PaymentType,

    /// 0 = local-only, 1 = mirrored to the remote store.
    pub synced: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One line on a bill. Belongs to exactly one [`Bill`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BillItem {
    pub id: String,
    pub bill_id: String,
    pub product_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub taxable_cents: i64,
    pub tax_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Advance Bill
// =============================================================================

/// A deposit taken before the final sale is settled.
///
/// Structurally parallel to [`Bill`], plus the advance amount and the
/// outstanding balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AdvanceBill {
    pub id: String,
    pub branch_no: i64,
    pub invoice_no: String,
    pub customer_id: Option<String>,
    pub bill_date: NaiveDate,

    pub taxable_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    /// Amount deposited now.
    pub advance_cents: i64,
    /// Remaining balance due at settlement.
    pub balance_cents: i64,

    pub payment_type: PaymentType,
    pub synced: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line on an advance bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AdvanceBillItem {
    pub id: String,
    pub bill_id: String,
    pub product_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub taxable_cents: i64,
    pub tax_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Reference Data
// =============================================================================

/// A customer, replicated read-mostly from the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category_id: Option<String>,
    pub price_cents: i64,
    pub tax_rate_bps: u32,
    /// Sale unit, e.g. "pc", "kg".
    pub unit: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// An expense category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExpenseCategory {
    pub id: String,
    pub name: String,
}

/// A branch-scoped expense row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: String,
    pub branch_no: i64,
    pub category_id: Option<String>,
    pub amount_cents: i64,
    pub note: Option<String>,
    pub expense_date: NaiveDate,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Kitchen Order Tickets
// =============================================================================

/// A kitchen order ticket, distinct from the financial bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct KotOrder {
    pub id: String,
    pub branch_no: i64,

    /// Business token from the per-branch KOT sequence (e.g. `KOT3-00017`).
    pub token: String,

    pub status: KotStatus,
    pub table_no: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line on a kitchen order ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct KotItem {
    pub id: String,
    pub order_id: String,
    pub product_id: Option<String>,
    pub quantity: i64,
    pub note: Option<String>,
}

// =============================================================================
// Sync Bookkeeping
// =============================================================================

/// A durable record of a remote write that has not happened yet.
///
/// Written in the SAME local transaction as the ledger row it mirrors, so
/// the pending work is never orphaned. `synced_at IS NULL` marks entries
/// the mirror still has to push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OutboxEntry {
    pub id: String,

    /// Entity kind: "bill", "advance_bill", "expense".
    pub entity_type: String,

    /// Local id of the mirrored row.
    pub entity_id: String,

    /// Operation: "insert" or "amend".
    pub op: String,

    /// JSON serialization of the mirror payload.
    pub payload: String,

    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Per-table last-synchronized timestamp (operational visibility only; the
/// core's own logic never consumes it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SyncMeta {
    pub table_name: String,
    pub last_synced_at: DateTime<Utc>,
}

// =============================================================================
// Operation Inputs
// =============================================================================

/// Input for recording a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBill {
    pub customer_id: Option<String>,
    pub payment_type: PaymentType,
    pub bill_date: NaiveDate,
    pub discount_cents: i64,

    /// Online portion of a split payment (ignored unless `payment_type`
    /// is `Split`).
    pub online_cents: i64,
    /// Cash portion of a split payment.
    pub cash_cents: i64,

    pub items: Vec<NewBillItem>,
}

/// One requested line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBillItem {
    pub product_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
}

impl NewBillItem {
    /// Taxable value of the line: quantity × unit price.
    #[inline]
    pub fn taxable(&self) -> Money {
        Money::from_cents(self.unit_price_cents) * self.quantity
    }

    /// Tax amount of the line at its rate.
    #[inline]
    pub fn tax(&self) -> Money {
        self.taxable().tax_at(TaxRate::from_bps(self.tax_rate_bps))
    }

    /// Line total: taxable + tax.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.taxable() + self.tax()
    }
}

impl NewBill {
    /// Sum of line taxable values.
    pub fn taxable_total(&self) -> Money {
        self.items.iter().map(NewBillItem::taxable).sum()
    }

    /// Sum of line tax amounts.
    pub fn tax_total(&self) -> Money {
        self.items.iter().map(NewBillItem::tax).sum()
    }

    /// Grand total: taxable + tax − discount.
    pub fn grand_total(&self) -> Money {
        self.taxable_total() + self.tax_total() - Money::from_cents(self.discount_cents)
    }
}

/// Input for recording an advance (deposit) bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdvanceBill {
    pub customer_id: Option<String>,
    pub payment_type: PaymentType,
    pub bill_date: NaiveDate,
    pub discount_cents: i64,
    /// Amount deposited now; the balance is derived.
    pub advance_cents: i64,
    pub items: Vec<NewBillItem>,
}

impl NewAdvanceBill {
    pub fn taxable_total(&self) -> Money {
        self.items.iter().map(NewBillItem::taxable).sum()
    }

    pub fn tax_total(&self) -> Money {
        self.items.iter().map(NewBillItem::tax).sum()
    }

    pub fn grand_total(&self) -> Money {
        self.taxable_total() + self.tax_total() - Money::from_cents(self.discount_cents)
    }

    /// Outstanding balance after the deposit.
    pub fn balance(&self) -> Money {
        self.grand_total() - Money::from_cents(self.advance_cents)
    }
}

/// Input for creating a kitchen order ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKotOrder {
    pub table_no: Option<String>,
    pub note: Option<String>,
    pub items: Vec<NewKotItem>,
}

/// One requested kitchen line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKotItem {
    pub product_id: Option<String>,
    pub quantity: i64,
    pub note: Option<String>,
}

/// Input for recording a branch expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub category_id: Option<String>,
    pub amount_cents: i64,
    pub note: Option<String>,
    pub expense_date: NaiveDate,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kot_transitions() {
        assert!(KotStatus::Pending.can_transition(KotStatus::Baking));
        assert!(KotStatus::Baking.can_transition(KotStatus::Ready));
        assert!(KotStatus::Pending.can_transition(KotStatus::Cancelled));
        assert!(KotStatus::Baking.can_transition(KotStatus::Cancelled));

        // terminal states accept nothing
        assert!(!KotStatus::Ready.can_transition(KotStatus::Cancelled));
        assert!(!KotStatus::Cancelled.can_transition(KotStatus::Pending));
        // no skipping ahead
        assert!(!KotStatus::Pending.can_transition(KotStatus::Ready));
    }

    #[test]
    fn test_payment_type_str() {
        assert_eq!(PaymentType::Cash.as_str(), "cash");
        assert_eq!(PaymentType::Split.as_str(), "split");
    }

    #[test]
    fn test_new_bill_totals() {
        let bill = NewBill {
            customer_id: None,
            payment_type: PaymentType::Cash,
            bill_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            discount_cents: 100,
            online_cents: 0,
            cash_cents: 0,
            items: vec![
                NewBillItem {
                    product_id: None,
                    quantity: 2,
                    unit_price_cents: 250,
                    tax_rate_bps: 0,
                },
                NewBillItem {
                    product_id: None,
                    quantity: 1,
                    unit_price_cents: 1_000,
                    tax_rate_bps: 500,
                },
            ],
        };

        assert_eq!(bill.taxable_total().cents(), 1_500);
        assert_eq!(bill.tax_total().cents(), 50);
        assert_eq!(bill.grand_total().cents(), 1_450);
    }
}
