//! # Split-Payment Decomposition
//!
//! A sale paid partly online and partly in cash is persisted as up to two
//! independent ledger rows, each numbered from its own sequence:
//!
//! ```text
//!   NewBill { payment_type: Split, online: 300, cash: 200, total: 500 }
//!        │
//!        ├──► component 1: payment_type "split", category Split (INVSP…),
//!        │                 carries the item lines, total = 300
//!        │
//!        └──► component 2: payment_type "cash", category SplitCash (INVSC…),
//!                          settlement row without items, total = 200
//! ```
//!
//! Reconciliation invariant: `online + cash == grand total`, checked before
//! anything is persisted. A zero portion is skipped entirely, so a split
//! with `cash = 0` produces a single `split` row.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::sequence::SequenceCategory;
use crate::types::{NewBill, NewBillItem, PaymentType};

// =============================================================================
// Bill Component
// =============================================================================

/// One persistable slice of a sale: the amounts, the payment tag, the
/// sequence it numbers from, and the item lines riding on it.
#[derive(Debug, Clone)]
pub struct BillComponent {
    pub payment_type: PaymentType,
    pub category: SequenceCategory,
    pub taxable_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub items: Vec<NewBillItem>,
}

// =============================================================================
// Decomposition
// =============================================================================

/// Decomposes a sale input into its persistable components.
///
/// Non-split payments pass through as a single component carrying the full
/// amounts and all items. Split payments yield the online portion first
/// (with the item lines) and then the cash portion; both number from their
/// own sequences.
pub fn decompose(bill: &NewBill) -> CoreResult<Vec<BillComponent>> {
    let taxable = bill.taxable_total();
    let tax = bill.tax_total();
    let discount = Money::from_cents(bill.discount_cents);
    let total = bill.grand_total();

    if bill.payment_type != PaymentType::Split {
        return Ok(vec![BillComponent {
            payment_type: bill.payment_type,
            category: SequenceCategory::for_payment(bill.payment_type),
            taxable_cents: taxable.cents(),
            tax_cents: tax.cents(),
            discount_cents: discount.cents(),
            total_cents: total.cents(),
            items: bill.items.clone(),
        }]);
    }

    let online = Money::from_cents(bill.online_cents);
    let cash = Money::from_cents(bill.cash_cents);

    if online + cash != total {
        return Err(CoreError::SplitMismatch {
            online_cents: online.cents(),
            cash_cents: cash.cents(),
            total_cents: total.cents(),
        });
    }

    let mut components = Vec::with_capacity(2);

    if !online.is_zero() {
        components.push(BillComponent {
            payment_type: PaymentType::Split,
            category: SequenceCategory::Split,
            taxable_cents: taxable.cents(),
            tax_cents: tax.cents(),
            discount_cents: discount.cents(),
            total_cents: online.cents(),
            items: bill.items.clone(),
        });
    }

    if !cash.is_zero() {
        // The settlement row: itemless when the online row already carries
        // the lines, full bill otherwise (online portion was zero).
        let carries_items = components.is_empty();
        components.push(BillComponent {
            payment_type: PaymentType::Cash,
            category: SequenceCategory::SplitCash,
            taxable_cents: if carries_items { taxable.cents() } else { 0 },
            tax_cents: if carries_items { tax.cents() } else { 0 },
            discount_cents: if carries_items { discount.cents() } else { 0 },
            total_cents: cash.cents(),
            items: if carries_items {
                bill.items.clone()
            } else {
                Vec::new()
            },
        });
    }

    if components.is_empty() {
        // total 0 split with both portions 0: keep a single zero row so the
        // sale still exists in the ledger
        components.push(BillComponent {
            payment_type: PaymentType::Split,
            category: SequenceCategory::Split,
            taxable_cents: taxable.cents(),
            tax_cents: tax.cents(),
            discount_cents: discount.cents(),
            total_cents: 0,
            items: bill.items.clone(),
        });
    }

    Ok(components)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn split_bill(online: i64, cash: i64) -> NewBill {
        NewBill {
            customer_id: None,
            payment_type: PaymentType::Split,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            discount_cents: 0,
            online_cents: online,
            cash_cents: cash,
            items: vec![NewBillItem {
                product_id: None,
                quantity: 2,
                unit_price_cents: 250,
                tax_rate_bps: 0,
            }],
        }
    }

    #[test]
    fn test_plain_cash_passthrough() {
        let mut bill = split_bill(0, 0);
        bill.payment_type = PaymentType::Cash;

        let components = decompose(&bill).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].payment_type, PaymentType::Cash);
        assert_eq!(components[0].category, SequenceCategory::Cash);
        assert_eq!(components[0].total_cents, 500);
        assert_eq!(components[0].items.len(), 1);
    }

    #[test]
    fn test_split_produces_two_components() {
        let bill = split_bill(300, 200);
        let components = decompose(&bill).unwrap();

        assert_eq!(components.len(), 2);

        assert_eq!(components[0].payment_type, PaymentType::Split);
        assert_eq!(components[0].category, SequenceCategory::Split);
        assert_eq!(components[0].total_cents, 300);
        assert_eq!(components[0].items.len(), 1);

        assert_eq!(components[1].payment_type, PaymentType::Cash);
        assert_eq!(components[1].category, SequenceCategory::SplitCash);
        assert_eq!(components[1].total_cents, 200);
        assert!(components[1].items.is_empty());

        // reconciliation: component totals sum to the declared amount
        let sum: i64 = components.iter().map(|c| c.total_cents).sum();
        assert_eq!(sum, 500);
    }

    #[test]
    fn test_split_zero_portion_skipped() {
        let bill = split_bill(500, 0);
        let components = decompose(&bill).unwrap();

        assert_eq!(components.len(), 1);
        assert_eq!(components[0].payment_type, PaymentType::Split);
        assert_eq!(components[0].total_cents, 500);

        let bill = split_bill(0, 500);
        let components = decompose(&bill).unwrap();

        assert_eq!(components.len(), 1);
        assert_eq!(components[0].payment_type, PaymentType::Cash);
        assert_eq!(components[0].category, SequenceCategory::SplitCash);
        assert_eq!(components[0].items.len(), 1);
    }

    #[test]
    fn test_split_mismatch_rejected() {
        let bill = split_bill(300, 100); // total is 500
        let err = decompose(&bill).unwrap_err();
        assert!(matches!(err, CoreError::SplitMismatch { .. }));
    }
}
