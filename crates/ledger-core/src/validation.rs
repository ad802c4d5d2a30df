//! # Validation Module
//!
//! Input validation for the billing operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI/API caller                                                │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite constraints (NOT NULL, UNIQUE, foreign keys)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary inputs are non-negative decimals; quantities are positive.
//! Split reconciliation itself is checked in [`crate::split`], where the
//! component math lives.

use crate::error::ValidationError;
use crate::types::{NewAdvanceBill, NewBill, NewExpense, NewKotOrder};
use crate::{MAX_BILL_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount in cents.
///
/// Zero is allowed (free items, zero discounts).
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Operation Input Validators
// =============================================================================

/// Validates a sale input before decomposition.
///
/// ## Rules
/// - At least one item, at most MAX_BILL_ITEMS
/// - Every quantity positive, every amount non-negative
/// - Split portions non-negative (their reconciliation against the total
///   is checked by the decomposition)
pub fn validate_new_bill(bill: &NewBill) -> ValidationResult<()> {
    if bill.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if bill.items.len() > MAX_BILL_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_BILL_ITEMS as i64,
        });
    }

    for item in &bill.items {
        validate_quantity(item.quantity)?;
        validate_amount_cents("unit_price", item.unit_price_cents)?;
        validate_tax_rate_bps(item.tax_rate_bps)?;
    }

    validate_amount_cents("discount", bill.discount_cents)?;
    validate_amount_cents("online_amount", bill.online_cents)?;
    validate_amount_cents("cash_amount", bill.cash_cents)?;

    if bill.grand_total().is_negative() {
        return Err(ValidationError::Negative {
            field: "total".to_string(),
        });
    }

    Ok(())
}

/// Validates an advance bill input.
///
/// The deposit may not exceed the grand total; the derived balance is
/// therefore non-negative.
pub fn validate_new_advance(bill: &NewAdvanceBill) -> ValidationResult<()> {
    if bill.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    for item in &bill.items {
        validate_quantity(item.quantity)?;
        validate_amount_cents("unit_price", item.unit_price_cents)?;
        validate_tax_rate_bps(item.tax_rate_bps)?;
    }

    validate_amount_cents("discount", bill.discount_cents)?;
    validate_amount_cents("advance_amount", bill.advance_cents)?;

    let total = bill.grand_total();
    if total.is_negative() {
        return Err(ValidationError::Negative {
            field: "total".to_string(),
        });
    }

    if bill.advance_cents > total.cents() {
        return Err(ValidationError::OutOfRange {
            field: "advance_amount".to_string(),
            min: 0,
            max: total.cents(),
        });
    }

    Ok(())
}

/// Validates a kitchen order input.
pub fn validate_new_kot(order: &NewKotOrder) -> ValidationResult<()> {
    if order.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    for item in &order.items {
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

/// Validates an expense input.
pub fn validate_new_expense(expense: &NewExpense) -> ValidationResult<()> {
    if expense.amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewBillItem, NewKotItem, PaymentType};
    use chrono::NaiveDate;

    fn bill_with(items: Vec<NewBillItem>) -> NewBill {
        NewBill {
            customer_id: None,
            payment_type: PaymentType::Cash,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            discount_cents: 0,
            online_cents: 0,
            cash_cents: 0,
            items,
        }
    }

    fn item(qty: i64, price: i64) -> NewBillItem {
        NewBillItem {
            product_id: None,
            quantity: qty,
            unit_price_cents: price,
            tax_rate_bps: 0,
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_empty_bill_rejected() {
        assert!(validate_new_bill(&bill_with(vec![])).is_err());
    }

    #[test]
    fn test_negative_amounts_rejected() {
        assert!(validate_new_bill(&bill_with(vec![item(1, -5)])).is_err());

        let mut bill = bill_with(vec![item(1, 100)]);
        bill.discount_cents = -1;
        assert!(validate_new_bill(&bill).is_err());

        // discount larger than the bill drives the total negative
        let mut bill = bill_with(vec![item(1, 100)]);
        bill.discount_cents = 200;
        assert!(validate_new_bill(&bill).is_err());
    }

    #[test]
    fn test_valid_bill_passes() {
        assert!(validate_new_bill(&bill_with(vec![item(2, 250)])).is_ok());
    }

    #[test]
    fn test_advance_deposit_bounds() {
        let mut advance = NewAdvanceBill {
            customer_id: None,
            payment_type: PaymentType::Cash,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            discount_cents: 0,
            advance_cents: 200,
            items: vec![item(2, 250)],
        };
        assert!(validate_new_advance(&advance).is_ok());

        advance.advance_cents = 600; // total is 500
        assert!(validate_new_advance(&advance).is_err());
    }

    #[test]
    fn test_kot_validation() {
        let order = NewKotOrder {
            table_no: Some("T4".to_string()),
            note: None,
            items: vec![NewKotItem {
                product_id: None,
                quantity: 2,
                note: None,
            }],
        };
        assert!(validate_new_kot(&order).is_ok());

        let empty = NewKotOrder {
            table_no: None,
            note: None,
            items: vec![],
        };
        assert!(validate_new_kot(&empty).is_err());
    }
}
