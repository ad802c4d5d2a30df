//! # Error Types
//!
//! Domain-specific error types for ledger-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ledger-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  ledger-db errors (separate crate)                                     │
//! │  └── DbError          - Local store failures (hard failures)           │
//! │                                                                         │
//! │  ledger-sync errors (separate crate)                                   │
//! │  └── SyncError        - Remote failures (absorbed, never lose a sale)  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → BillingError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. They are hard failures: the
/// operation that raised one has had no side effects.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A bill references no line items where at least one is required.
    #[error("Bill must contain at least one item")]
    EmptyBill,

    /// Split amounts do not reconcile with the bill total.
    ///
    /// The split decomposition invariant: the online portion plus the cash
    /// portion must equal the declared total exactly.
    #[error("Split amounts do not reconcile: online {online_cents} + cash {cash_cents} != total {total_cents}")]
    SplitMismatch {
        online_cents: i64,
        cash_cents: i64,
        total_cents: i64,
    },

    /// A KOT status transition is not allowed by the state machine.
    #[error("KOT order {order_id} cannot move from {from} to {to}")]
    InvalidKotTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// A sequence token did not parse (`{prefix}-{NNNNN}` expected).
    #[error("Malformed sequence token: {0}")]
    MalformedToken(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised when caller input does not meet requirements, before any business
/// logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g. invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::SplitMismatch {
            online_cents: 300,
            cash_cents: 100,
            total_cents: 500,
        };
        assert_eq!(
            err.to_string(),
            "Split amounts do not reconcile: online 300 + cash 100 != total 500"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "invoice_no".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
