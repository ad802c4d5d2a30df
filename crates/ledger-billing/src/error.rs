//! # Billing Error Types
//!
//! The propagation policy in one place:
//!
//! - Failures that compromise durability (local writes, not-found targets,
//!   validation) surface here and abort the operation.
//! - Failures that only affect consistency-with-remote never appear: the
//!   mirror absorbs them and the `synced` flag is their only trace.

use thiserror::Error;

use ledger_core::{CoreError, ValidationError};
use ledger_db::DbError;
use ledger_sync::SyncError;

// =============================================================================
// Billing Error
// =============================================================================

/// Errors surfaced by billing operations.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Input failed validation; nothing was persisted.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A business rule was violated (split mismatch, bad transition).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The local write failed; the operation aborted with no partial
    /// commit. Includes `NotFound` for amend/update targets.
    #[error(transparent)]
    Db(#[from] DbError),

    /// An explicit sync operation (outbox flush, reference pull) failed.
    /// Recording operations never raise this.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl BillingError {
    /// True when the error is a missing update/amend target.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::Db(DbError::NotFound { .. }))
    }
}

/// Result type for billing operations.
pub type BillingResult<T> = Result<T, BillingError>;

// =============================================================================
// Auth Error
// =============================================================================

/// Authentication outcomes that are not a success.
///
/// Credentials failures and connectivity failures are distinct results:
/// the UI offers retry-typing for one and offline-mode messaging for the
/// other.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username/password matched neither store.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The remote lookup (or the post-login history pull) could not run.
    #[error("Remote store unreachable: {0}")]
    Connectivity(String),

    /// A stored credential hash is malformed.
    #[error("Stored credential hash is invalid: {0}")]
    Hash(String),

    /// Local store failure during login bookkeeping.
    #[error(transparent)]
    Db(#[from] DbError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = BillingError::Db(DbError::not_found("Bill", "INVCL1-00099"));
        assert!(err.is_not_found());

        let err = BillingError::Validation(ValidationError::Required {
            field: "items".to_string(),
        });
        assert!(!err.is_not_found());
    }
}
