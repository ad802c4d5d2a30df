//! # Sync Error Types
//!
//! The spec's remote-failure taxonomy lives here:
//!
//! - `ConnectionFailed` / `Timeout` - "remote unreachable": the probe was
//!   wrong or the network dropped between check and use
//! - `RemoteWrite` / `RemoteQuery` - connected, but the statement failed
//!
//! All of these are absorbed by the mirror path and represented only
//! through the `synced` flag. Configuration and payload errors are the
//! caller's bug and are not retryable.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all remote-side failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote store URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Remote store is not configured (no URL).
    #[error("Remote store is not configured")]
    RemoteNotConfigured,

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to reach or connect to the remote store.
    #[error("Remote connection failed: {0}")]
    ConnectionFailed(String),

    /// A remote operation exceeded its timeout budget.
    ///
    /// Handled identically to "remote unreachable": the local result
    /// stands, `synced` stays 0.
    #[error("Remote operation timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Remote Statement Errors
    // =========================================================================
    /// Connected, but a remote insert/update failed.
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    /// Connected, but a remote select failed.
    #[error("Remote query failed: {0}")]
    RemoteQuery(String),

    // =========================================================================
    // Local / Payload Errors
    // =========================================================================
    /// A local store operation inside a sync flow failed.
    #[error("Local store error: {0}")]
    Database(String),

    /// Outbox payload could not be (de)serialized.
    #[error("Payload serialization failed: {0}")]
    Serialization(String),

    /// Outbox entry names an entity type the mirror does not know.
    #[error("Unknown outbox entity type: {0}")]
    UnknownEntityType(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ledger_db::DbError> for SyncError {
    fn from(err: ledger_db::DbError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// True when the failure is transient and the entry should stay in the
    /// outbox for a later flush.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Timeout(_)
                | SyncError::RemoteWrite(_)
                | SyncError::RemoteQuery(_)
        )
    }

    /// True when the failure indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::RemoteNotConfigured
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SyncError::Timeout(15).is_retryable());
        assert!(SyncError::RemoteWrite("constraint".into()).is_retryable());

        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::UnknownEntityType("ghost".into()).is_retryable());
        assert!(!SyncError::Serialization("truncated".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Timeout(15);
        assert_eq!(err.to_string(), "Remote operation timed out after 15 seconds");
    }
}
