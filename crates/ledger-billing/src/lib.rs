//! # ledger-billing: Operations Facade for LedgerPOS
//!
//! The crate the UI/API layer talks to. Everything underneath (local
//! store, remote mirroring, replication) is wired here and reached only
//! through these operations.
//!
//! ## Operation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_sale(&session, input)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate → decompose (split math, ledger-core)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  per component:                                                        │
//! │    allocate invoice number          (ledger-db, atomic counter)        │
//! │    INSERT header+items+outbox       (ledger-db, ONE transaction)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │    probe → mirror to remote         (ledger-sync, best effort)         │
//! │    ok → synced = 1  |  any failure → logged, swallowed, synced = 0     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleReceipt { invoice_no, synced, … }  ← always success once the      │
//! │                                           local write committed        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod billing;
pub mod error;
pub mod kot;
pub mod reports;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::Authenticator;
pub use billing::{AmendOutcome, BillingManager, SaleReceipt};
pub use error::{AuthError, BillingError, BillingResult};
pub use kot::KotManager;
pub use reports::{BillDetail, Page, ReportService};
pub use session::{AuthSource, Session};

use ledger_db::Database;
use ledger_sync::{
    ConnectivityProbe, Mirror, RemoteStore, Replicator, SyncConfig, SyncError,
};

// =============================================================================
// Ledger Facade
// =============================================================================

/// Wires the whole stack from a local store and a sync configuration.
///
/// With no remote URL configured the device runs purely local: every
/// operation works, the outbox accumulates, and a later reconfiguration
/// plus flush drains it.
pub struct Ledger {
    auth: Authenticator,
    billing: BillingManager,
    kots: KotManager,
    reports: ReportService,
    replicator: Option<Replicator>,
}

impl Ledger {
    /// Builds the facade. Never touches the network: the remote pool is
    /// lazy and the probe only runs per operation.
    pub fn new(db: Database, config: &SyncConfig) -> Result<Self, SyncError> {
        let (remote, mirror) = match config.remote_url() {
            Some(_) => {
                let remote = RemoteStore::connect_lazy(config)?;
                let probe = ConnectivityProbe::from_config(config)?;
                let mirror = Mirror::new(db.clone(), remote.clone(), probe);
                (Some(remote), Some(mirror))
            }
            None => (None, None),
        };

        let replicator = remote
            .clone()
            .map(|r| Replicator::new(db.clone(), r));

        Ok(Ledger {
            auth: Authenticator::new(db.clone(), remote, replicator.clone()),
            billing: BillingManager::new(db.clone(), mirror.clone()),
            kots: KotManager::new(db.clone()),
            reports: ReportService::new(db),
            replicator,
        })
    }

    /// Authentication operations.
    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    /// Billing operations.
    pub fn billing(&self) -> &BillingManager {
        &self.billing
    }

    /// Kitchen ticket operations.
    pub fn kots(&self) -> &KotManager {
        &self.kots
    }

    /// Read/report operations.
    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    /// The replicator, when a remote store is configured (application
    /// start calls `pull_reference_data` through this).
    pub fn replicator(&self) -> Option<&Replicator> {
        self.replicator.as_ref()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use ledger_core::{Branch, NewBill, NewBillItem, PaymentType};
    use ledger_db::DbConfig;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_facade_runs_purely_local_without_remote() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.branches()
            .insert(&Branch {
                id: Uuid::new_v4().to_string(),
                branch_no: 1,
                name: "Branch 1".to_string(),
                username: "branch1".to_string(),
                password_hash: auth::hash_password("demo").unwrap(),
                address: None,
                tax_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        // default config: no remote URL
        let ledger = Ledger::new(db.clone(), &SyncConfig::default()).unwrap();
        assert!(ledger.replicator().is_none());

        let session = ledger.auth().authenticate("branch1", "demo").await.unwrap();
        assert_eq!(session.source(), AuthSource::Local);

        let receipts = ledger
            .billing()
            .record_sale(
                &session,
                NewBill {
                    customer_id: None,
                    payment_type: PaymentType::Cash,
                    bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                    discount_cents: 0,
                    online_cents: 0,
                    cash_cents: 0,
                    items: vec![NewBillItem {
                        product_id: None,
                        quantity: 1,
                        unit_price_cents: 850,
                        tax_rate_bps: 0,
                    }],
                },
            )
            .await
            .unwrap();

        assert_eq!(receipts.len(), 1);
        assert!(!receipts[0].synced);

        let detail = ledger
            .reports()
            .bill_detail(&session, &receipts[0].bill_id)
            .await
            .unwrap();
        assert_eq!(detail.bill.total_cents, 850);

        ledger.auth().logout(session);
    }
}
