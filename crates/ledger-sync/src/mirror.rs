//! # Outbox Mirror
//!
//! Pushes pending `sync_outbox` entries to the remote store.
//!
//! ## Mirror Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         flush(limit)                                    │
//! │                                                                         │
//! │  1. Probe: offline? → return, nothing attempted                        │
//! │  2. SELECT pending entries (synced_at IS NULL), oldest first           │
//! │  3. Skip entries past MAX_RETRY_ATTEMPTS (logged, left in place)       │
//! │  4. Per entry:                                                         │
//! │     • decode payload → remote write (bounded by timeout)               │
//! │     • success → entity row synced = 1, outbox synced_at = now          │
//! │     • failure → outbox attempts += 1, last_error; CONTINUE             │
//! │                                                                         │
//! │  The same push path serves the immediate post-commit attempt in        │
//! │  record_sale and the catch-up flush after connectivity returns;        │
//! │  ordering (oldest first) keeps an amend behind its insert.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure in here is absorbed: callers learn about remote state
//! only through the `synced` flag and the returned [`FlushStats`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ledger_core::{AdvanceBill, AdvanceBillItem, Bill, BillItem, Expense, OutboxEntry, PaymentType};
use ledger_db::Database;

use crate::error::{SyncError, SyncResult};
use crate::probe::ConnectivityProbe;
use crate::remote::RemoteStore;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of retry attempts before an entry is skipped by flushes.
pub const MAX_RETRY_ATTEMPTS: i64 = 10;

// =============================================================================
// Outbox Payloads
// =============================================================================

/// Entity types the mirror understands.
pub mod entity {
    pub const BILL: &str = "bill";
    pub const ADVANCE_BILL: &str = "advance_bill";
    pub const EXPENSE: &str = "expense";
}

/// Outbox operations.
pub mod op {
    pub const INSERT: &str = "insert";
    pub const AMEND: &str = "amend";
}

/// Payload of a `bill` / `insert` entry: the full header + items, captured
/// at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillPayload {
    pub bill: Bill,
    pub items: Vec<BillItem>,
}

/// Payload of an `advance_bill` / `insert` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancePayload {
    pub bill: AdvanceBill,
    pub items: Vec<AdvanceBillItem>,
}

/// Payload of an `expense` / `insert` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpensePayload {
    pub expense: Expense,
}

/// Payload of a `bill` / `amend` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendPayload {
    pub bill_id: String,
    pub old_invoice_no: String,
    pub new_invoice_no: String,
    pub new_payment_type: PaymentType,
}

// =============================================================================
// Flush Stats
// =============================================================================

/// Outcome of one flush pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Entries pushed successfully.
    pub mirrored: u64,
    /// Entries that failed and stay pending.
    pub failed: u64,
    /// Entries skipped for exceeding the retry cap.
    pub skipped: u64,
    /// True when the probe reported offline and nothing was attempted.
    pub offline: bool,
}

// =============================================================================
// Mirror
// =============================================================================

/// Pushes pending outbox entries to the remote store.
#[derive(Clone)]
pub struct Mirror {
    db: Database,
    remote: RemoteStore,
    probe: ConnectivityProbe,
}

impl Mirror {
    /// Creates a new Mirror.
    pub fn new(db: Database, remote: RemoteStore, probe: ConnectivityProbe) -> Self {
        Mirror { db, remote, probe }
    }

    /// Attempts to push one just-committed entry right now.
    ///
    /// This is the immediate half of the two-phase pipeline: the local
    /// transaction has already committed, so every failure here is logged
    /// and absorbed. Returns true when the entry was mirrored and the
    /// entity's `synced` flag set.
    pub async fn try_mirror(&self, entry: &OutboxEntry) -> bool {
        if !self.probe.is_online().await {
            debug!(entity_id = %entry.entity_id, "Mirror skipped: offline");
            return false;
        }

        match self.push_entry(entry).await {
            Ok(()) => {
                if let Err(e) = self.db.outbox().mark_synced(&entry.id).await {
                    warn!(entry_id = %entry.id, error = %e, "Failed to mark outbox entry synced");
                }
                true
            }
            Err(e) => {
                warn!(
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    error = %e,
                    "Remote mirror failed; local row stays synced = 0"
                );
                if let Err(mark_err) =
                    self.db.outbox().mark_failed(&entry.id, &e.to_string()).await
                {
                    warn!(entry_id = %entry.id, error = %mark_err, "Failed to record mirror failure");
                }
                false
            }
        }
    }

    /// Pushes pending entries, oldest first, up to `limit`.
    pub async fn flush(&self, limit: u32) -> SyncResult<FlushStats> {
        let mut stats = FlushStats::default();

        if !self.probe.is_online().await {
            debug!("Flush skipped: offline");
            stats.offline = true;
            return Ok(stats);
        }

        let entries = self.db.outbox().get_pending(limit).await?;
        if entries.is_empty() {
            debug!("No pending outbox entries");
            return Ok(stats);
        }

        info!(count = entries.len(), "Flushing outbox");

        for entry in &entries {
            if entry.attempts >= MAX_RETRY_ATTEMPTS {
                warn!(
                    entry_id = %entry.id,
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    attempts = entry.attempts,
                    "Skipping entry past the retry cap"
                );
                stats.skipped += 1;
                continue;
            }

            if self.try_mirror(entry).await {
                stats.mirrored += 1;
            } else {
                stats.failed += 1;
            }
        }

        info!(
            mirrored = stats.mirrored,
            failed = stats.failed,
            skipped = stats.skipped,
            "Flush complete"
        );

        Ok(stats)
    }

    /// Dispatches one entry to the matching remote write and, on success,
    /// marks the mirrored entity `synced = 1`.
    async fn push_entry(&self, entry: &OutboxEntry) -> SyncResult<()> {
        match (entry.entity_type.as_str(), entry.op.as_str()) {
            (entity::BILL, op::INSERT) => {
                let payload: BillPayload = serde_json::from_str(&entry.payload)?;
                self.remote.mirror_bill(&payload.bill, &payload.items).await?;
                self.db.bills().mark_synced(&entry.entity_id, true).await?;
            }

            (entity::BILL, op::AMEND) => {
                let payload: AmendPayload = serde_json::from_str(&entry.payload)?;
                self.remote
                    .apply_bill_amend(
                        &payload.bill_id,
                        &payload.new_invoice_no,
                        payload.new_payment_type.as_str(),
                    )
                    .await?;
                self.db.bills().mark_synced(&entry.entity_id, true).await?;
            }

            (entity::ADVANCE_BILL, op::INSERT) => {
                let payload: AdvancePayload = serde_json::from_str(&entry.payload)?;
                self.remote
                    .mirror_advance(&payload.bill, &payload.items)
                    .await?;
                self.db.advances().mark_synced(&entry.entity_id, true).await?;
            }

            (entity::EXPENSE, op::INSERT) => {
                let payload: ExpensePayload = serde_json::from_str(&entry.payload)?;
                self.remote.mirror_expense(&payload.expense).await?;
                self.db.expenses().mark_synced(&entry.entity_id, true).await?;
            }

            (other, _) => {
                return Err(SyncError::UnknownEntityType(other.to_string()));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MirrorMode, SyncConfig};
    use chrono::{NaiveDate, Utc};
    use ledger_db::DbConfig;
    use uuid::Uuid;

    fn offline_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.remote.url = Some("postgres://pos@127.0.0.1:1/ledger".to_string());
        config.remote.mode = MirrorMode::Offline;
        config.remote.operation_timeout_secs = 2;
        config.remote.connect_timeout_secs = 1;
        config
    }

    fn sample_bill() -> (Bill, Vec<BillItem>) {
        let now = Utc::now();
        let bill = Bill {
            id: Uuid::new_v4().to_string(),
            branch_no: 1,
            invoice_no: "INVCL1-00001".to_string(),
            bill_type: ledger_core::BillType::Sale,
            customer_id: None,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            taxable_cents: 500,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: 500,
            payment_type: PaymentType::Cash,
            synced: false,
            created_at: now,
            updated_at: now,
        };
        let items = vec![BillItem {
            id: Uuid::new_v4().to_string(),
            bill_id: bill.id.clone(),
            product_id: None,
            quantity: 2,
            unit_price_cents: 250,
            taxable_cents: 500,
            tax_cents: 0,
            line_total_cents: 500,
        }];
        (bill, items)
    }

    async fn mirror_with_offline_remote() -> (Database, Mirror) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = offline_config();
        let remote = RemoteStore::connect_lazy(&config).unwrap();
        let probe = ConnectivityProbe::from_config(&config).unwrap();
        (db.clone(), Mirror::new(db, remote, probe))
    }

    #[tokio::test]
    async fn test_offline_flush_attempts_nothing() {
        let (db, mirror) = mirror_with_offline_remote().await;

        let (bill, items) = sample_bill();
        let payload = serde_json::to_string(&BillPayload {
            bill: bill.clone(),
            items: items.clone(),
        })
        .unwrap();

        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            entity_type: entity::BILL.to_string(),
            entity_id: bill.id.clone(),
            op: op::INSERT.to_string(),
            payload,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            synced_at: None,
        };

        db.bills()
            .insert_with_items(&bill, &items, Some(&entry))
            .await
            .unwrap();

        let stats = mirror.flush(100).await.unwrap();
        assert!(stats.offline);
        assert_eq!(stats.mirrored, 0);

        // entry untouched, bill still local-only
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
        assert!(!db.bills().get_by_id(&bill.id).await.unwrap().unwrap().synced);
    }

    #[tokio::test]
    async fn test_try_mirror_offline_returns_false() {
        let (_db, mirror) = mirror_with_offline_remote().await;

        let (bill, items) = sample_bill();
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            entity_type: entity::BILL.to_string(),
            entity_id: bill.id.clone(),
            op: op::INSERT.to_string(),
            payload: serde_json::to_string(&BillPayload { bill, items }).unwrap(),
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            synced_at: None,
        };

        assert!(!mirror.try_mirror(&entry).await);
    }

    #[test]
    fn test_payload_round_trip() {
        let (bill, items) = sample_bill();
        let json = serde_json::to_string(&BillPayload {
            bill: bill.clone(),
            items,
        })
        .unwrap();

        let decoded: BillPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.bill.invoice_no, bill.invoice_no);
        assert_eq!(decoded.items.len(), 1);
    }
}
