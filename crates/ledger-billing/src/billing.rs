//! # Billing Transaction Manager
//!
//! The decompose → persist-locally → mirror-best-effort pipeline for
//! sales, advance bills, amendments and expenses.
//!
//! ## Durability Policy
//! The local transaction (header + items + outbox entry) is the
//! operation. Once it commits, the call succeeds - full stop. The remote
//! mirror that follows is an optimization: its failures are logged by the
//! mirror and reflected only in `synced = 0`, and the outbox entry stays
//! queued for the next flush. A sale is never lost and never blocked by
//! the network.

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use ledger_core::{
    split, validation, AdvanceBill, AdvanceBillItem, Bill, BillItem, BillType, Expense,
    NewAdvanceBill, NewBill, NewBillItem, NewExpense, OutboxEntry, PaymentType,
    SequenceCategory,
};
use ledger_db::{Database, DbError};
use ledger_sync::mirror::{
    entity, op, AdvancePayload, AmendPayload, BillPayload, ExpensePayload,
};
use ledger_sync::{FlushStats, Mirror};

use crate::error::BillingResult;
use crate::session::Session;

// =============================================================================
// Results
// =============================================================================

/// What the operator gets back for each persisted ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub bill_id: String,
    pub invoice_no: String,
    pub payment_type: PaymentType,
    pub total_cents: i64,
    /// True only when the immediate mirror attempt succeeded.
    pub synced: bool,
}

/// Result of an amendment.
#[derive(Debug, Clone, Serialize)]
pub struct AmendOutcome {
    pub bill_id: String,
    pub old_invoice_no: String,
    pub new_invoice_no: String,
    pub payment_type: PaymentType,
    pub synced: bool,
}

// =============================================================================
// Billing Manager
// =============================================================================

/// Orchestrates the two-phase (local-durable, remote-best-effort) billing
/// pipeline.
pub struct BillingManager {
    db: Database,
    mirror: Option<Mirror>,
}

impl BillingManager {
    /// Creates a new BillingManager. `mirror` is None when no remote store
    /// is configured; the outbox still accumulates for a later flush.
    pub fn new(db: Database, mirror: Option<Mirror>) -> Self {
        BillingManager { db, mirror }
    }

    /// Records a sale. Split payments produce up to two ledger rows, each
    /// numbered from its own sequence; every row is locally durable before
    /// its mirror attempt.
    pub async fn record_sale(
        &self,
        session: &Session,
        input: NewBill,
    ) -> BillingResult<Vec<SaleReceipt>> {
        validation::validate_new_bill(&input)?;
        let components = split::decompose(&input)?;

        let branch_no = session.branch_no();
        let mut receipts = Vec::with_capacity(components.len());

        for component in components {
            let invoice_no = self
                .db
                .sequences()
                .allocate(branch_no, component.category)
                .await?;

            let now = Utc::now();
            let bill_id = Uuid::new_v4().to_string();

            let bill = Bill {
                id: bill_id.clone(),
                branch_no,
                invoice_no: invoice_no.clone(),
                bill_type: BillType::Sale,
                customer_id: input.customer_id.clone(),
                bill_date: input.bill_date,
                taxable_cents: component.taxable_cents,
                tax_cents: component.tax_cents,
                discount_cents: component.discount_cents,
                total_cents: component.total_cents,
                payment_type: component.payment_type,
                synced: false,
                created_at: now,
                updated_at: now,
            };

            let items = build_items(&bill_id, &component.items);

            let entry = outbox_entry(
                entity::BILL,
                &bill_id,
                op::INSERT,
                &BillPayload {
                    bill: bill.clone(),
                    items: items.clone(),
                },
            )?;

            // phase 1: durable local commit (header + items + outbox)
            self.db
                .bills()
                .insert_with_items(&bill, &items, Some(&entry))
                .await?;

            // phase 2: best-effort mirror; failures stay in the outbox
            let synced = match &self.mirror {
                Some(mirror) => mirror.try_mirror(&entry).await,
                None => false,
            };

            info!(
                invoice_no = %invoice_no,
                total_cents = bill.total_cents,
                payment_type = %bill.payment_type,
                synced,
                "Sale recorded"
            );

            receipts.push(SaleReceipt {
                bill_id,
                invoice_no,
                payment_type: bill.payment_type,
                total_cents: bill.total_cents,
                synced,
            });
        }

        Ok(receipts)
    }

    /// Records an advance (deposit) bill against the advance ledger.
    pub async fn record_advance(
        &self,
        session: &Session,
        input: NewAdvanceBill,
    ) -> BillingResult<SaleReceipt> {
        validation::validate_new_advance(&input)?;

        let branch_no = session.branch_no();
        let invoice_no = self
            .db
            .sequences()
            .allocate(branch_no, SequenceCategory::Default)
            .await?;

        let now = Utc::now();
        let bill_id = Uuid::new_v4().to_string();
        let total = input.grand_total();

        let bill = AdvanceBill {
            id: bill_id.clone(),
            branch_no,
            invoice_no: invoice_no.clone(),
            customer_id: input.customer_id.clone(),
            bill_date: input.bill_date,
            taxable_cents: input.taxable_total().cents(),
            tax_cents: input.tax_total().cents(),
            discount_cents: input.discount_cents,
            total_cents: total.cents(),
            advance_cents: input.advance_cents,
            balance_cents: input.balance().cents(),
            payment_type: input.payment_type,
            synced: false,
            created_at: now,
            updated_at: now,
        };

        let items: Vec<AdvanceBillItem> = input
            .items
            .iter()
            .map(|item| AdvanceBillItem {
                id: Uuid::new_v4().to_string(),
                bill_id: bill_id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                taxable_cents: item.taxable().cents(),
                tax_cents: item.tax().cents(),
                line_total_cents: item.line_total().cents(),
            })
            .collect();

        let entry = outbox_entry(
            entity::ADVANCE_BILL,
            &bill_id,
            op::INSERT,
            &AdvancePayload {
                bill: bill.clone(),
                items: items.clone(),
            },
        )?;

        self.db
            .advances()
            .insert_with_items(&bill, &items, Some(&entry))
            .await?;

        let synced = match &self.mirror {
            Some(mirror) => mirror.try_mirror(&entry).await,
            None => false,
        };

        info!(
            invoice_no = %invoice_no,
            advance_cents = bill.advance_cents,
            balance_cents = bill.balance_cents,
            synced,
            "Advance bill recorded"
        );

        Ok(SaleReceipt {
            bill_id,
            invoice_no,
            payment_type: bill.payment_type,
            total_cents: bill.total_cents,
            synced,
        })
    }

    /// Amends an existing bill: fresh invoice number from the new payment
    /// type's sequence, `synced` reset, amend entry queued - then a
    /// best-effort remote update. `NotFound` when the invoice does not
    /// exist in this branch; the local change stands whatever the network
    /// does.
    pub async fn amend(
        &self,
        session: &Session,
        existing_invoice: &str,
        new_payment_type: PaymentType,
    ) -> BillingResult<AmendOutcome> {
        let branch_no = session.branch_no();

        let bill = self
            .db
            .bills()
            .get_by_invoice(branch_no, existing_invoice)
            .await?
            .ok_or_else(|| DbError::not_found("Bill", existing_invoice))?;

        let category = SequenceCategory::for_payment(new_payment_type);
        let new_invoice_no = self.db.sequences().allocate(branch_no, category).await?;

        let entry = outbox_entry(
            entity::BILL,
            &bill.id,
            op::AMEND,
            &AmendPayload {
                bill_id: bill.id.clone(),
                old_invoice_no: bill.invoice_no.clone(),
                new_invoice_no: new_invoice_no.clone(),
                new_payment_type,
            },
        )?;

        self.db
            .bills()
            .amend(&bill.id, &new_invoice_no, new_payment_type, &entry)
            .await?;

        let synced = match &self.mirror {
            Some(mirror) => mirror.try_mirror(&entry).await,
            None => false,
        };

        info!(
            old_invoice_no = %bill.invoice_no,
            new_invoice_no = %new_invoice_no,
            synced,
            "Bill amended"
        );

        Ok(AmendOutcome {
            bill_id: bill.id,
            old_invoice_no: bill.invoice_no,
            new_invoice_no,
            payment_type: new_payment_type,
            synced,
        })
    }

    /// Records a branch expense with the same durability policy as bills.
    pub async fn record_expense(
        &self,
        session: &Session,
        input: NewExpense,
    ) -> BillingResult<String> {
        validation::validate_new_expense(&input)?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            branch_no: session.branch_no(),
            category_id: input.category_id.clone(),
            amount_cents: input.amount_cents,
            note: input.note.clone(),
            expense_date: input.expense_date,
            synced: false,
            created_at: Utc::now(),
        };

        let entry = outbox_entry(
            entity::EXPENSE,
            &expense.id,
            op::INSERT,
            &ExpensePayload {
                expense: expense.clone(),
            },
        )?;

        self.db.expenses().insert(&expense, Some(&entry)).await?;

        if let Some(mirror) = &self.mirror {
            mirror.try_mirror(&entry).await;
        }

        Ok(expense.id)
    }

    /// Previews the next token of a sequence without reserving it.
    /// Repeated previews agree until an allocation lands; only
    /// `record_sale` / `record_advance` finalize a number.
    pub async fn preview_invoice(
        &self,
        session: &Session,
        category: SequenceCategory,
    ) -> BillingResult<String> {
        let token = self
            .db
            .sequences()
            .peek(session.branch_no(), category)
            .await?;
        Ok(token)
    }

    /// Pushes pending outbox entries (login, reconnect, on demand).
    pub async fn flush_outbox(&self, limit: u32) -> BillingResult<FlushStats> {
        match &self.mirror {
            Some(mirror) => Ok(mirror.flush(limit).await?),
            None => Ok(FlushStats::default()),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn build_items(bill_id: &str, requested: &[NewBillItem]) -> Vec<BillItem> {
    requested
        .iter()
        .map(|item| BillItem {
            id: Uuid::new_v4().to_string(),
            bill_id: bill_id.to_string(),
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            taxable_cents: item.taxable().cents(),
            tax_cents: item.tax().cents(),
            line_total_cents: item.line_total().cents(),
        })
        .collect()
}

fn outbox_entry<T: Serialize>(
    entity_type: &str,
    entity_id: &str,
    operation: &str,
    payload: &T,
) -> BillingResult<OutboxEntry> {
    let payload =
        serde_json::to_string(payload).map_err(ledger_sync::SyncError::from)?;

    Ok(OutboxEntry {
        id: Uuid::new_v4().to_string(),
        entity_type: entity_type.to_string(),
        entity_id: entity_id.to_string(),
        op: operation.to_string(),
        payload,
        attempts: 0,
        last_error: None,
        created_at: Utc::now(),
        attempted_at: None,
        synced_at: None,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::session::{AuthSource, Session};
    use chrono::NaiveDate;
    use ledger_core::Branch;
    use ledger_db::DbConfig;

    async fn offline_manager(branch_no: i64) -> (Database, BillingManager, Session) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            branch_no,
            name: format!("Branch {branch_no}"),
            username: format!("branch{branch_no}"),
            password_hash: hash_password("pw").unwrap(),
            address: None,
            tax_id: None,
            created_at: Utc::now(),
        };
        db.branches().insert(&branch).await.unwrap();

        let session = Session::new(branch, AuthSource::Local);
        let manager = BillingManager::new(db.clone(), None);
        (db, manager, session)
    }

    fn cash_sale(qty: i64, unit_price: i64) -> NewBill {
        NewBill {
            customer_id: None,
            payment_type: PaymentType::Cash,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            discount_cents: 0,
            online_cents: 0,
            cash_cents: 0,
            items: vec![NewBillItem {
                product_id: None,
                quantity: qty,
                unit_price_cents: unit_price,
                tax_rate_bps: 0,
            }],
        }
    }

    #[tokio::test]
    async fn test_offline_sale_is_durable_and_unsynced() {
        let (db, manager, session) = offline_manager(1).await;

        let receipts = manager
            .record_sale(&session, cash_sale(2, 250))
            .await
            .unwrap();

        // exactly one bill, success reported, synced = 0
        assert_eq!(receipts.len(), 1);
        assert!(!receipts[0].synced);

        let stored = db
            .bills()
            .get_by_id(&receipts[0].bill_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.synced);
        assert_eq!(db.bills().items(&stored.id).await.unwrap().len(), 1);

        // the pending remote write is queued durably
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cash_sale_amounts_and_invoice_number() {
        // branch 3, one item qty 2 x 250
        let (_db, manager, session) = offline_manager(3).await;

        let receipts = manager
            .record_sale(&session, cash_sale(2, 250))
            .await
            .unwrap();

        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].invoice_no, "INVCL3-00001");
        assert_eq!(receipts[0].total_cents, 500);
    }

    #[tokio::test]
    async fn test_split_sale_produces_two_reconciled_bills() {
        let (db, manager, session) = offline_manager(1).await;

        let mut input = cash_sale(2, 250); // total 500
        input.payment_type = PaymentType::Split;
        input.online_cents = 300;
        input.cash_cents = 200;

        let receipts = manager.record_sale(&session, input).await.unwrap();

        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].payment_type, PaymentType::Split);
        assert_eq!(receipts[0].invoice_no, "INVSP1-00001");
        assert_eq!(receipts[1].payment_type, PaymentType::Cash);
        assert_eq!(receipts[1].invoice_no, "INVSC1-00001");

        // reconciliation: the two rows sum to the declared amount
        let sum: i64 = receipts.iter().map(|r| r.total_cents).sum();
        assert_eq!(sum, 500);

        // both rows are real, independent ledger entries
        for receipt in &receipts {
            assert!(db.bills().get_by_id(&receipt.bill_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_split_mismatch_persists_nothing() {
        let (db, manager, session) = offline_manager(1).await;

        let mut input = cash_sale(2, 250);
        input.payment_type = PaymentType::Split;
        input.online_cents = 300;
        input.cash_cents = 100; // 400 != 500

        assert!(manager.record_sale(&session, input).await.is_err());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_amend_renumbers_and_resets_synced() {
        let (db, manager, session) = offline_manager(1).await;

        let receipts = manager
            .record_sale(&session, cash_sale(1, 900))
            .await
            .unwrap();
        let original = &receipts[0];

        // pretend the mirror had confirmed it
        db.bills().mark_synced(&original.bill_id, true).await.unwrap();

        let outcome = manager
            .amend(&session, &original.invoice_no, PaymentType::Online)
            .await
            .unwrap();

        assert_eq!(outcome.old_invoice_no, "INVCL1-00001");
        assert_eq!(outcome.new_invoice_no, "INVOL1-00001");
        assert!(!outcome.synced);

        let stored = db.bills().get_by_id(&outcome.bill_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_type, PaymentType::Online);
        assert!(!stored.synced);
    }

    #[tokio::test]
    async fn test_amend_missing_invoice_is_not_found() {
        let (_db, manager, session) = offline_manager(1).await;

        let err = manager
            .amend(&session, "INVCL1-09999", PaymentType::Cash)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_advance_balance_math() {
        let (db, manager, session) = offline_manager(2).await;

        let input = NewAdvanceBill {
            customer_id: None,
            payment_type: PaymentType::Cash,
            bill_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            discount_cents: 0,
            advance_cents: 400,
            items: vec![NewBillItem {
                product_id: None,
                quantity: 4,
                unit_price_cents: 250,
                tax_rate_bps: 0,
            }],
        };

        let receipt = manager.record_advance(&session, input).await.unwrap();
        assert_eq!(receipt.invoice_no, "INV2-00001");

        let stored = db
            .advances()
            .get_by_id(&receipt.bill_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_cents, 1_000);
        assert_eq!(stored.advance_cents, 400);
        assert_eq!(stored.balance_cents, 600);
        assert!(!stored.synced);
    }

    #[tokio::test]
    async fn test_preview_does_not_consume_numbers() {
        let (_db, manager, session) = offline_manager(1).await;

        let preview = manager
            .preview_invoice(&session, SequenceCategory::Cash)
            .await
            .unwrap();
        assert_eq!(preview, "INVCL1-00001");

        // a second preview agrees; the eventual sale takes that number
        assert_eq!(
            manager
                .preview_invoice(&session, SequenceCategory::Cash)
                .await
                .unwrap(),
            preview
        );

        let receipts = manager
            .record_sale(&session, cash_sale(1, 100))
            .await
            .unwrap();
        assert_eq!(receipts[0].invoice_no, preview);
    }

    #[tokio::test]
    async fn test_flush_without_remote_is_a_noop() {
        let (_db, manager, _session) = offline_manager(1).await;
        let stats = manager.flush_outbox(10).await.unwrap();
        assert_eq!(stats, FlushStats::default());
    }
}
