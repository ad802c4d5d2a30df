//! # KOT Lifecycle
//!
//! Kitchen order tickets: `pending → baking → ready`, with `cancelled`
//! reachable from any non-terminal state. The state machine itself lives
//! in `ledger-core`; this manager validates transitions against the
//! current row and applies them with a guarded update.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use ledger_core::{
    validation, CoreError, KotItem, KotOrder, KotStatus, NewKotOrder, SequenceCategory,
};
use ledger_db::{Database, DbError};

use crate::error::BillingResult;
use crate::session::Session;

/// Kitchen ticket operations.
pub struct KotManager {
    db: Database,
}

impl KotManager {
    /// Creates a new KotManager.
    pub fn new(db: Database) -> Self {
        KotManager { db }
    }

    /// Creates a ticket: token from the per-branch KOT sequence, header
    /// and lines in one local transaction, status `pending`.
    pub async fn create_order(
        &self,
        session: &Session,
        input: NewKotOrder,
    ) -> BillingResult<KotOrder> {
        validation::validate_new_kot(&input)?;

        let branch_no = session.branch_no();
        let token = self
            .db
            .sequences()
            .allocate(branch_no, SequenceCategory::Kot)
            .await?;

        let now = Utc::now();
        let order = KotOrder {
            id: Uuid::new_v4().to_string(),
            branch_no,
            token: token.clone(),
            status: KotStatus::Pending,
            table_no: input.table_no.clone(),
            note: input.note.clone(),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<KotItem> = input
            .items
            .iter()
            .map(|item| KotItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                note: item.note.clone(),
            })
            .collect();

        self.db.kots().insert_with_items(&order, &items).await?;

        info!(token = %token, items = items.len(), "KOT created");
        Ok(order)
    }

    /// Moves a ticket to a new status. `NotFound` when the id matches no
    /// row; an `InvalidKotTransition` when the state machine forbids the
    /// move (including anything out of a terminal state).
    pub async fn update_status(
        &self,
        _session: &Session,
        order_id: &str,
        next: KotStatus,
    ) -> BillingResult<KotOrder> {
        let order = self
            .db
            .kots()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("KotOrder", order_id))?;

        if !order.status.can_transition(next) {
            return Err(CoreError::InvalidKotTransition {
                order_id: order_id.to_string(),
                from: order.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        self.db.kots().update_status(order_id, order.status, next).await?;

        info!(token = %order.token, from = %order.status, to = %next, "KOT status updated");

        Ok(KotOrder {
            status: next,
            updated_at: Utc::now(),
            ..order
        })
    }

    /// Items of a ticket.
    pub async fn items(&self, order_id: &str) -> BillingResult<Vec<KotItem>> {
        Ok(self.db.kots().items(order_id).await?)
    }

    /// Non-terminal tickets for the branch, oldest first (urgency
    /// display).
    pub async fn open_orders(&self, session: &Session) -> BillingResult<Vec<KotOrder>> {
        Ok(self.db.kots().open_orders(session.branch_no()).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::error::BillingError;
    use crate::session::AuthSource;
    use ledger_core::{Branch, NewKotItem};
    use ledger_db::DbConfig;

    async fn manager_with_session(branch_no: i64) -> (KotManager, Session) {
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

        (KotManager::new(db), Session::new(branch, AuthSource::Local))
    }

    fn two_pizzas() -> NewKotOrder {
        NewKotOrder {
            table_no: Some("T7".to_string()),
            note: None,
            items: vec![NewKotItem {
                product_id: None,
                quantity: 2,
                note: Some("extra cheese".to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn test_create_allocates_branch_token() {
        let (manager, session) = manager_with_session(3).await;

        let order = manager.create_order(&session, two_pizzas()).await.unwrap();
        assert_eq!(order.token, "KOT3-00001");
        assert_eq!(order.status, KotStatus::Pending);
        assert_eq!(manager.items(&order.id).await.unwrap().len(), 1);

        let second = manager.create_order(&session, two_pizzas()).await.unwrap();
        assert_eq!(second.token, "KOT3-00002");
    }

    #[tokio::test]
    async fn test_lifecycle_happy_path() {
        let (manager, session) = manager_with_session(1).await;
        let order = manager.create_order(&session, two_pizzas()).await.unwrap();

        let order = manager
            .update_status(&session, &order.id, KotStatus::Baking)
            .await
            .unwrap();
        assert_eq!(order.status, KotStatus::Baking);

        let order = manager
            .update_status(&session, &order.id, KotStatus::Ready)
            .await
            .unwrap();
        assert_eq!(order.status, KotStatus::Ready);

        // ready is terminal
        let err = manager
            .update_status(&session, &order.id, KotStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::Core(CoreError::InvalidKotTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_from_baking() {
        let (manager, session) = manager_with_session(1).await;
        let order = manager.create_order(&session, two_pizzas()).await.unwrap();

        manager
            .update_status(&session, &order.id, KotStatus::Baking)
            .await
            .unwrap();
        let order = manager
            .update_status(&session, &order.id, KotStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(order.status, KotStatus::Cancelled);

        assert!(manager.open_orders(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let (manager, session) = manager_with_session(1).await;

        let err = manager
            .update_status(&session, "no-such-order", KotStatus::Baking)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
