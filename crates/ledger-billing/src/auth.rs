//! # Authentication
//!
//! Local-first login with remote fallback.
//!
//! ## Order of Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  authenticate(username, password)                                       │
//! │                                                                         │
//! │  1. LOCAL: find branch by username, verify argon2 hash                 │
//! │     match → purge every other branch row, Session(source = Local)      │
//! │     (no remote call at all)                                            │
//! │                                                                         │
//! │  2. REMOTE: same lookup against the shared store (bounded by timeout)  │
//! │     match → replace the whole local branches table with the row,       │
//! │             pull the branch's billing/expense history,                 │
//! │             Session(source = Remote)                                   │
//! │                                                                         │
//! │  3. neither matches        → AuthError::InvalidCredentials             │
//! │     remote call errored    → AuthError::Connectivity (distinct)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invariant: after any successful authenticate exactly one branch row
//! exists locally.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use tracing::{info, warn};

use ledger_db::Database;
use ledger_sync::{RemoteStore, Replicator};

use crate::error::AuthError;
use crate::session::{AuthSource, Session};

/// Verifies operator credentials and establishes sessions.
pub struct Authenticator {
    db: Database,
    remote: Option<RemoteStore>,
    replicator: Option<Replicator>,
}

impl Authenticator {
    /// Creates a new Authenticator. `remote`/`replicator` are None when no
    /// remote store is configured; logins then work purely locally.
    pub fn new(
        db: Database,
        remote: Option<RemoteStore>,
        replicator: Option<Replicator>,
    ) -> Self {
        Authenticator {
            db,
            remote,
            replicator,
        }
    }

    /// Authenticates an operator and returns the session context.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        // 1. local store first: offline logins must keep working
        if let Some(branch) = self.db.branches().find_by_username(username).await? {
            if verify_password(password, &branch.password_hash)? {
                self.db.branches().purge_others(&branch.id).await?;

                info!(
                    branch_no = branch.branch_no,
                    username = %username,
                    "Authenticated against local store"
                );
                return Ok(Session::new(branch, AuthSource::Local));
            }
            // fall through: the password may have changed remotely
        }

        // 2. remote lookup
        let remote = self.remote.as_ref().ok_or_else(|| {
            AuthError::Connectivity("remote store is not configured".to_string())
        })?;

        let found = remote
            .find_branch(username)
            .await
            .map_err(|e| AuthError::Connectivity(e.to_string()))?;

        match found {
            Some(branch) if verify_password(password, &branch.password_hash)? => {
                // single-active-branch: replace the whole table atomically
                self.db.branches().replace_all(&branch).await?;

                // pull this branch's history so reports work immediately
                if let Some(replicator) = &self.replicator {
                    replicator
                        .pull_branch_history(branch.branch_no)
                        .await
                        .map_err(|e| AuthError::Connectivity(e.to_string()))?;
                }

                info!(
                    branch_no = branch.branch_no,
                    username = %username,
                    "Authenticated against remote store"
                );
                Ok(Session::new(branch, AuthSource::Remote))
            }
            _ => {
                warn!(username = %username, "Credentials matched neither store");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Ends a session. The context value is consumed; nothing cached
    /// survives the logout.
    pub fn logout(&self, session: Session) {
        session.close();
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password for storage (branch provisioning).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verifies a password against a stored PHC-format hash.
fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::Hash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_core::Branch;
    use ledger_db::DbConfig;
    use uuid::Uuid;

    fn branch(no: i64, username: &str, password: &str) -> Branch {
        Branch {
            id: Uuid::new_v4().to_string(),
            branch_no: no,
            name: format!("Branch {no}"),
            username: username.to_string(),
            password_hash: hash_password(password).unwrap(),
            address: None,
            tax_id: None,
            created_at: Utc::now(),
        }
    }

    fn local_only(db: Database) -> Authenticator {
        Authenticator::new(db, None, None)
    }

    #[tokio::test]
    async fn test_local_login_success_and_purge() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.branches().insert(&branch(1, "old", "pw")).await.unwrap();
        db.branches()
            .insert(&branch(2, "alpha", "secret"))
            .await
            .unwrap();

        let auth = local_only(db.clone());
        let session = auth.authenticate("alpha", "secret").await.unwrap();

        assert_eq!(session.source(), AuthSource::Local);
        assert_eq!(session.branch_no(), 2);
        // single-active-branch invariant
        assert_eq!(db.branches().count().await.unwrap(), 1);

        auth.logout(session);
    }

    #[tokio::test]
    async fn test_wrong_password_without_remote_is_connectivity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.branches()
            .insert(&branch(1, "alpha", "secret"))
            .await
            .unwrap();

        // local verify fails, and there is no remote to consult
        let auth = local_only(db);
        let err = auth.authenticate("alpha", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_unknown_user_without_remote_is_connectivity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let auth = local_only(db);

        let err = auth.authenticate("ghost", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Connectivity(_)));
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());

        assert!(verify_password("x", "not-a-phc-hash").is_err());
    }
}
