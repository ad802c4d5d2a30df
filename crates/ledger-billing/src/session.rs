//! # Session Context
//!
//! The per-login context value. It replaces a process-wide cached branch:
//! every core operation takes `&Session`, and logout is consuming the
//! value - there is no global to forget to invalidate and no stale copy
//! to trust after a re-login.

use chrono::{DateTime, Utc};

use ledger_core::Branch;

/// Where the credentials were verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Matched in the local store; no remote call was made.
    Local,
    /// Matched in the remote store; local branch row was replaced and the
    /// branch history pulled.
    Remote,
}

/// An authenticated operator context for one branch.
#[derive(Debug)]
pub struct Session {
    branch: Branch,
    source: AuthSource,
    opened_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(branch: Branch, source: AuthSource) -> Self {
        Session {
            branch,
            source,
            opened_at: Utc::now(),
        }
    }

    /// The authenticated branch.
    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    /// The branch number used in token prefixes and row scoping.
    pub fn branch_no(&self) -> i64 {
        self.branch.branch_no
    }

    /// Where the credentials were verified.
    pub fn source(&self) -> AuthSource {
        self.source
    }

    /// When the session was opened.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Ends the session. Consumes the value so no operation can run on a
    /// logged-out context.
    pub fn close(self) {
        tracing::info!(
            branch_no = self.branch.branch_no,
            username = %self.branch.username,
            "Session closed"
        );
    }
}
