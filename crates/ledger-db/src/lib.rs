//! # ledger-db: Local Store for LedgerPOS
//!
//! SQLite access layer for the device's authoritative data copy.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       LedgerPOS Data Flow                               │
//! │                                                                         │
//! │  ledger-billing (record_sale, authenticate, ...)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ledger-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌────────────────┐  │   │
//! │  │   │   Database    │   │  Repositories  │   │   Migrations   │  │   │
//! │  │   │   (pool.rs)   │◄──│ bill, branch,  │   │  (embedded)    │  │   │
//! │  │   │  SqlitePool   │   │ kot, sequence, │   │ 001_initial…   │  │   │
//! │  │   │  WAL mode     │   │ outbox, ...    │   │                │  │   │
//! │  │   └───────────────┘   └────────────────┘   └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────────────────────────────────────────────────┐ │   │
//! │  │   │ query.rs - parameterized SELECT/COUNT/INSERT builders    │ │   │
//! │  │   │ (every outside value is bound, never spliced into SQL)   │ │   │
//! │  │   └──────────────────────────────────────────────────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL) - survives total network loss                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`query`] - Parameterized query builders
//! - [`repository`] - Repository implementations per aggregate

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::advance::AdvanceRepository;
pub use repository::bill::BillRepository;
pub use repository::branch::BranchRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::expense::ExpenseRepository;
pub use repository::kot::KotRepository;
pub use repository::outbox::OutboxRepository;
pub use repository::sequence::SequenceAllocator;
pub use repository::sync_meta::SyncMetaRepository;
