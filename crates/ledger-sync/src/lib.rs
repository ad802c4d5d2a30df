//! # ledger-sync: Remote Store Client for LedgerPOS
//!
//! The sync layer between the device's local store and the shared remote
//! ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     LedgerPOS Sync Layer                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   ledger-sync (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │   │
//! │  │  │ Probe       │  │ RemoteStore │  │ Mirror                  │ │   │
//! │  │  │ (probe.rs)  │  │ (remote.rs) │  │ (mirror.rs)             │ │   │
//! │  │  │             │  │             │  │                         │ │   │
//! │  │  │ TCP reach-  │─►│ lazy PgPool │◄─│ reads sync_outbox,      │ │   │
//! │  │  │ ability,    │  │ bound $n    │  │ pushes entries, marks   │ │   │
//! │  │  │ timeout     │  │ writes, op  │  │ synced / failed         │ │   │
//! │  │  │             │  │ timeouts    │  │                         │ │   │
//! │  │  └─────────────┘  └─────────────┘  └─────────────────────────┘ │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────┐  ┌──────────────────────────────────────────┐ │   │
//! │  │  │ Config      │  │ Replicator (replicator.rs)               │ │   │
//! │  │  │ (TOML+env)  │  │ TableSpec-driven pulls: remote SELECT →  │ │   │
//! │  │  │ MirrorMode  │  │ normalize → INSERT OR IGNORE in one tx   │ │   │
//! │  │  └─────────────┘  └──────────────────────────────────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  POLICY: the local write has already committed by the time anything    │
//! │  here runs. Failures are logged and absorbed; `synced = 0` is the      │
//! │  only trace they leave.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod mirror;
pub mod probe;
pub mod remote;
pub mod replicator;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{MirrorMode, RemoteSettings, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use mirror::{FlushStats, Mirror};
pub use probe::ConnectivityProbe;
pub use remote::RemoteStore;
pub use replicator::{PullFilter, Replicator, TableSpec};
