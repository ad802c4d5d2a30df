//! # ledger-core: Pure Business Logic for LedgerPOS
//!
//! The heart of the billing ledger. Every rule that does not touch a
//! database or the network lives here as a pure function.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       LedgerPOS Architecture                            │
//! │                                                                         │
//! │  UI / API layer                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ledger-billing (operations facade)                                    │
//! │       │                                                                 │
//! │  ┌────▼────────────────────────────────────────────────────────────┐   │
//! │  │              ★ ledger-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌───────┐ ┌───────────┐ │   │
//! │  │  │  types  │ │  money  │ │ sequence │ │ split │ │ validation│ │   │
//! │  │  │ Bill,   │ │ Money   │ │ tokens,  │ │ split │ │  rules,   │ │   │
//! │  │  │ Branch  │ │ TaxRate │ │ prefixes │ │ math  │ │  checks   │ │   │
//! │  │  └─────────┘ └─────────┘ └──────────┘ └───────┘ └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ledger-db (SQLite) ── ledger-sync (remote store)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Branch, Bill, KotOrder, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`sequence`] - Invoice/KOT token categories, formatting and parsing
//! - [`split`] - Split-payment decomposition
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod sequence;
pub mod split;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use sequence::SequenceCategory;
pub use split::BillComponent;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed on a single bill.
///
/// Prevents runaway carts and keeps a ticket printable on one receipt.
pub const MAX_BILL_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Width of the numeric suffix in invoice and KOT tokens (`INVCL1-00001`).
pub const TOKEN_SUFFIX_WIDTH: usize = 5;
