//! # Sequence Tokens
//!
//! Pure rules for invoice numbers and KOT tokens: category → prefix
//! mapping, formatting, and suffix parsing. The allocation itself (the
//! atomic counter) lives in `ledger-db`; this module only knows what a
//! token looks like.
//!
//! ## Token Shape
//! ```text
//!   {code}{branch_no}-{NNNNN}
//!
//!   INVCL1-00001   cash sale, branch 1, first invoice
//!   INVSP3-00042   online portion of a split sale, branch 3
//!   KOT3-00017     kitchen ticket, branch 3
//! ```
//! The numeric suffix is whatever follows the LAST `-`, zero-padded to
//! five digits; sequences start at `00001`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::PaymentType;
use crate::TOKEN_SUFFIX_WIDTH;

// =============================================================================
// Sequence Category
// =============================================================================

/// One independent numbering sequence per (branch, category) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceCategory {
    /// Fallback prefix; advance bills number from here.
    Default,
    /// Plain cash sales.
    Cash,
    /// Plain online sales.
    Online,
    /// Online portion of a split sale.
    Split,
    /// Cash portion of a split sale.
    SplitCash,
    /// Kitchen order tickets.
    Kot,
}

impl SequenceCategory {
    /// Stable textual form, used as the counter-table key.
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceCategory::Default => "default",
            SequenceCategory::Cash => "cash",
            SequenceCategory::Online => "online",
            SequenceCategory::Split => "split",
            SequenceCategory::SplitCash => "split-cash",
            SequenceCategory::Kot => "kot",
        }
    }

    /// Prefix code, before the branch number is appended.
    pub fn code(&self) -> &'static str {
        match self {
            SequenceCategory::Default => "INV",
            SequenceCategory::Cash => "INVCL",
            SequenceCategory::Online => "INVOL",
            SequenceCategory::Split => "INVSP",
            SequenceCategory::SplitCash => "INVSC",
            SequenceCategory::Kot => "KOT",
        }
    }

    /// Full prefix for a branch: `INVCL1`, `KOT3`, ...
    pub fn prefix(&self, branch_no: i64) -> String {
        format!("{}{}", self.code(), branch_no)
    }

    /// The sequence a plain (non-split) payment numbers from.
    pub fn for_payment(payment: PaymentType) -> Self {
        match payment {
            PaymentType::Cash => SequenceCategory::Cash,
            PaymentType::Online => SequenceCategory::Online,
            PaymentType::Split => SequenceCategory::Split,
        }
    }

    /// KOT tokens live in their own table; invoice scans must not look at
    /// them and vice versa.
    pub fn is_kot(&self) -> bool {
        matches!(self, SequenceCategory::Kot)
    }
}

impl std::fmt::Display for SequenceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Token Formatting / Parsing
// =============================================================================

/// Formats a token: `format_token("INVCL1", 1)` → `"INVCL1-00001"`.
pub fn format_token(prefix: &str, value: i64) -> String {
    format!("{}-{:0width$}", prefix, value, width = TOKEN_SUFFIX_WIDTH)
}

/// Parses the numeric suffix after the last `-`.
///
/// Returns `MalformedToken` when there is no `-` or the suffix is not a
/// number. Used when seeding a counter from legacy rows.
pub fn parse_suffix(token: &str) -> Result<i64, CoreError> {
    let suffix = token
        .rsplit('-')
        .next()
        .ok_or_else(|| CoreError::MalformedToken(token.to_string()))?;

    suffix
        .parse::<i64>()
        .map_err(|_| CoreError::MalformedToken(token.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(SequenceCategory::Cash.prefix(1), "INVCL1");
        assert_eq!(SequenceCategory::Online.prefix(2), "INVOL2");
        assert_eq!(SequenceCategory::Split.prefix(3), "INVSP3");
        assert_eq!(SequenceCategory::SplitCash.prefix(3), "INVSC3");
        assert_eq!(SequenceCategory::Default.prefix(7), "INV7");
        assert_eq!(SequenceCategory::Kot.prefix(3), "KOT3");
    }

    #[test]
    fn test_format_token() {
        assert_eq!(format_token("INVCL1", 1), "INVCL1-00001");
        assert_eq!(format_token("INVCL1", 42), "INVCL1-00042");
        // more than five digits: width grows, nothing truncates
        assert_eq!(format_token("KOT3", 123_456), "KOT3-123456");
    }

    #[test]
    fn test_parse_suffix() {
        assert_eq!(parse_suffix("INVCL1-00001").unwrap(), 1);
        assert_eq!(parse_suffix("INVCL1-00042").unwrap(), 42);
        // the suffix is after the LAST dash
        assert_eq!(parse_suffix("INV-CL-00007").unwrap(), 7);

        assert!(parse_suffix("INVCL1-").is_err());
        assert!(parse_suffix("INVCL1-abc").is_err());
    }

    #[test]
    fn test_payment_mapping() {
        assert_eq!(
            SequenceCategory::for_payment(PaymentType::Cash),
            SequenceCategory::Cash
        );
        assert_eq!(
            SequenceCategory::for_payment(PaymentType::Split),
            SequenceCategory::Split
        );
    }
}
