//! # Reference Codes
//!
//! A `ReferenceCode` is the formatted, human-readable identifier stamped on a
//! record at creation. It is immutable once assigned and never reused, even
//! after the owning record is soft-deleted.
//!
//! Values read back from storage are wrapped as-is: legacy rows may carry
//! malformed tails, and the allocator, not this type, decides how to recover.

use serde::{Deserialize, Serialize};

use crate::scope::SEPARATOR;

/// Formatted reference code, e.g. `LEAD-2025-00001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceCode(String);

impl ReferenceCode {
    /// Wrap a code string. No validation is performed.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final separator-delimited segment (the numeric tail when well formed).
    pub fn tail(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or("")
    }

    /// Key that orders codes of one prefix by sequence number.
    ///
    /// Plain string order breaks once the tail outgrows its padding
    /// (`"…-99999" > "…-100000"`); ordering by length first does not.
    pub fn sequence_order_key(&self) -> (usize, &str) {
        (self.0.len(), self.0.as_str())
    }

    /// Consume into the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ReferenceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReferenceCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
