//! # Entity Kind: Single Source of Truth
//!
//! The closed set of business record kinds the lifecycle engine governs.
//! Every `match` on `EntityKind` is exhaustive: adding a kind forces its
//! code format, transition table, and storage mapping to be written.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Kind of business record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Prospective customer moving through the sales pipeline.
    Lead,
    /// Priced offer sent to a customer.
    Quote,
    /// Confirmed order for vehicles or services.
    Order,
    /// Signed service or rental agreement.
    Agreement,
}

impl EntityKind {
    /// All kinds in canonical order.
    pub fn all() -> &'static [EntityKind] {
        &[Self::Lead, Self::Quote, Self::Order, Self::Agreement]
    }

    /// The snake_case identifier, matching the serde representation and the
    /// `kind` column in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Quote => "quote",
            Self::Order => "order",
            Self::Agreement => "agreement",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(Self::Lead),
            "quote" => Ok(Self::Quote),
            "order" => Ok(Self::Order),
            "agreement" => Ok(Self::Agreement),
            other => Err(CoreError::Validation(format!("unknown entity kind: {other:?}"))),
        }
    }
}
