//! # Kind-Erased Status
//!
//! Storage rows, audit records, and the engine's request types carry a status
//! whose kind is only known at runtime. [`AnyStatus`] wraps the four typed
//! enums so those layers can still match exhaustively.

use fcrm_core::EntityKind;
use serde::{Deserialize, Serialize};

use crate::agreement::AgreementStatus;
use crate::edge::{LifecycleStatus, StatusClass};
use crate::lead::LeadStatus;
use crate::order::OrderStatus;
use crate::quote::QuoteStatus;

/// A status of any entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum AnyStatus {
    Lead(LeadStatus),
    Quote(QuoteStatus),
    Order(OrderStatus),
    Agreement(AgreementStatus),
}

impl AnyStatus {
    /// Entry status for `kind`.
    pub fn initial(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Lead => LeadStatus::INITIAL.into_any(),
            EntityKind::Quote => QuoteStatus::INITIAL.into_any(),
            EntityKind::Order => OrderStatus::INITIAL.into_any(),
            EntityKind::Agreement => AgreementStatus::INITIAL.into_any(),
        }
    }

    /// Parse a storage name in the context of `kind`.
    pub fn parse(kind: EntityKind, s: &str) -> Option<Self> {
        match kind {
            EntityKind::Lead => LeadStatus::parse(s).map(Self::Lead),
            EntityKind::Quote => QuoteStatus::parse(s).map(Self::Quote),
            EntityKind::Order => OrderStatus::parse(s).map(Self::Order),
            EntityKind::Agreement => AgreementStatus::parse(s).map(Self::Agreement),
        }
    }

    /// Every status of `kind`, in board column order.
    pub fn all(kind: EntityKind) -> Vec<Self> {
        match kind {
            EntityKind::Lead => LeadStatus::ALL.iter().map(|s| s.into_any()).collect(),
            EntityKind::Quote => QuoteStatus::ALL.iter().map(|s| s.into_any()).collect(),
            EntityKind::Order => OrderStatus::ALL.iter().map(|s| s.into_any()).collect(),
            EntityKind::Agreement => AgreementStatus::ALL.iter().map(|s| s.into_any()).collect(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Lead(_) => EntityKind::Lead,
            Self::Quote(_) => EntityKind::Quote,
            Self::Order(_) => EntityKind::Order,
            Self::Agreement(_) => EntityKind::Agreement,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead(s) => s.as_str(),
            Self::Quote(s) => s.as_str(),
            Self::Order(s) => s.as_str(),
            Self::Agreement(s) => s.as_str(),
        }
    }

    pub fn class(&self) -> StatusClass {
        match self {
            Self::Lead(s) => s.class(),
            Self::Quote(s) => s.class(),
            Self::Order(s) => s.class(),
            Self::Agreement(s) => s.class(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Lead(s) => s.is_terminal(),
            Self::Quote(s) => s.is_terminal(),
            Self::Order(s) => s.is_terminal(),
            Self::Agreement(s) => s.is_terminal(),
        }
    }

    /// Names of the statuses reachable in one step.
    pub fn successors(&self) -> Vec<&'static str> {
        fn names<S: LifecycleStatus>(s: S) -> Vec<&'static str> {
            s.edges_from().iter().map(|e| e.to.as_str()).collect()
        }
        match *self {
            Self::Lead(s) => names(s),
            Self::Quote(s) => names(s),
            Self::Order(s) => names(s),
            Self::Agreement(s) => names(s),
        }
    }
}

impl std::fmt::Display for AnyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LeadStatus> for AnyStatus {
    fn from(s: LeadStatus) -> Self {
        Self::Lead(s)
    }
}

impl From<QuoteStatus> for AnyStatus {
    fn from(s: QuoteStatus) -> Self {
        Self::Quote(s)
    }
}

impl From<OrderStatus> for AnyStatus {
    fn from(s: OrderStatus) -> Self {
        Self::Order(s)
    }
}

impl From<AgreementStatus> for AnyStatus {
    fn from(s: AgreementStatus) -> Self {
        Self::Agreement(s)
    }
}
