//! # Engine Errors
//!
//! [`StoreError`] is what a persistence backend reports. [`LifecycleError`]
//! is the typed boundary every engine operation returns: callers match on it
//! to decide between prompting the user, refreshing, or retrying.

use fcrm_core::{EntityId, EntityKind};
use fcrm_sequence::SequenceScope;
use fcrm_state::{AnyStatus, FieldProblem, Rejection};
use thiserror::Error;

/// Failure inside a store transaction.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An insert collided with a unique index.
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    /// A compare-and-set on the status column found a different status.
    #[error("entity {entity_id} is {actual}, expected {expected}")]
    StaleStatus {
        entity_id: EntityId,
        expected: AnyStatus,
        actual: AnyStatus,
    },

    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// A stored row could not be mapped back to engine types.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Error returned by every engine operation.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Every create attempt for the scope lost a code race, or the scope's
    /// counter is exhausted. Safe to retry later.
    #[error("could not issue a reference code in {scope} after {attempts} attempt(s)")]
    SequenceExhaustedOrContended { scope: SequenceScope, attempts: u32 },

    #[error("cannot move {kind} from {from} to {to}")]
    InvalidTransition {
        kind: EntityKind,
        from: String,
        to: String,
    },

    #[error("required field {field} is {problem}")]
    MissingRequiredField { field: String, problem: FieldProblem },

    /// The entity moved since the caller last read it.
    #[error("entity {entity_id} changed concurrently: expected {expected}, found {actual}")]
    ConcurrentStatusChange {
        entity_id: EntityId,
        expected: AnyStatus,
        actual: AnyStatus,
    },

    #[error("entity {0} not found")]
    NotFound(EntityId),

    #[error("{kind} has no status {status:?}")]
    UnknownStatus { kind: EntityKind, status: String },

    #[error(transparent)]
    Store(StoreError),
}

impl LifecycleError {
    /// Stable machine-readable code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::SequenceExhaustedOrContended { .. } => "sequence_exhausted_or_contended",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::MissingRequiredField { .. } => "missing_required_field",
            Self::ConcurrentStatusChange { .. } => "concurrent_status_change",
            Self::NotFound(_) => "not_found",
            Self::UnknownStatus { .. } => "unknown_status",
            Self::Store(_) => "store",
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SequenceExhaustedOrContended { .. } | Self::ConcurrentStatusChange { .. }
        )
    }
}

impl From<Rejection> for LifecycleError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::InvalidTransition { kind, from, to } => {
                Self::InvalidTransition { kind, from, to }
            }
            Rejection::MissingRequiredField { field, problem } => {
                Self::MissingRequiredField { field, problem }
            }
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StaleStatus { entity_id, expected, actual } => {
                Self::ConcurrentStatusChange { entity_id, expected, actual }
            }
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}
