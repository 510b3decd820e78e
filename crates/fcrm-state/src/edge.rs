//! # Transition Edges
//!
//! The vocabulary every per-kind transition table is written in.
//!
//! A table is an exhaustive `match` over the source status returning a
//! static slice of [`TransitionEdge`]s. Each edge names its target, how it
//! is classified, which payload fields must accompany it, and which derived
//! writes it causes. The validator walks these tables; it has no per-kind
//! logic of its own.

use fcrm_core::EntityKind;
use serde::Serialize;

use crate::status::AnyStatus;

// ─── Classifications ─────────────────────────────────────────────────

/// How an edge moves a record through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeClass {
    /// Forward progress through the open pipeline.
    Advance,
    /// Step back to an earlier open status.
    Retreat,
    /// Into a closed status (terminal or dormant).
    Close,
    /// Out of a dormant status back into the pipeline.
    Reactivate,
}

/// Position of a status in its lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// The unique status every new record starts in.
    Entry,
    /// Working status with forward edges.
    Open,
    /// Closed, but reachable again through modeled reactivation edges.
    Dormant,
    /// No outbound edges.
    Terminal,
}

// ─── Required fields ─────────────────────────────────────────────────

/// Validation applied to a required payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// RFC 3339 timestamp strictly after the moment of submission.
    FutureTimestamp,
    /// Any RFC 3339 timestamp.
    Timestamp,
    /// One code out of a fixed closed set.
    OneOf(&'static [&'static str]),
    /// Non-blank free text.
    NonEmptyText,
}

/// A payload key an edge cannot be taken without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredField {
    /// Payload key.
    pub key: &'static str,
    /// Rule the value must satisfy.
    pub rule: FieldRule,
}

impl RequiredField {
    /// A timestamp that must lie in the future.
    pub const fn future(key: &'static str) -> Self {
        Self { key, rule: FieldRule::FutureTimestamp }
    }

    /// Any valid timestamp.
    pub const fn timestamp(key: &'static str) -> Self {
        Self { key, rule: FieldRule::Timestamp }
    }

    /// A reason code from `codes`.
    pub const fn one_of(key: &'static str, codes: &'static [&'static str]) -> Self {
        Self { key, rule: FieldRule::OneOf(codes) }
    }

    /// Free text that must not be blank.
    pub const fn text(key: &'static str) -> Self {
        Self { key, rule: FieldRule::NonEmptyText }
    }
}

// ─── Side effects ────────────────────────────────────────────────────

/// A derived write the validator emits alongside an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Set the column to the transition time.
    StampNow(&'static str),
    /// Copy a validated payload field into a column.
    CopyPayload {
        /// Payload key.
        from: &'static str,
        /// Target column.
        to: &'static str,
    },
    /// Add one to a counter column (missing counts as zero).
    Increment(&'static str),
    /// Remove the column.
    Clear(&'static str),
}

// ─── Edges ───────────────────────────────────────────────────────────

/// One legal `(from, to)` move. The source status is the table row it sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEdge<S: 'static> {
    /// Target status.
    pub to: S,
    /// Classification.
    pub class: EdgeClass,
    /// Payload fields that must be present and valid.
    pub required: &'static [RequiredField],
    /// Derived writes, applied atomically with the status change.
    pub effects: &'static [SideEffect],
}

/// Build an edge in a `const` table.
pub const fn edge<S>(
    to: S,
    class: EdgeClass,
    required: &'static [RequiredField],
    effects: &'static [SideEffect],
) -> TransitionEdge<S> {
    TransitionEdge { to, class, required, effects }
}

// ─── Lifecycle status trait ──────────────────────────────────────────

/// A per-kind closed status enum with its transition table.
///
/// Implemented by `LeadStatus`, `QuoteStatus`, `OrderStatus`, and
/// `AgreementStatus`. The validation algorithm is written once against this
/// trait.
pub trait LifecycleStatus:
    Copy + Eq + std::hash::Hash + std::fmt::Debug + std::fmt::Display + Send + Sync + 'static
{
    /// Kind of record this status belongs to.
    const KIND: EntityKind;
    /// Entry status for newly created records.
    const INITIAL: Self;
    /// Every status, in board column order.
    const ALL: &'static [Self];

    /// Storage and wire name (snake_case).
    fn as_str(&self) -> &'static str;

    /// Parse a storage/wire name.
    fn parse(s: &str) -> Option<Self>;

    /// Lifecycle position.
    fn class(&self) -> StatusClass;

    /// Outbound edges. Empty exactly for terminal statuses.
    fn edges_from(&self) -> &'static [TransitionEdge<Self>];

    /// Wrap into the kind-erased status.
    fn into_any(self) -> AnyStatus;

    /// Unwrap a kind-erased status of this kind.
    fn from_any(any: AnyStatus) -> Option<Self>;

    /// The edge from `self` to `to`, if one is modeled.
    fn edge_to(&self, to: Self) -> Option<&'static TransitionEdge<Self>> {
        self.edges_from().iter().find(|e| e.to == to)
    }

    /// Whether no edge leaves this status.
    fn is_terminal(&self) -> bool {
        self.edges_from().is_empty()
    }
}
