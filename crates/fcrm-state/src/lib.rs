//! # fcrm-state: Entity Lifecycle State Machines
//!
//! Governs how a business record may move between statuses, and how an
//! interactive board applies those moves optimistically.
//!
//! ## Transition tables
//!
//! - **Lead** (`lead.rs`): `new → … → converted`, with `lost`, `nurturing`,
//!   and `disqualified` exits and modeled reactivation edges.
//! - **Quote** (`quote.rs`): `draft → sent → viewed → accepted → converted`;
//!   an expired quote can be reissued.
//! - **Order** (`order.rs`): `pending → … → completed`; cancellable until it
//!   is ready for delivery.
//! - **Agreement** (`agreement.rs`): `draft → pending_signature → signed →
//!   active`, with suspension and reinstatement.
//!
//! Each table is an exhaustive `match` over a closed status enum returning
//! static [`TransitionEdge`] slices (`edge.rs`). Adding a status is a compile
//! error until every table and consumer handles it.
//!
//! ## Validation
//!
//! [`validate`] (`validator.rs`) is written once against [`LifecycleStatus`]:
//! edge lookup, required-field check, derived-field computation. Rejections
//! are typed ([`Rejection`]) and name the offending field.
//!
//! ## Board reconciliation
//!
//! [`Reconciler`] (`reconciler.rs`) holds a card in `Speculative` while its
//! move is unconfirmed and restores the pre-drag snapshot on rejection or
//! abandonment.
//!
//! ## History
//!
//! [`TransitionRecord`] and status-span reconstruction with SLA checks
//! (`history.rs`).

pub mod agreement;
pub mod edge;
pub mod history;
pub mod lead;
pub mod order;
pub mod payload;
pub mod quote;
pub mod reason;
pub mod reconciler;
pub mod status;
pub mod validator;

// ─── Tables ─────────────────────────────────────────────────────────

pub use agreement::AgreementStatus;
pub use edge::{
    EdgeClass, FieldRule, LifecycleStatus, RequiredField, SideEffect, StatusClass, TransitionEdge,
};
pub use lead::LeadStatus;
pub use order::OrderStatus;
pub use quote::QuoteStatus;
pub use status::AnyStatus;

// ─── Validation ─────────────────────────────────────────────────────

pub use payload::{DerivedFields, DerivedValue, TransitionPayload, REASON_DETAIL_KEY, STAGE_ENTERED_AT};
pub use validator::{absent_fields, validate, validate_any, Accepted, FieldProblem, Rejection};

// ─── Reconciler ─────────────────────────────────────────────────────

pub use reconciler::{
    Awaiting, Board, BoardCard, CommitRequest, DragOutcome, Phase, ReconcileError, Reconciler,
    ReorderRequest, SpeculativeTransition,
};

// ─── History ────────────────────────────────────────────────────────

pub use history::{
    reconstruct, violations, SlaRule, SlaViolation, StatusSpan, TransitionRecord, MAX_SLA_HOURS,
};
