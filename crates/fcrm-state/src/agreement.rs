//! # Agreement Lifecycle
//!
//! ```text
//! draft ─▶ pending_signature ─▶ signed ─▶ active ─▶ expired
//!   ▲             │                         │  ▲
//!   └─────────────┘                         ▼  │ (reinstatement)
//!                                       suspended
//!                                           │
//!              active | suspended ─▶ terminated
//! ```
//!
//! `terminated` and `expired` are terminal; `suspended` is dormant and
//! reinstates into `active`.

use fcrm_core::EntityKind;
use serde::{Deserialize, Serialize};

use crate::edge::{
    edge, EdgeClass, LifecycleStatus, RequiredField, SideEffect, StatusClass, TransitionEdge,
};
use crate::reason::{AGREEMENT_SUSPENSION_REASONS, AGREEMENT_TERMINATION_REASONS};
use crate::status::AnyStatus;

/// Status of an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    /// Terms being drafted.
    Draft,
    /// Out for signature.
    PendingSignature,
    /// Signed by all parties, not yet in force.
    Signed,
    /// In force.
    Active,
    /// Temporarily not in force (dormant).
    Suspended,
    /// Ended early (terminal).
    Terminated,
    /// Ran to its end date (terminal).
    Expired,
}

const START_DATE: RequiredField = RequiredField::timestamp("start_date");
const SUSPENSION_REASON: RequiredField =
    RequiredField::one_of("suspension_reason", AGREEMENT_SUSPENSION_REASONS);
const TERMINATION_REASON: RequiredField =
    RequiredField::one_of("termination_reason", AGREEMENT_TERMINATION_REASONS);

const TO_PENDING_SIGNATURE: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::PendingSignature,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("sent_for_signature_at")],
);
const BACK_TO_DRAFT: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::Draft,
    EdgeClass::Retreat,
    &[],
    &[SideEffect::Clear("sent_for_signature_at")],
);
const TO_SIGNED: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::Signed,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("signed_at")],
);
const TO_ACTIVE: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::Active,
    EdgeClass::Advance,
    &[START_DATE],
    &[SideEffect::CopyPayload { from: "start_date", to: "start_date" }],
);
const TO_SUSPENDED: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::Suspended,
    EdgeClass::Close,
    &[SUSPENSION_REASON],
    &[
        SideEffect::StampNow("suspended_at"),
        SideEffect::CopyPayload { from: "suspension_reason", to: "suspension_reason" },
    ],
);
const REINSTATE: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::Active,
    EdgeClass::Reactivate,
    &[],
    &[
        SideEffect::Clear("suspended_at"),
        SideEffect::Clear("suspension_reason"),
        SideEffect::Increment("reactivation_count"),
    ],
);
const TO_TERMINATED: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::Terminated,
    EdgeClass::Close,
    &[TERMINATION_REASON],
    &[
        SideEffect::StampNow("terminated_at"),
        SideEffect::CopyPayload { from: "termination_reason", to: "termination_reason" },
    ],
);
const TO_EXPIRED: TransitionEdge<AgreementStatus> = edge(
    AgreementStatus::Expired,
    EdgeClass::Close,
    &[],
    &[SideEffect::StampNow("expired_at")],
);

const FROM_DRAFT: &[TransitionEdge<AgreementStatus>] = &[TO_PENDING_SIGNATURE];
const FROM_PENDING_SIGNATURE: &[TransitionEdge<AgreementStatus>] = &[TO_SIGNED, BACK_TO_DRAFT];
const FROM_SIGNED: &[TransitionEdge<AgreementStatus>] = &[TO_ACTIVE];
const FROM_ACTIVE: &[TransitionEdge<AgreementStatus>] = &[TO_SUSPENDED, TO_TERMINATED, TO_EXPIRED];
const FROM_SUSPENDED: &[TransitionEdge<AgreementStatus>] = &[REINSTATE, TO_TERMINATED];

impl LifecycleStatus for AgreementStatus {
    const KIND: EntityKind = EntityKind::Agreement;
    const INITIAL: Self = Self::Draft;
    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::PendingSignature,
        Self::Signed,
        Self::Active,
        Self::Suspended,
        Self::Terminated,
        Self::Expired,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingSignature => "pending_signature",
            Self::Signed => "signed",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
            Self::Expired => "expired",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    fn class(&self) -> StatusClass {
        match self {
            Self::Draft => StatusClass::Entry,
            Self::PendingSignature | Self::Signed | Self::Active => StatusClass::Open,
            Self::Suspended => StatusClass::Dormant,
            Self::Terminated | Self::Expired => StatusClass::Terminal,
        }
    }

    fn edges_from(&self) -> &'static [TransitionEdge<Self>] {
        match self {
            Self::Draft => FROM_DRAFT,
            Self::PendingSignature => FROM_PENDING_SIGNATURE,
            Self::Signed => FROM_SIGNED,
            Self::Active => FROM_ACTIVE,
            Self::Suspended => FROM_SUSPENDED,
            Self::Terminated => &[],
            Self::Expired => &[],
        }
    }

    fn into_any(self) -> AnyStatus {
        AnyStatus::Agreement(self)
    }

    fn from_any(any: AnyStatus) -> Option<Self> {
        match any {
            AnyStatus::Agreement(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
