//! # Lead Lifecycle
//!
//! ## States
//!
//! ```text
//! new ─▶ email_verified ─▶ callback_requested ─▶ demo ─▶ proposal_sent ─▶ payment_pending ─▶ converted
//!
//! open statuses ─▶ lost | nurturing | disqualified
//! lost ─▶ nurturing                      (reactivation)
//! nurturing ─▶ callback_requested | demo (reactivation)
//! ```
//!
//! `converted` and `disqualified` are terminal. `lost` is dormant: its only
//! exit is the reactivation edge into `nurturing`, which in turn can
//! reactivate into `callback_requested` or `demo`.
//!
//! Keeping `disqualified` terminal is provisional. It has no reactivation
//! edge until product confirms whether a disqualified lead may be revived.
//!
//! ## Required fields
//!
//! - `demo` needs `demo_date`, strictly in the future.
//! - `lost` needs `loss_reason` from [`LOSS_REASONS`].
//! - `nurturing` needs `nurturing_reason` from [`NURTURING_REASONS`].
//! - `disqualified` needs `disqualification_reason` from [`DISQUALIFICATION_REASONS`].

use fcrm_core::EntityKind;
use serde::{Deserialize, Serialize};

use crate::edge::{
    edge, EdgeClass, LifecycleStatus, RequiredField, SideEffect, StatusClass, TransitionEdge,
};
use crate::reason::{DISQUALIFICATION_REASONS, LOSS_REASONS, NURTURING_REASONS};
use crate::status::AnyStatus;

/// Status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Just captured.
    New,
    /// Contact email confirmed.
    EmailVerified,
    /// Prospect asked to be called back.
    CallbackRequested,
    /// Demo scheduled.
    Demo,
    /// Proposal sent.
    ProposalSent,
    /// Awaiting first payment.
    PaymentPending,
    /// Became a customer (terminal).
    Converted,
    /// Lost to price, competitor, silence, ... (dormant).
    Lost,
    /// Parked for later follow-up (dormant).
    Nurturing,
    /// Not a valid prospect (terminal).
    Disqualified,
}

// ─── Fields and edges ────────────────────────────────────────────────

const DEMO_DATE: RequiredField = RequiredField::future("demo_date");
const LOSS_REASON: RequiredField = RequiredField::one_of("loss_reason", LOSS_REASONS);
const NURTURING_REASON: RequiredField = RequiredField::one_of("nurturing_reason", NURTURING_REASONS);
const DISQUALIFICATION_REASON: RequiredField =
    RequiredField::one_of("disqualification_reason", DISQUALIFICATION_REASONS);

const COPY_DEMO_DATE: SideEffect = SideEffect::CopyPayload {
    from: "demo_date",
    to: "demo_scheduled_for",
};
const REACTIVATION_COUNT: SideEffect = SideEffect::Increment("reactivation_count");

const TO_EMAIL_VERIFIED: TransitionEdge<LeadStatus> = edge(
    LeadStatus::EmailVerified,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("email_verified_at")],
);
const TO_CALLBACK: TransitionEdge<LeadStatus> = edge(
    LeadStatus::CallbackRequested,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("callback_requested_at")],
);
const BACK_TO_CALLBACK: TransitionEdge<LeadStatus> = edge(
    LeadStatus::CallbackRequested,
    EdgeClass::Retreat,
    &[],
    &[SideEffect::StampNow("callback_requested_at")],
);
const TO_DEMO: TransitionEdge<LeadStatus> =
    edge(LeadStatus::Demo, EdgeClass::Advance, &[DEMO_DATE], &[COPY_DEMO_DATE]);
const BACK_TO_DEMO: TransitionEdge<LeadStatus> =
    edge(LeadStatus::Demo, EdgeClass::Retreat, &[DEMO_DATE], &[COPY_DEMO_DATE]);
const TO_PROPOSAL: TransitionEdge<LeadStatus> = edge(
    LeadStatus::ProposalSent,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("proposal_sent_at")],
);
const BACK_TO_PROPOSAL: TransitionEdge<LeadStatus> =
    edge(LeadStatus::ProposalSent, EdgeClass::Retreat, &[], &[]);
const TO_PAYMENT_PENDING: TransitionEdge<LeadStatus> = edge(
    LeadStatus::PaymentPending,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("payment_requested_at")],
);
const TO_CONVERTED: TransitionEdge<LeadStatus> = edge(
    LeadStatus::Converted,
    EdgeClass::Close,
    &[],
    &[SideEffect::StampNow("converted_at")],
);
const TO_LOST: TransitionEdge<LeadStatus> = edge(
    LeadStatus::Lost,
    EdgeClass::Close,
    &[LOSS_REASON],
    &[
        SideEffect::StampNow("lost_date"),
        SideEffect::CopyPayload { from: "loss_reason", to: "loss_reason" },
    ],
);
const TO_NURTURING: TransitionEdge<LeadStatus> = edge(
    LeadStatus::Nurturing,
    EdgeClass::Close,
    &[NURTURING_REASON],
    &[SideEffect::CopyPayload { from: "nurturing_reason", to: "nurturing_reason" }],
);
const TO_DISQUALIFIED: TransitionEdge<LeadStatus> = edge(
    LeadStatus::Disqualified,
    EdgeClass::Close,
    &[DISQUALIFICATION_REASON],
    &[
        SideEffect::StampNow("disqualified_at"),
        SideEffect::CopyPayload {
            from: "disqualification_reason",
            to: "disqualification_reason",
        },
    ],
);
const REACTIVATE_TO_NURTURING: TransitionEdge<LeadStatus> = edge(
    LeadStatus::Nurturing,
    EdgeClass::Reactivate,
    &[NURTURING_REASON],
    &[
        SideEffect::CopyPayload { from: "nurturing_reason", to: "nurturing_reason" },
        SideEffect::Clear("lost_date"),
        REACTIVATION_COUNT,
    ],
);
const REACTIVATE_TO_CALLBACK: TransitionEdge<LeadStatus> = edge(
    LeadStatus::CallbackRequested,
    EdgeClass::Reactivate,
    &[],
    &[SideEffect::StampNow("callback_requested_at"), REACTIVATION_COUNT],
);
const REACTIVATE_TO_DEMO: TransitionEdge<LeadStatus> = edge(
    LeadStatus::Demo,
    EdgeClass::Reactivate,
    &[DEMO_DATE],
    &[COPY_DEMO_DATE, REACTIVATION_COUNT],
);

const FROM_NEW: &[TransitionEdge<LeadStatus>] = &[
    TO_EMAIL_VERIFIED,
    TO_CALLBACK,
    TO_DEMO,
    TO_LOST,
    TO_DISQUALIFIED,
    TO_NURTURING,
];
const FROM_EMAIL_VERIFIED: &[TransitionEdge<LeadStatus>] = &[
    TO_CALLBACK,
    TO_DEMO,
    TO_PROPOSAL,
    TO_LOST,
    TO_DISQUALIFIED,
    TO_NURTURING,
];
const FROM_CALLBACK_REQUESTED: &[TransitionEdge<LeadStatus>] = &[
    TO_DEMO,
    TO_PROPOSAL,
    TO_LOST,
    TO_DISQUALIFIED,
    TO_NURTURING,
];
const FROM_DEMO: &[TransitionEdge<LeadStatus>] = &[
    TO_PROPOSAL,
    BACK_TO_CALLBACK,
    TO_LOST,
    TO_NURTURING,
    TO_DISQUALIFIED,
];
const FROM_PROPOSAL_SENT: &[TransitionEdge<LeadStatus>] = &[
    TO_PAYMENT_PENDING,
    BACK_TO_DEMO,
    BACK_TO_CALLBACK,
    TO_LOST,
    TO_NURTURING,
];
const FROM_PAYMENT_PENDING: &[TransitionEdge<LeadStatus>] =
    &[TO_CONVERTED, BACK_TO_PROPOSAL, TO_LOST];
const FROM_LOST: &[TransitionEdge<LeadStatus>] = &[REACTIVATE_TO_NURTURING];
const FROM_NURTURING: &[TransitionEdge<LeadStatus>] = &[
    REACTIVATE_TO_CALLBACK,
    REACTIVATE_TO_DEMO,
    TO_LOST,
    TO_DISQUALIFIED,
];

impl LifecycleStatus for LeadStatus {
    const KIND: EntityKind = EntityKind::Lead;
    const INITIAL: Self = Self::New;
    const ALL: &'static [Self] = &[
        Self::New,
        Self::EmailVerified,
        Self::CallbackRequested,
        Self::Demo,
        Self::ProposalSent,
        Self::PaymentPending,
        Self::Converted,
        Self::Lost,
        Self::Nurturing,
        Self::Disqualified,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::EmailVerified => "email_verified",
            Self::CallbackRequested => "callback_requested",
            Self::Demo => "demo",
            Self::ProposalSent => "proposal_sent",
            Self::PaymentPending => "payment_pending",
            Self::Converted => "converted",
            Self::Lost => "lost",
            Self::Nurturing => "nurturing",
            Self::Disqualified => "disqualified",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    fn class(&self) -> StatusClass {
        match self {
            Self::New => StatusClass::Entry,
            Self::EmailVerified
            | Self::CallbackRequested
            | Self::Demo
            | Self::ProposalSent
            | Self::PaymentPending => StatusClass::Open,
            Self::Lost | Self::Nurturing => StatusClass::Dormant,
            Self::Converted | Self::Disqualified => StatusClass::Terminal,
        }
    }

    fn edges_from(&self) -> &'static [TransitionEdge<Self>] {
        match self {
            Self::New => FROM_NEW,
            Self::EmailVerified => FROM_EMAIL_VERIFIED,
            Self::CallbackRequested => FROM_CALLBACK_REQUESTED,
            Self::Demo => FROM_DEMO,
            Self::ProposalSent => FROM_PROPOSAL_SENT,
            Self::PaymentPending => FROM_PAYMENT_PENDING,
            Self::Converted => &[],
            Self::Lost => FROM_LOST,
            Self::Nurturing => FROM_NURTURING,
            Self::Disqualified => &[],
        }
    }

    fn into_any(self) -> AnyStatus {
        AnyStatus::Lead(self)
    }

    fn from_any(any: AnyStatus) -> Option<Self> {
        match any {
            AnyStatus::Lead(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
