//! # Quote Lifecycle
//!
//! ```text
//! draft ─▶ sent ─▶ viewed ─▶ accepted ─▶ converted
//!           │        │
//!           └────────┴─▶ rejected | expired
//! expired ─▶ sent | draft   (reactivation: reissue or rework)
//! ```
//!
//! `rejected` and `converted` are terminal; `expired` is dormant. Sending
//! (and re-sending) requires a `valid_until` date in the future.

use fcrm_core::EntityKind;
use serde::{Deserialize, Serialize};

use crate::edge::{
    edge, EdgeClass, LifecycleStatus, RequiredField, SideEffect, StatusClass, TransitionEdge,
};
use crate::reason::QUOTE_REJECTION_REASONS;
use crate::status::AnyStatus;

/// Status of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    /// Being prepared.
    Draft,
    /// Sent to the customer.
    Sent,
    /// Opened by the customer.
    Viewed,
    /// Accepted by the customer.
    Accepted,
    /// Declined by the customer (terminal).
    Rejected,
    /// Validity window lapsed (dormant).
    Expired,
    /// Turned into an order (terminal).
    Converted,
}

const VALID_UNTIL: RequiredField = RequiredField::future("valid_until");
const REJECTION_REASON: RequiredField =
    RequiredField::one_of("rejection_reason", QUOTE_REJECTION_REASONS);

const COPY_VALID_UNTIL: SideEffect = SideEffect::CopyPayload {
    from: "valid_until",
    to: "valid_until",
};

const TO_SENT: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Sent,
    EdgeClass::Advance,
    &[VALID_UNTIL],
    &[SideEffect::StampNow("sent_at"), COPY_VALID_UNTIL],
);
const TO_VIEWED: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Viewed,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("viewed_at")],
);
const TO_ACCEPTED: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Accepted,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("accepted_at")],
);
const TO_REJECTED: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Rejected,
    EdgeClass::Close,
    &[REJECTION_REASON],
    &[
        SideEffect::StampNow("rejected_at"),
        SideEffect::CopyPayload { from: "rejection_reason", to: "rejection_reason" },
    ],
);
const TO_EXPIRED: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Expired,
    EdgeClass::Close,
    &[],
    &[SideEffect::StampNow("expired_at")],
);
const TO_CONVERTED: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Converted,
    EdgeClass::Close,
    &[],
    &[SideEffect::StampNow("converted_at")],
);
const REISSUE: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Sent,
    EdgeClass::Reactivate,
    &[VALID_UNTIL],
    &[
        SideEffect::StampNow("sent_at"),
        COPY_VALID_UNTIL,
        SideEffect::Clear("expired_at"),
        SideEffect::Increment("reissue_count"),
    ],
);
const REWORK: TransitionEdge<QuoteStatus> = edge(
    QuoteStatus::Draft,
    EdgeClass::Reactivate,
    &[],
    &[SideEffect::Clear("expired_at"), SideEffect::Clear("valid_until")],
);

const FROM_DRAFT: &[TransitionEdge<QuoteStatus>] = &[TO_SENT];
const FROM_SENT: &[TransitionEdge<QuoteStatus>] = &[TO_VIEWED, TO_ACCEPTED, TO_REJECTED, TO_EXPIRED];
const FROM_VIEWED: &[TransitionEdge<QuoteStatus>] = &[TO_ACCEPTED, TO_REJECTED, TO_EXPIRED];
const FROM_ACCEPTED: &[TransitionEdge<QuoteStatus>] = &[TO_CONVERTED];
const FROM_EXPIRED: &[TransitionEdge<QuoteStatus>] = &[REISSUE, REWORK];

impl LifecycleStatus for QuoteStatus {
    const KIND: EntityKind = EntityKind::Quote;
    const INITIAL: Self = Self::Draft;
    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::Sent,
        Self::Viewed,
        Self::Accepted,
        Self::Rejected,
        Self::Expired,
        Self::Converted,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Converted => "converted",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    fn class(&self) -> StatusClass {
        match self {
            Self::Draft => StatusClass::Entry,
            Self::Sent | Self::Viewed | Self::Accepted => StatusClass::Open,
            Self::Expired => StatusClass::Dormant,
            Self::Rejected | Self::Converted => StatusClass::Terminal,
        }
    }

    fn edges_from(&self) -> &'static [TransitionEdge<Self>] {
        match self {
            Self::Draft => FROM_DRAFT,
            Self::Sent => FROM_SENT,
            Self::Viewed => FROM_VIEWED,
            Self::Accepted => FROM_ACCEPTED,
            Self::Rejected => &[],
            Self::Expired => FROM_EXPIRED,
            Self::Converted => &[],
        }
    }

    fn into_any(self) -> AnyStatus {
        AnyStatus::Quote(self)
    }

    fn from_any(any: AnyStatus) -> Option<Self> {
        match any {
            AnyStatus::Quote(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sending_requires_valid_until() {
        let e = QuoteStatus::Draft.edge_to(QuoteStatus::Sent).unwrap();
        assert_eq!(e.required, &[VALID_UNTIL]);
    }

    #[test]
    fn test_cannot_skip_to_accepted_from_draft() {
        assert!(QuoteStatus::Draft.edge_to(QuoteStatus::Accepted).is_none());
    }

    #[test]
    fn test_expired_reactivates() {
        for to in [QuoteStatus::Sent, QuoteStatus::Draft] {
            assert_eq!(
                QuoteStatus::Expired.edge_to(to).unwrap().class,
                EdgeClass::Reactivate
            );
        }
    }

    #[test]
    fn test_rejected_and_converted_are_terminal() {
        assert!(QuoteStatus::Rejected.is_terminal());
        assert!(QuoteStatus::Converted.is_terminal());
    }
}
