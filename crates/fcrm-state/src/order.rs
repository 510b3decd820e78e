//! # Order Lifecycle
//!
//! ```text
//! pending ─▶ confirmed ─▶ in_production ─▶ ready_for_delivery ─▶ delivered ─▶ completed
//!    │           │              │  ▲                 │
//!    └───────────┴──────────────┤  └─────────────────┘ (delivery slot fell through)
//!                               ▼
//!                           cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Orders cannot be cancelled once
//! ready for delivery. Scheduling delivery requires a future `delivery_date`.

use fcrm_core::EntityKind;
use serde::{Deserialize, Serialize};

use crate::edge::{
    edge, EdgeClass, LifecycleStatus, RequiredField, SideEffect, StatusClass, TransitionEdge,
};
use crate::reason::ORDER_CANCELLATION_REASONS;
use crate::status::AnyStatus;

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting confirmation.
    Pending,
    /// Confirmed with the customer.
    Confirmed,
    /// Vehicles being prepared.
    InProduction,
    /// Delivery scheduled.
    ReadyForDelivery,
    /// Handed over.
    Delivered,
    /// Closed out (terminal).
    Completed,
    /// Cancelled before delivery (terminal).
    Cancelled,
}

const DELIVERY_DATE: RequiredField = RequiredField::future("delivery_date");
const CANCELLATION_REASON: RequiredField =
    RequiredField::one_of("cancellation_reason", ORDER_CANCELLATION_REASONS);

const TO_CONFIRMED: TransitionEdge<OrderStatus> = edge(
    OrderStatus::Confirmed,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("confirmed_at")],
);
const TO_IN_PRODUCTION: TransitionEdge<OrderStatus> = edge(
    OrderStatus::InProduction,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("production_started_at")],
);
const BACK_TO_PRODUCTION: TransitionEdge<OrderStatus> = edge(
    OrderStatus::InProduction,
    EdgeClass::Retreat,
    &[],
    &[SideEffect::Clear("delivery_scheduled_for")],
);
const TO_READY: TransitionEdge<OrderStatus> = edge(
    OrderStatus::ReadyForDelivery,
    EdgeClass::Advance,
    &[DELIVERY_DATE],
    &[SideEffect::CopyPayload { from: "delivery_date", to: "delivery_scheduled_for" }],
);
const TO_DELIVERED: TransitionEdge<OrderStatus> = edge(
    OrderStatus::Delivered,
    EdgeClass::Advance,
    &[],
    &[SideEffect::StampNow("delivered_at")],
);
const TO_COMPLETED: TransitionEdge<OrderStatus> = edge(
    OrderStatus::Completed,
    EdgeClass::Close,
    &[],
    &[SideEffect::StampNow("completed_at")],
);
const TO_CANCELLED: TransitionEdge<OrderStatus> = edge(
    OrderStatus::Cancelled,
    EdgeClass::Close,
    &[CANCELLATION_REASON],
    &[
        SideEffect::StampNow("cancelled_at"),
        SideEffect::CopyPayload { from: "cancellation_reason", to: "cancellation_reason" },
    ],
);

const FROM_PENDING: &[TransitionEdge<OrderStatus>] = &[TO_CONFIRMED, TO_CANCELLED];
const FROM_CONFIRMED: &[TransitionEdge<OrderStatus>] = &[TO_IN_PRODUCTION, TO_CANCELLED];
const FROM_IN_PRODUCTION: &[TransitionEdge<OrderStatus>] = &[TO_READY, TO_CANCELLED];
const FROM_READY: &[TransitionEdge<OrderStatus>] = &[TO_DELIVERED, BACK_TO_PRODUCTION];
const FROM_DELIVERED: &[TransitionEdge<OrderStatus>] = &[TO_COMPLETED];

impl LifecycleStatus for OrderStatus {
    const KIND: EntityKind = EntityKind::Order;
    const INITIAL: Self = Self::Pending;
    const ALL: &'static [Self] = &[
        Self::Pending,
        Self::Confirmed,
        Self::InProduction,
        Self::ReadyForDelivery,
        Self::Delivered,
        Self::Completed,
        Self::Cancelled,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProduction => "in_production",
            Self::ReadyForDelivery => "ready_for_delivery",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    fn class(&self) -> StatusClass {
        match self {
            Self::Pending => StatusClass::Entry,
            Self::Confirmed | Self::InProduction | Self::ReadyForDelivery | Self::Delivered => {
                StatusClass::Open
            }
            Self::Completed | Self::Cancelled => StatusClass::Terminal,
        }
    }

    fn edges_from(&self) -> &'static [TransitionEdge<Self>] {
        match self {
            Self::Pending => FROM_PENDING,
            Self::Confirmed => FROM_CONFIRMED,
            Self::InProduction => FROM_IN_PRODUCTION,
            Self::ReadyForDelivery => FROM_READY,
            Self::Delivered => FROM_DELIVERED,
            Self::Completed => &[],
            Self::Cancelled => &[],
        }
    }

    fn into_any(self) -> AnyStatus {
        AnyStatus::Order(self)
    }

    fn from_any(any: AnyStatus) -> Option<Self> {
        match any {
            AnyStatus::Order(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
