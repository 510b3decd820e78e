//! Closed reason-code sets accepted by `OneOf` required fields.

/// Why a lead was lost.
pub const LOSS_REASONS: &[&str] = &[
    "price",
    "competitor",
    "no_budget",
    "no_response",
    "timing",
    "not_a_fit",
    "other",
];

/// Why a lead was parked in nurturing.
pub const NURTURING_REASONS: &[&str] = &[
    "not_ready",
    "budget_next_quarter",
    "fleet_renewal_pending",
    "reactivation",
    "other",
];

/// Why a lead was disqualified.
pub const DISQUALIFICATION_REASONS: &[&str] = &[
    "spam",
    "duplicate",
    "out_of_territory",
    "not_a_business",
    "other",
];

/// Why a customer rejected a quote.
pub const QUOTE_REJECTION_REASONS: &[&str] = &["price", "scope", "competitor", "timing", "other"];

/// Why an order was cancelled.
pub const ORDER_CANCELLATION_REASONS: &[&str] = &[
    "customer_request",
    "payment_failed",
    "vehicle_unavailable",
    "duplicate",
    "other",
];

/// Why an agreement was suspended.
pub const AGREEMENT_SUSPENSION_REASONS: &[&str] = &[
    "payment_overdue",
    "compliance_review",
    "customer_request",
    "other",
];

/// Why an agreement was terminated.
pub const AGREEMENT_TERMINATION_REASONS: &[&str] = &[
    "breach",
    "non_payment",
    "customer_request",
    "mutual",
    "other",
];
