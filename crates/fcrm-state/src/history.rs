//! # Status History and SLA Checks
//!
//! Every accepted, non-no-op transition appends one immutable
//! [`TransitionRecord`]. Records survive soft deletion and are never edited.
//!
//! Creation writes no record: the first span starts at the entity's
//! `created_at` in its kind's entry status, and each record closes the
//! current span and opens the next.

use chrono::Duration;
use fcrm_core::{ActorId, EntityId, EntityKind, Timestamp};
use serde::{Deserialize, Serialize};

use crate::lead::LeadStatus;
use crate::status::AnyStatus;

/// Audit entry for one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub from_status: AnyStatus,
    pub to_status: AnyStatus,
    pub occurred_at: Timestamp,
    /// `None` for system-initiated changes.
    pub actor_id: Option<ActorId>,
    pub reason_detail: Option<String>,
}

/// A period an entity spent in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSpan {
    pub status: AnyStatus,
    pub entered_at: Timestamp,
    /// `None` while the entity is still in this status.
    pub left_at: Option<Timestamp>,
}

impl StatusSpan {
    /// Time spent in the status, measured up to `now` for the open span.
    pub fn dwell(&self, now: Timestamp) -> Duration {
        self.left_at.unwrap_or(now).since(&self.entered_at)
    }

    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Rebuild the status timeline from the creation time and the audit log.
///
/// Records are ordered by `occurred_at` (stable for ties) before replay.
pub fn reconstruct(
    created_at: Timestamp,
    initial: AnyStatus,
    records: &[TransitionRecord],
) -> Vec<StatusSpan> {
    let mut ordered: Vec<&TransitionRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.occurred_at);

    let mut spans = vec![StatusSpan { status: initial, entered_at: created_at, left_at: None }];
    for record in ordered {
        if let Some(current) = spans.last_mut() {
            current.left_at = Some(record.occurred_at);
        }
        spans.push(StatusSpan {
            status: record.to_status,
            entered_at: record.occurred_at,
            left_at: None,
        });
    }
    spans
}

/// Upper bound on an SLA window, ten years in hours.
pub const MAX_SLA_HOURS: i64 = 24 * 366 * 10;

/// Maximum time an entity may sit in a status before it is flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaRule {
    pub status: AnyStatus,
    pub max_dwell: Duration,
}

impl SlaRule {
    /// A lead that asked for a callback must be called within `hours`.
    ///
    /// `hours` is clamped to `0..=MAX_SLA_HOURS`.
    pub fn callback_within(hours: i64) -> Self {
        Self {
            status: AnyStatus::Lead(LeadStatus::CallbackRequested),
            max_dwell: Duration::hours(hours.clamp(0, MAX_SLA_HOURS)),
        }
    }
}

/// An open span that has outlived its rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaViolation {
    pub status: AnyStatus,
    pub entered_at: Timestamp,
    pub overdue_by_secs: i64,
}

/// Open spans whose dwell exceeds the matching rule.
pub fn violations(spans: &[StatusSpan], rules: &[SlaRule], now: Timestamp) -> Vec<SlaViolation> {
    spans
        .iter()
        .filter(|span| span.is_open())
        .filter_map(|span| {
            let rule = rules.iter().find(|r| r.status == span.status)?;
            let dwell = span.dwell(now);
            (dwell > rule.max_dwell).then(|| SlaViolation {
                status: span.status,
                entered_at: span.entered_at,
                overdue_by_secs: (dwell - rule.max_dwell).num_seconds(),
            })
        })
        .collect()
}
