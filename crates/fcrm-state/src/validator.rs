//! # Transition Validator
//!
//! One algorithm for every kind:
//!
//! 1. `from == to` is a reorder within a column: accepted, nothing derived.
//! 2. Look up the edge in the kind's table. No edge, no transition.
//! 3. Check the edge's required fields in declaration order. The first
//!    failure is reported with the field name so a UI can prompt for it.
//! 4. Compute the derived writes from the edge and `now` alone. Payload keys
//!    that collide with derived columns are ignored.
//!
//! The caller supplies `now` so that the pre-check on a client board and the
//! authoritative check on the server run the same code.

use std::collections::BTreeMap;

use fcrm_core::{EntityKind, Timestamp};
use serde::Serialize;
use thiserror::Error;

use crate::edge::{EdgeClass, FieldRule, LifecycleStatus, RequiredField, SideEffect};
use crate::payload::{DerivedFields, DerivedValue, TransitionPayload, STAGE_ENTERED_AT};
use crate::status::AnyStatus;

/// Why a required field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProblem {
    /// Not in the payload (or `null`).
    Absent,
    /// A date that is not strictly after the submission time.
    NotInFuture,
    /// A reason code outside its closed set.
    NotInSet,
    /// Wrong JSON type or unparseable timestamp.
    Malformed,
    /// Blank text.
    Empty,
}

impl std::fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Absent => "missing",
            Self::NotInFuture => "not in the future",
            Self::NotInSet => "not an allowed value",
            Self::Malformed => "malformed",
            Self::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// A refused transition.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// No edge connects the two statuses.
    #[error("cannot move {kind} from {from} to {to}")]
    InvalidTransition {
        kind: EntityKind,
        from: String,
        to: String,
    },

    /// The edge exists but the payload does not satisfy it.
    #[error("required field {field} is {problem}")]
    MissingRequiredField { field: String, problem: FieldProblem },
}

impl Rejection {
    /// Stable machine-readable code for UIs and metrics labels.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::MissingRequiredField { .. } => "missing_required_field",
        }
    }

    fn invalid(kind: EntityKind, from: &str, to: &str) -> Self {
        Self::InvalidTransition {
            kind,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// An approved transition and the writes that must accompany it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    /// Column writes to apply atomically with the status change.
    pub derived: DerivedFields,
    /// Classification of the traversed edge; `None` for a no-op.
    pub class: Option<EdgeClass>,
    /// Same-status request. No status write and no audit record.
    pub no_op: bool,
}

impl Accepted {
    fn no_op() -> Self {
        Self { derived: DerivedFields::new(), class: None, no_op: true }
    }
}

/// Validate a move from `from` to `to` within one kind.
pub fn validate<S: LifecycleStatus>(
    from: S,
    to: S,
    payload: &TransitionPayload,
    now: Timestamp,
) -> Result<Accepted, Rejection> {
    if from == to {
        return Ok(Accepted::no_op());
    }

    let edge = from
        .edge_to(to)
        .ok_or_else(|| Rejection::invalid(S::KIND, from.as_str(), to.as_str()))?;

    let mut checked: BTreeMap<&'static str, DerivedValue> = BTreeMap::new();
    for field in edge.required {
        let value = check_field(field, payload, now).map_err(|problem| {
            Rejection::MissingRequiredField { field: field.key.to_string(), problem }
        })?;
        checked.insert(field.key, value);
    }

    let mut derived = DerivedFields::new();
    for effect in edge.effects {
        match *effect {
            SideEffect::StampNow(column) => derived.set(column, DerivedValue::At(now)),
            SideEffect::CopyPayload { from: key, to: column } => {
                if let Some(value) = checked.get(key) {
                    derived.set(column, value.clone());
                }
            }
            SideEffect::Increment(column) => derived.set(column, DerivedValue::Increment(1)),
            SideEffect::Clear(column) => derived.set(column, DerivedValue::Clear),
        }
    }
    derived.set(STAGE_ENTERED_AT, DerivedValue::At(now));

    Ok(Accepted { derived, class: Some(edge.class), no_op: false })
}

/// Validate a move between two kind-erased statuses.
///
/// Statuses of different kinds never connect.
pub fn validate_any(
    from: AnyStatus,
    to: AnyStatus,
    payload: &TransitionPayload,
    now: Timestamp,
) -> Result<Accepted, Rejection> {
    match (from, to) {
        (AnyStatus::Lead(f), AnyStatus::Lead(t)) => validate(f, t, payload, now),
        (AnyStatus::Quote(f), AnyStatus::Quote(t)) => validate(f, t, payload, now),
        (AnyStatus::Order(f), AnyStatus::Order(t)) => validate(f, t, payload, now),
        (AnyStatus::Agreement(f), AnyStatus::Agreement(t)) => validate(f, t, payload, now),
        _ => Err(Rejection::invalid(from.kind(), from.as_str(), to.as_str())),
    }
}

/// Required fields that `payload` does not supply at all.
///
/// Used by the board to decide between prompting and rolling back.
pub fn absent_fields<S: LifecycleStatus>(
    from: S,
    to: S,
    payload: &TransitionPayload,
) -> Vec<&'static str> {
    from.edge_to(to)
        .map(|edge| {
            edge.required
                .iter()
                .filter(|f| payload.get(f.key).is_none())
                .map(|f| f.key)
                .collect()
        })
        .unwrap_or_default()
}

fn check_field(
    field: &RequiredField,
    payload: &TransitionPayload,
    now: Timestamp,
) -> Result<DerivedValue, FieldProblem> {
    let value = payload.get(field.key).ok_or(FieldProblem::Absent)?;
    let text = value.as_str().ok_or(FieldProblem::Malformed)?;
    match field.rule {
        FieldRule::FutureTimestamp => {
            let at = parse_timestamp(text)?;
            if at <= now {
                return Err(FieldProblem::NotInFuture);
            }
            Ok(DerivedValue::At(at))
        }
        FieldRule::Timestamp => parse_timestamp(text).map(DerivedValue::At),
        FieldRule::OneOf(codes) => {
            let code = text.trim();
            if code.is_empty() {
                return Err(FieldProblem::Empty);
            }
            if !codes.contains(&code) {
                return Err(FieldProblem::NotInSet);
            }
            Ok(DerivedValue::Text(code.to_string()))
        }
        FieldRule::NonEmptyText => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(FieldProblem::Empty);
            }
            Ok(DerivedValue::Text(trimmed.to_string()))
        }
    }
}

fn parse_timestamp(text: &str) -> Result<Timestamp, FieldProblem> {
    if text.trim().is_empty() {
        return Err(FieldProblem::Empty);
    }
    Timestamp::parse_lenient(text.trim()).map_err(|_| FieldProblem::Malformed)
}
