//! # Transition Payloads and Derived Fields
//!
//! A [`TransitionPayload`] is what the caller sends with a status change:
//! loose JSON keyed by field name (`demo_date`, `loss_reason`, ...). Only the
//! fields an edge requires are inspected.
//!
//! [`DerivedFields`] is what the validator sends back: the column writes that
//! must land in the same update as the status. They are computed from the
//! edge and the server clock, never copied wholesale from the payload.

use std::collections::BTreeMap;

use fcrm_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload key carrying free-text context for the audit record.
pub const REASON_DETAIL_KEY: &str = "reason_detail";

/// Column stamped on every accepted, non-no-op transition.
pub const STAGE_ENTERED_AT: &str = "stage_entered_at";

/// Caller-supplied data accompanying a transition request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionPayload(Map<String, Value>);

impl TransitionPayload {
    /// An empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set `key` to `value`.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Set `key` to `value`.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Value at `key`, treating JSON `null` as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Free-text audit context, if supplied and non-blank.
    pub fn reason_detail(&self) -> Option<String> {
        self.get(REASON_DETAIL_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Merge `other` over `self`; `other` wins on conflicts.
    pub fn merged(mut self, other: &TransitionPayload) -> Self {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
        self
    }

    /// Whether no keys are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for TransitionPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A single derived column write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum DerivedValue {
    /// Set to an instant.
    At(Timestamp),
    /// Set to text.
    Text(String),
    /// Add to the current integer value (absent counts as zero).
    Increment(i64),
    /// Remove the column.
    Clear,
}

/// Column writes produced by an accepted transition, keyed by column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedFields(BTreeMap<String, DerivedValue>);

impl DerivedFields {
    /// No writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write. Later writes to the same column replace earlier ones.
    pub fn set(&mut self, column: &str, value: DerivedValue) {
        self.0.insert(column.to_string(), value);
    }

    /// The write for `column`, if any.
    pub fn get(&self, column: &str) -> Option<&DerivedValue> {
        self.0.get(column)
    }

    /// Whether there are no writes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of columns written.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate writes in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DerivedValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve the writes against a record's current derived columns.
    ///
    /// Increments read the existing value; a non-integer existing value is
    /// treated as zero.
    pub fn apply_to(&self, columns: &mut Map<String, Value>) {
        for (column, value) in &self.0 {
            match value {
                DerivedValue::At(ts) => {
                    columns.insert(column.clone(), Value::String(ts.to_iso8601()));
                }
                DerivedValue::Text(text) => {
                    columns.insert(column.clone(), Value::String(text.clone()));
                }
                DerivedValue::Increment(by) => {
                    let current = columns.get(column).and_then(Value::as_i64).unwrap_or(0);
                    columns.insert(column.clone(), Value::from(current.saturating_add(*by)));
                }
                DerivedValue::Clear => {
                    columns.remove(column);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_null_is_absent() {
        let p = TransitionPayload::new().with("demo_date", Value::Null);
        assert!(p.get("demo_date").is_none());
    }

    #[test]
    fn test_reason_detail_ignores_blank() {
        assert_eq!(TransitionPayload::new().with(REASON_DETAIL_KEY, "  ").reason_detail(), None);
        assert_eq!(
            TransitionPayload::new().with(REASON_DETAIL_KEY, " went quiet ").reason_detail(),
            Some("went quiet".to_string())
        );
    }

    #[test]
    fn test_merged_prefers_other() {
        let a = TransitionPayload::new().with("loss_reason", "price").with("x", 1);
        let b = TransitionPayload::new().with("loss_reason", "timing");
        let m = a.merged(&b);
        assert_eq!(m.get("loss_reason"), Some(&json!("timing")));
        assert_eq!(m.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_apply_resolves_every_op() {
        let mut columns = json!({
            "reactivation_count": 2,
            "expired_at": "2025-01-01T00:00:00Z",
        })
        .as_object()
        .cloned()
        .unwrap();

        let mut derived = DerivedFields::new();
        derived.set("stage_entered_at", DerivedValue::At(ts("2025-02-01T09:00:00Z")));
        derived.set("loss_reason", DerivedValue::Text("price".into()));
        derived.set("reactivation_count", DerivedValue::Increment(1));
        derived.set("reissue_count", DerivedValue::Increment(1));
        derived.set("expired_at", DerivedValue::Clear);
        derived.apply_to(&mut columns);

        assert_eq!(columns["stage_entered_at"], json!("2025-02-01T09:00:00Z"));
        assert_eq!(columns["loss_reason"], json!("price"));
        assert_eq!(columns["reactivation_count"], json!(3));
        assert_eq!(columns["reissue_count"], json!(1));
        assert!(!columns.contains_key("expired_at"));
    }

    #[test]
    fn test_derived_value_wire_shape() {
        let v = serde_json::to_value(DerivedValue::Increment(1)).unwrap();
        assert_eq!(v, json!({"op": "increment", "value": 1}));
        let v = serde_json::to_value(DerivedValue::Clear).unwrap();
        assert_eq!(v, json!({"op": "clear"}));
    }
}
