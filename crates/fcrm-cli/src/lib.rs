//! # fcrm-cli: Command-Line Interface for the Lifecycle Engine
//!
//! ## Subcommands
//!
//! - `fcrm table <kind>`: print a kind's transition table.
//! - `fcrm next-code <kind> --year Y [--last CODE]`: run the allocator.
//! - `fcrm validate <kind> <from> <to> [--payload JSON]`: run the validator.
//! - `fcrm create` / `fcrm transition`: drive the lifecycle service.
//!
//! ```bash
//! fcrm table lead
//! fcrm next-code order --year 2025 --last ORD-2025-00041
//! fcrm validate lead new demo --payload '{"demo_date": "2030-01-01T10:00:00Z"}'
//! DATABASE_URL=postgres://... fcrm create quote --attributes '{"customer": "Acme"}'
//! ```
//!
//! Without `DATABASE_URL`, `create` and `transition` run against a store
//! that lives only as long as the process.

pub mod check;
pub mod code;
pub mod entity;
pub mod table;

use anyhow::{anyhow, Context, Result};
use fcrm_core::EntityKind;
use fcrm_state::{AnyStatus, TransitionPayload};
use serde_json::{Map, Value};

/// Resolve a status name within `kind`.
pub fn parse_status(kind: EntityKind, name: &str) -> Result<AnyStatus> {
    AnyStatus::parse(kind, name).ok_or_else(|| {
        let known: Vec<&str> = AnyStatus::all(kind).iter().map(|s| s.as_str()).collect();
        anyhow!("{kind} has no status {name:?} (known: {})", known.join(", "))
    })
}

/// Parse an optional JSON object argument.
pub fn parse_object(raw: Option<&str>, what: &str) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw).with_context(|| format!("{what} is not valid JSON"))? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("{what} must be a JSON object, got {other}")),
    }
}

/// Parse an optional `--payload` argument.
pub fn parse_payload(raw: Option<&str>) -> Result<TransitionPayload> {
    let map = parse_object(raw, "--payload")?;
    Ok(serde_json::from_value(Value::Object(map))?)
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
