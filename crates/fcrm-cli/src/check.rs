//! `fcrm validate`: check one transition against the table without a store.

use anyhow::Result;
use clap::Args;
use fcrm_core::{EntityKind, Timestamp};
use fcrm_state::validate_any;

/// Arguments for `fcrm validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Entity kind (lead, quote, order, agreement).
    pub kind: EntityKind,

    /// Current status.
    pub from: String,

    /// Target status.
    pub to: String,

    /// Transition payload as a JSON object.
    #[arg(long)]
    pub payload: Option<String>,

    /// Evaluate as of this RFC 3339 time instead of now.
    #[arg(long)]
    pub at: Option<String>,
}

/// Execute `fcrm validate`. Exits 2 when the transition is rejected.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let from = crate::parse_status(args.kind, &args.from)?;
    let to = crate::parse_status(args.kind, &args.to)?;
    let payload = crate::parse_payload(args.payload.as_deref())?;
    let now = match args.at.as_deref() {
        Some(raw) => Timestamp::parse(raw)?,
        None => Timestamp::now(),
    };

    match validate_any(from, to, &payload, now) {
        Ok(accepted) => {
            crate::print_json(&accepted)?;
            Ok(0)
        }
        Err(rejection) => {
            crate::print_json(&rejection)?;
            tracing::info!(reason = rejection.reason_code(), "{rejection}");
            Ok(2)
        }
    }
}
