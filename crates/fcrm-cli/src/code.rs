//! `fcrm next-code`: compute the code that follows a given one.

use anyhow::{Context, Result};
use clap::Args;
use fcrm_core::EntityKind;
use fcrm_sequence::{next_code, parse_sequence, ReferenceCode, SequenceScope};

/// Arguments for `fcrm next-code`.
#[derive(Args, Debug)]
pub struct NextCodeArgs {
    /// Entity kind (lead, quote, order, agreement).
    pub kind: EntityKind,

    /// Scope year.
    #[arg(long)]
    pub year: i32,

    /// Highest code issued so far in the scope. Omit for an empty scope.
    #[arg(long)]
    pub last: Option<String>,
}

/// Execute `fcrm next-code`.
pub fn run_next_code(args: &NextCodeArgs) -> Result<u8> {
    let scope = SequenceScope::new(args.kind, args.year);
    let last = args.last.as_deref().map(ReferenceCode::new);

    if let Some(code) = &last {
        if let Err(malformed) = parse_sequence(&scope, code) {
            eprintln!("warning: {malformed}; the scope restarts at 1");
        }
    }

    let next = next_code(&scope, last.as_ref()).with_context(|| format!("scope {scope}"))?;
    println!("{next}");
    Ok(0)
}
