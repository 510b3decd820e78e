//! # Sequence Allocator
//!
//! Pure computation of the next reference code for a scope, given the last
//! code already issued in it.
//!
//! ## Algorithm (identical for every kind)
//!
//! 1. No previous code → sequence 1.
//! 2. Previous code must start with the scope prefix and end in a tail of
//!    ASCII digits only (no sign, no thousands separators, non-empty).
//!    Anything else is a [`MalformedSequenceTail`]: it is logged and the
//!    scope resumes at sequence 1. A corrupt tail must never block issuance.
//! 3. Otherwise `tail + 1`, rendered with the kind's zero padding. Values
//!    wider than the padding grow a digit (`99999 → 100000`).
//!
//! Stores only hand well-formed codes to the allocator: the max-code lookup
//! skips rows whose tail does not parse, so one corrupt legacy code cannot
//! pin the scope's maximum. Resuming at 1 therefore only happens when the
//! scope holds no well-formed code at all.

use thiserror::Error;

use crate::code::ReferenceCode;
use crate::scope::SequenceScope;

/// The previous code's numeric tail could not be read.
///
/// Internal recovery signal only. [`next_code`] logs it and falls back to
/// sequence 1; it never crosses the crate boundary as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed sequence tail in {code:?} for scope {scope}: {reason}")]
pub struct MalformedSequenceTail {
    /// The offending code.
    pub code: String,
    /// Scope the code was read for.
    pub scope: SequenceScope,
    /// What was wrong with it.
    pub reason: &'static str,
}

/// Failure to produce a next code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// The scope's counter cannot be incremented further.
    #[error("sequence for {scope} exhausted after {last}")]
    Exhausted {
        /// Exhausted scope.
        scope: SequenceScope,
        /// Last issued sequence number.
        last: u64,
    },
}

/// Read the sequence number of `code` within `scope`.
pub fn parse_sequence(
    scope: &SequenceScope,
    code: &ReferenceCode,
) -> Result<u64, MalformedSequenceTail> {
    let malformed = |reason| MalformedSequenceTail {
        code: code.as_str().to_string(),
        scope: *scope,
        reason,
    };

    let tail = code
        .as_str()
        .strip_prefix(scope.prefix().as_str())
        .ok_or_else(|| malformed("code does not carry the scope prefix"))?;

    if tail.is_empty() {
        return Err(malformed("empty numeric tail"));
    }
    if !tail.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("numeric tail contains non-digit characters"));
    }
    tail.parse::<u64>()
        .map_err(|_| malformed("numeric tail out of range"))
}

/// Compute the code that follows `last_issued` in `scope`.
///
/// # Errors
///
/// Only [`SequenceError::Exhausted`], when the tail is already `u64::MAX`.
pub fn next_code(
    scope: &SequenceScope,
    last_issued: Option<&ReferenceCode>,
) -> Result<ReferenceCode, SequenceError> {
    let last = match last_issued {
        None => 0,
        Some(code) => match parse_sequence(scope, code) {
            Ok(n) => n,
            Err(malformed) => {
                tracing::warn!(
                    scope = %scope,
                    code = %malformed.code,
                    reason = malformed.reason,
                    "malformed sequence tail, resuming scope at 1"
                );
                0
            }
        },
    };

    let next = last
        .checked_add(1)
        .ok_or(SequenceError::Exhausted { scope: *scope, last })?;

    Ok(ReferenceCode::new(scope.render(next)))
}
