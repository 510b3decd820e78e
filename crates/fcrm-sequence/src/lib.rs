//! # fcrm-sequence: Sequential Reference Codes
//!
//! Every business record is stamped at creation with a human-readable,
//! year-scoped reference code. This crate owns the pure half of that:
//!
//! - **Scope** (`scope.rs`): `(EntityKind, year)` numbering streams and the
//!   per-kind code layout (`LEAD-2025-00001`, `ORD-2025-00001`, `O2025-001`).
//! - **Code** (`code.rs`): the immutable `ReferenceCode` newtype.
//! - **Allocator** (`allocator.rs`): `next_code(scope, last_issued)`.
//!
//! Issuing a code safely under concurrent writers (transaction, uniqueness
//! conflict, bounded retry) lives in `fcrm-engine::issuer`, on top of this.

pub mod allocator;
pub mod code;
pub mod scope;

pub use allocator::{next_code, parse_sequence, MalformedSequenceTail, SequenceError};
pub use code::ReferenceCode;
pub use scope::{CodeFormat, SequenceScope};
