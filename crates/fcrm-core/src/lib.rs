//! # fcrm-core: Foundational Types for the Lifecycle Engine
//!
//! The leaf of the workspace DAG. Defines the primitives every other
//! `fcrm-*` crate speaks in: which kinds of business record exist, how they
//! are identified, and how instants are represented.
//!
//! ## Key Design Principles
//!
//! 1. **Single `EntityKind` enum.** Lead, Quote, Order, Agreement. Exhaustive
//!    `match` everywhere, so adding a kind forces every consumer (code
//!    formats, transition tables, stores) to handle it.
//!
//! 2. **Newtype identifiers.** `EntityId` and `ActorId` wrap UUIDs and cannot
//!    be swapped for each other.
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC, truncated to seconds, so
//!    derived fields and audit records compare and serialize deterministically.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `fcrm-*` crates.
//! - No `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod kind;
pub mod temporal;

pub use error::CoreError;
pub use identity::{ActorId, EntityId};
pub use kind::EntityKind;
pub use temporal::Timestamp;
