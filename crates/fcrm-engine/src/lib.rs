//! # fcrm-engine: Lifecycle Engine Runtime
//!
//! Runs the pure rules of `fcrm-sequence` and `fcrm-state` against storage.
//!
//! - [`issuer`]: bounded-retry creation of records with unique reference
//!   codes, relying on the store's unique index instead of locks.
//! - [`service`]: create, transition, reorder and soft-delete, each in one
//!   transaction with its audit record.
//! - [`store`]: the persistence seam, implemented by [`MemoryStore`] and,
//!   with a database configured, [`PgStore`].
//! - [`config`]: environment-driven settings.
//!
//! ## Error Boundary
//!
//! Every operation returns [`LifecycleError`]. Rejections from the
//! validator and compare-and-set failures from the store are mapped to it,
//! so callers never see raw store errors for expected conflicts.

pub mod config;
pub mod db;
pub mod error;
pub mod issuer;
pub mod memory;
pub mod service;
pub mod store;

pub use config::{ConfigError, EngineConfig, MAX_CALLBACK_SLA_HOURS};
pub use db::{init_pool, PgStore, PgTransaction};
pub use error::{LifecycleError, StoreError};
pub use issuer::{CodeIssuer, DEFAULT_MAX_ATTEMPTS};
pub use memory::{MemoryStore, MemoryTransaction};
pub use service::{LifecycleService, NewEntity, TransitionOutcome, TransitionRequest};
pub use store::{
    EntityRecord, LifecycleStore, PendingEntity, StatusUpdate, StoreTransaction,
    CODE_UNIQUE_CONSTRAINT,
};
