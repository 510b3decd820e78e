//! # Persistence Seam
//!
//! The engine talks to storage only through these two traits. Every write
//! happens inside a [`StoreTransaction`]; nothing is visible to other
//! transactions until `commit` succeeds, and dropping a transaction without
//! committing discards it.
//!
//! Backends must provide:
//!
//! - a unique index on `code` reported as [`StoreError::UniqueViolation`],
//! - a row lock or compare-and-set on `status` reported as
//!   [`StoreError::StaleStatus`],
//! - an append-only transition log.
//!
//! The engine itself holds no locks, so these guarantees must hold across
//! processes, not just threads.

use std::future::Future;

use fcrm_core::{ActorId, EntityId, EntityKind, Timestamp};
use fcrm_sequence::{ReferenceCode, SequenceScope};
use fcrm_state::{AnyStatus, BoardCard, LifecycleStatus, TransitionRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Name of the unique index on reference codes.
pub const CODE_UNIQUE_CONSTRAINT: &str = "lifecycle_entities_code_key";

/// A persisted business record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Assigned at creation; never changes.
    pub code: ReferenceCode,
    pub status: AnyStatus,
    /// Display order within the status column.
    pub position: i64,
    /// Caller-owned business fields.
    pub attributes: Map<String, Value>,
    /// Engine-owned columns written by transitions.
    pub derived: Map<String, Value>,
    pub created_by: Option<ActorId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl EntityRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Board card view, if this record is of kind `S`.
    pub fn to_card<S: LifecycleStatus>(&self) -> Option<BoardCard<S>> {
        let status = S::from_any(self.status)?;
        Some(BoardCard {
            id: self.id,
            code: self.code.to_string(),
            status,
            derived: self.derived.clone(),
        })
    }
}

/// A record about to be created, still without its code.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub status: AnyStatus,
    pub position: i64,
    pub attributes: Map<String, Value>,
    pub derived: Map<String, Value>,
    pub created_by: Option<ActorId>,
    pub created_at: Timestamp,
}

impl PendingEntity {
    pub fn with_code(&self, code: ReferenceCode) -> EntityRecord {
        EntityRecord {
            id: self.id,
            kind: self.kind,
            code,
            status: self.status,
            position: self.position,
            attributes: self.attributes.clone(),
            derived: self.derived.clone(),
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.created_at,
            deleted_at: None,
        }
    }
}

/// Compare-and-set status write.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub entity_id: EntityId,
    /// Status the row must still have.
    pub expected: AnyStatus,
    pub status: AnyStatus,
    /// Full derived-column map after applying the transition.
    pub derived: Map<String, Value>,
    pub updated_at: Timestamp,
}

/// Entry point to a backend.
pub trait LifecycleStore: Send + Sync {
    type Tx: StoreTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    /// Read a record outside any transaction. Soft-deleted rows are returned.
    fn get(&self, id: EntityId) -> impl Future<Output = Result<Option<EntityRecord>, StoreError>> + Send;

    /// Live records of `kind`, ordered by status column then position.
    fn list(&self, kind: EntityKind) -> impl Future<Output = Result<Vec<EntityRecord>, StoreError>> + Send;

    /// Audit log for `id`, oldest first.
    fn transitions_for(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<Vec<TransitionRecord>, StoreError>> + Send;
}

/// One unit of work.
pub trait StoreTransaction: Send {
    /// Greatest issued code with the scope's prefix, by sequence order.
    /// Soft-deleted rows count: their codes stay issued. Codes whose tail
    /// does not parse are skipped.
    fn find_max_code(
        &mut self,
        scope: &SequenceScope,
    ) -> impl Future<Output = Result<Option<ReferenceCode>, StoreError>> + Send;

    fn insert_entity(
        &mut self,
        record: &EntityRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Read a record and hold it against concurrent status writes until the
    /// transaction ends.
    fn load_for_update(
        &mut self,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<EntityRecord>, StoreError>> + Send;

    fn update_entity_status(
        &mut self,
        update: &StatusUpdate,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Move within a status column. Fails with `StaleStatus` if the record
    /// left `expected`.
    fn update_position(
        &mut self,
        id: EntityId,
        expected: AnyStatus,
        position: i64,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn soft_delete(
        &mut self,
        id: EntityId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn append_transition_record(
        &mut self,
        record: &TransitionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized;
}

/// Column order of a status within its kind, for board listings.
pub(crate) fn column_index(status: AnyStatus) -> usize {
    AnyStatus::all(status.kind())
        .iter()
        .position(|s| *s == status)
        .unwrap_or(usize::MAX)
}

/// Commit on success, roll back on failure. A failed rollback is logged and
/// the original error returned.
pub(crate) async fn finish<T, Tx: StoreTransaction>(
    tx: Tx,
    outcome: Result<T, crate::error::LifecycleError>,
) -> Result<T, crate::error::LifecycleError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
