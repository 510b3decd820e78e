//! # In-Memory Store
//!
//! A [`LifecycleStore`] over `parking_lot::RwLock`-guarded tables, used by
//! tests and by the CLI when no database is configured.
//!
//! Transactions read committed state and stage their writes. `commit` replays
//! the staged writes against a copy of the tables under one write lock and
//! swaps it in only if every write succeeds, which gives the same
//! all-or-nothing behaviour and the same unique-index and compare-and-set
//! failures as the Postgres store.
//!
//! Unlike Postgres, `load_for_update` takes no lock. A competing status
//! write surfaces as `StaleStatus` at commit instead of blocking.

use std::collections::HashMap;
use std::sync::Arc;

use fcrm_core::{EntityId, EntityKind, Timestamp};
use fcrm_sequence::{parse_sequence, ReferenceCode, SequenceScope};
use fcrm_state::{AnyStatus, TransitionRecord};
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::store::{
    column_index, EntityRecord, LifecycleStore, StatusUpdate, StoreTransaction,
    CODE_UNIQUE_CONSTRAINT,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    entities: HashMap<EntityId, EntityRecord>,
    /// Unique index: code → owner.
    codes: HashMap<String, EntityId>,
    transitions: Vec<TransitionRecord>,
}

#[derive(Debug, Clone)]
enum Write {
    Insert(EntityRecord),
    Status(StatusUpdate),
    Position {
        id: EntityId,
        expected: AnyStatus,
        position: i64,
        at: Timestamp,
    },
    SoftDelete { id: EntityId, at: Timestamp },
    Append(TransitionRecord),
}

impl Tables {
    fn apply(&mut self, write: &Write) -> Result<(), StoreError> {
        match write {
            Write::Insert(record) => {
                if self.codes.contains_key(record.code.as_str()) {
                    return Err(StoreError::UniqueViolation {
                        constraint: CODE_UNIQUE_CONSTRAINT.to_string(),
                    });
                }
                if self.entities.contains_key(&record.id) {
                    return Err(StoreError::UniqueViolation {
                        constraint: "lifecycle_entities_pkey".to_string(),
                    });
                }
                self.codes.insert(record.code.as_str().to_string(), record.id);
                self.entities.insert(record.id, record.clone());
            }
            Write::Status(update) => {
                let row = self.live_row(update.entity_id, update.expected)?;
                row.status = update.status;
                row.derived = update.derived.clone();
                row.updated_at = update.updated_at;
            }
            Write::Position { id, expected, position, at } => {
                let row = self.live_row(*id, *expected)?;
                row.position = *position;
                row.updated_at = *at;
            }
            Write::SoftDelete { id, at } => {
                let row = self
                    .entities
                    .get_mut(id)
                    .filter(|r| r.deleted_at.is_none())
                    .ok_or(StoreError::NotFound(*id))?;
                row.deleted_at = Some(*at);
                row.updated_at = *at;
            }
            Write::Append(record) => self.transitions.push(record.clone()),
        }
        Ok(())
    }

    fn live_row(
        &mut self,
        id: EntityId,
        expected: AnyStatus,
    ) -> Result<&mut EntityRecord, StoreError> {
        let row = self
            .entities
            .get_mut(&id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or(StoreError::NotFound(id))?;
        if row.status != expected {
            return Err(StoreError::StaleStatus {
                entity_id: id,
                expected,
                actual: row.status,
            });
        }
        Ok(row)
    }

    /// Highest well-formed code of `scope`. Codes whose tail does not parse
    /// are skipped, so a corrupt legacy row cannot pin the maximum.
    fn max_code(&self, scope: &SequenceScope) -> Option<ReferenceCode> {
        self.entities
            .values()
            .map(|r| &r.code)
            .filter_map(|c| parse_sequence(scope, c).ok().map(|n| (n, c)))
            .max_by_key(|(n, _)| *n)
            .map(|(_, c)| c.clone())
    }
}

/// Shared in-process store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transition records, across all entities.
    pub fn transition_count(&self) -> usize {
        self.tables.read().transitions.len()
    }

    /// Insert a row directly, bypassing the issuer. For seeding legacy data.
    pub fn seed(&self, record: EntityRecord) -> Result<(), StoreError> {
        self.tables.write().apply(&Write::Insert(record))
    }
}

impl LifecycleStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction { tables: Arc::clone(&self.tables), staged: Vec::new() })
    }

    async fn get(&self, id: EntityId) -> Result<Option<EntityRecord>, StoreError> {
        Ok(self.tables.read().entities.get(&id).cloned())
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, StoreError> {
        let mut rows: Vec<EntityRecord> = self
            .tables
            .read()
            .entities
            .values()
            .filter(|r| r.kind == kind && r.deleted_at.is_none())
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (column_index(a.status), a.position, a.code.sequence_order_key())
                .cmp(&(column_index(b.status), b.position, b.code.sequence_order_key()))
        });
        Ok(rows)
    }

    async fn transitions_for(&self, id: EntityId) -> Result<Vec<TransitionRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .transitions
            .iter()
            .filter(|t| t.entity_id == id)
            .cloned()
            .collect())
    }
}

/// Staged writes against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    staged: Vec<Write>,
}

impl MemoryTransaction {
    /// Committed state with this transaction's writes applied on top.
    fn view(&self) -> Result<Tables, StoreError> {
        let mut view = self.tables.read().clone();
        for write in &self.staged {
            view.apply(write)?;
        }
        Ok(view)
    }

    /// Stage `write`, failing early if it already conflicts.
    fn stage(&mut self, write: Write) -> Result<(), StoreError> {
        self.view()?.apply(&write)?;
        self.staged.push(write);
        Ok(())
    }
}

impl StoreTransaction for MemoryTransaction {
    async fn find_max_code(
        &mut self,
        scope: &SequenceScope,
    ) -> Result<Option<ReferenceCode>, StoreError> {
        Ok(self.view()?.max_code(scope))
    }

    async fn insert_entity(&mut self, record: &EntityRecord) -> Result<(), StoreError> {
        self.stage(Write::Insert(record.clone()))
    }

    async fn load_for_update(&mut self, id: EntityId) -> Result<Option<EntityRecord>, StoreError> {
        Ok(self.view()?.entities.get(&id).cloned())
    }

    async fn update_entity_status(&mut self, update: &StatusUpdate) -> Result<(), StoreError> {
        self.stage(Write::Status(update.clone()))
    }

    async fn update_position(
        &mut self,
        id: EntityId,
        expected: AnyStatus,
        position: i64,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.stage(Write::Position { id, expected, position, at })
    }

    async fn soft_delete(&mut self, id: EntityId, at: Timestamp) -> Result<(), StoreError> {
        self.stage(Write::SoftDelete { id, at })
    }

    async fn append_transition_record(&mut self, record: &TransitionRecord) -> Result<(), StoreError> {
        self.stage(Write::Append(record.clone()))
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let mut next = tables.clone();
        for write in &self.staged {
            next.apply(write)?;
        }
        *tables = next;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
