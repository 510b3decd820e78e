//! Reference-code issuance under contention.
//!
//! Races are forced deterministically: a wrapping store parks the first
//! max-code reads on a barrier so that two writers see the same maximum and
//! compute the same code. The unique index must let exactly one of them
//! commit and the issuer must retry the other.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use fcrm_core::{EntityId, EntityKind, Timestamp};
use fcrm_engine::{
    EngineConfig, EntityRecord, LifecycleError, LifecycleService, LifecycleStore, MemoryStore,
    MemoryTransaction, NewEntity, StatusUpdate, StoreError, StoreTransaction,
    CODE_UNIQUE_CONSTRAINT,
};
use fcrm_sequence::{ReferenceCode, SequenceScope};
use fcrm_state::{AnyStatus, TransitionRecord};
use tokio::sync::Barrier;

/// Memory store with hooks for forcing interleavings.
#[derive(Clone)]
struct HookedStore {
    inner: MemoryStore,
    /// Parties that must all read the max code before any proceeds.
    barrier: Option<Arc<Barrier>>,
    gated_reads: Arc<AtomicUsize>,
    begun: Arc<AtomicU32>,
    /// Report every commit as a lost code race.
    always_conflict: bool,
}

impl HookedStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            barrier: None,
            gated_reads: Arc::new(AtomicUsize::new(0)),
            begun: Arc::new(AtomicU32::new(0)),
            always_conflict: false,
        }
    }

    fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    fn always_conflicting(mut self) -> Self {
        self.always_conflict = true;
        self
    }

    fn attempts(&self) -> u32 {
        self.begun.load(Ordering::SeqCst)
    }
}

struct HookedTx {
    inner: MemoryTransaction,
    store: HookedStore,
}

impl LifecycleStore for HookedStore {
    type Tx = HookedTx;

    async fn begin(&self) -> Result<HookedTx, StoreError> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(HookedTx { inner: self.inner.begin().await?, store: self.clone() })
    }

    async fn get(&self, id: EntityId) -> Result<Option<EntityRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, StoreError> {
        self.inner.list(kind).await
    }

    async fn transitions_for(&self, id: EntityId) -> Result<Vec<TransitionRecord>, StoreError> {
        self.inner.transitions_for(id).await
    }
}

impl StoreTransaction for HookedTx {
    async fn find_max_code(
        &mut self,
        scope: &SequenceScope,
    ) -> Result<Option<ReferenceCode>, StoreError> {
        let max = self.inner.find_max_code(scope).await?;
        if let Some(barrier) = &self.store.barrier {
            let parties = self.store.gated_reads.fetch_add(1, Ordering::SeqCst);
            if parties < 2 {
                barrier.wait().await;
            }
        }
        Ok(max)
    }

    async fn insert_entity(&mut self, record: &EntityRecord) -> Result<(), StoreError> {
        self.inner.insert_entity(record).await
    }

    async fn load_for_update(&mut self, id: EntityId) -> Result<Option<EntityRecord>, StoreError> {
        self.inner.load_for_update(id).await
    }

    async fn update_entity_status(&mut self, update: &StatusUpdate) -> Result<(), StoreError> {
        self.inner.update_entity_status(update).await
    }

    async fn update_position(
        &mut self,
        id: EntityId,
        expected: AnyStatus,
        position: i64,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.inner.update_position(id, expected, position, at).await
    }

    async fn soft_delete(&mut self, id: EntityId, at: Timestamp) -> Result<(), StoreError> {
        self.inner.soft_delete(id, at).await
    }

    async fn append_transition_record(&mut self, record: &TransitionRecord) -> Result<(), StoreError> {
        self.inner.append_transition_record(record).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        if self.store.always_conflict {
            self.inner.rollback().await?;
            return Err(StoreError::UniqueViolation {
                constraint: CODE_UNIQUE_CONSTRAINT.to_string(),
            });
        }
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

fn at(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

#[tokio::test]
async fn two_writers_reading_the_same_max_get_distinct_codes() {
    let store = HookedStore::new(MemoryStore::new()).with_barrier(2);
    let service = LifecycleService::new(store.clone(), &EngineConfig::default());
    let now = at("2025-02-10T10:00:00Z");

    let (a, b) = tokio::join!(
        service.create_entity_at(EntityKind::Order, NewEntity::default(), now),
        service.create_entity_at(EntityKind::Order, NewEntity::default(), now),
    );
    let codes: BTreeSet<String> = [a.unwrap(), b.unwrap()]
        .into_iter()
        .map(|r| r.code.into_string())
        .collect();

    assert_eq!(
        codes,
        BTreeSet::from(["ORD-2025-00001".to_string(), "ORD-2025-00002".to_string()])
    );
    // Both read an empty scope; one lost the insert race and retried once.
    assert_eq!(store.attempts(), 3);
}

#[tokio::test]
async fn permanent_contention_exhausts_the_retry_budget() {
    let store = HookedStore::new(MemoryStore::new()).always_conflicting();
    let service = LifecycleService::new(store.clone(), &EngineConfig::default());

    let err = service
        .create_entity(EntityKind::Agreement, NewEntity::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::SequenceExhaustedOrContended {
            scope: SequenceScope { kind: EntityKind::Agreement, .. },
            attempts: 3,
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(store.attempts(), 3);
    assert!(store.inner.list(EntityKind::Agreement).await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_budget_follows_configuration() {
    let store = HookedStore::new(MemoryStore::new()).always_conflicting();
    let config = EngineConfig { max_create_attempts: 5, ..EngineConfig::default() };
    let service = LifecycleService::new(store.clone(), &config);

    let err = service.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::SequenceExhaustedOrContended { attempts: 5, .. }));
    assert_eq!(store.attempts(), 5);
}

#[tokio::test]
async fn year_boundary_starts_a_new_sequence() {
    let service = LifecycleService::new(MemoryStore::new(), &EngineConfig::default());

    let december = service
        .create_entity_at(EntityKind::Order, NewEntity::default(), at("2025-12-31T23:59:59Z"))
        .await
        .unwrap();
    let january = service
        .create_entity_at(EntityKind::Order, NewEntity::default(), at("2026-01-01T00:00:00Z"))
        .await
        .unwrap();

    assert_eq!(december.code.as_str(), "ORD-2025-00001");
    assert_eq!(january.code.as_str(), "ORD-2026-00001");
}

#[tokio::test]
async fn quote_codes_use_their_own_layout() {
    let service = LifecycleService::new(MemoryStore::new(), &EngineConfig::default());
    let now = at("2025-04-01T08:00:00Z");
    let first = service.create_entity_at(EntityKind::Quote, NewEntity::default(), now).await.unwrap();
    let second = service.create_entity_at(EntityKind::Quote, NewEntity::default(), now).await.unwrap();
    assert_eq!(first.code.as_str(), "O2025-001");
    assert_eq!(second.code.as_str(), "O2025-002");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_creates_fill_the_scope_without_duplicates() {
    const WRITERS: usize = 20;
    let config = EngineConfig { max_create_attempts: WRITERS as u32 + 5, ..EngineConfig::default() };
    let service = Arc::new(LifecycleService::new(MemoryStore::new(), &config));
    let now = at("2025-08-01T08:00:00Z");

    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.create_entity_at(EntityKind::Lead, NewEntity::default(), now).await
        }));
    }

    let mut codes = BTreeSet::new();
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        assert!(codes.insert(record.code.into_string()), "duplicate code issued");
    }

    let expected: BTreeSet<String> = (1..=WRITERS).map(|n| format!("LEAD-2025-{n:05}")).collect();
    assert_eq!(codes, expected);
}
