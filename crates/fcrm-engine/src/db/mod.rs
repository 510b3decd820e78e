//! # Postgres Persistence
//!
//! [`PgStore`] implements the persistence seam over SQLx.
//!
//! ## Architecture
//!
//! The database is **optional**. When `DATABASE_URL` is set, records and
//! the audit log live in Postgres. When absent, callers fall back to
//! [`crate::MemoryStore`] (development and tests).
//!
//! ## Concurrency
//!
//! - Code uniqueness is the `lifecycle_entities_code_key` unique index. Two
//!   transactions that compute the same next code race on it; the loser
//!   gets a unique violation and the issuer retries from the top.
//! - Status changes lock the row with `SELECT … FOR UPDATE` and update with
//!   `WHERE status = $expected`, so a lost update is impossible even across
//!   processes.

pub mod entities;
pub mod transitions;

use std::time::Duration;

use fcrm_core::{EntityId, EntityKind, Timestamp};
use fcrm_sequence::{ReferenceCode, SequenceScope};
use fcrm_state::{AnyStatus, TransitionRecord};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::store::{
    EntityRecord, LifecycleStore, StatusUpdate, StoreTransaction, CODE_UNIQUE_CONSTRAINT,
};

/// Initialize the connection pool and run migrations.
///
/// Returns `None` if no database URL is configured (in-memory mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(config: &EngineConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store; nothing will persist");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

/// Map a driver error, recognising unique-index violations.
pub(crate) fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation {
                constraint: db.constraint().unwrap_or(CODE_UNIQUE_CONSTRAINT).to_string(),
            };
        }
    }
    StoreError::Database(e)
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl LifecycleStore for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, StoreError> {
        let tx = self.pool.begin().await.map_err(classify)?;
        Ok(PgTransaction { tx })
    }

    async fn get(&self, id: EntityId) -> Result<Option<EntityRecord>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(classify)?;
        entities::fetch(&mut conn, id, false).await
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(classify)?;
        entities::list(&mut conn, kind).await
    }

    async fn transitions_for(&self, id: EntityId) -> Result<Vec<TransitionRecord>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(classify)?;
        transitions::for_entity(&mut conn, id).await
    }
}

/// An open Postgres transaction. Rolled back on drop unless committed.
#[derive(Debug)]
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl StoreTransaction for PgTransaction {
    async fn find_max_code(
        &mut self,
        scope: &SequenceScope,
    ) -> Result<Option<ReferenceCode>, StoreError> {
        entities::max_code(&mut self.tx, &scope.prefix()).await
    }

    async fn insert_entity(&mut self, record: &EntityRecord) -> Result<(), StoreError> {
        entities::insert(&mut self.tx, record).await
    }

    async fn load_for_update(&mut self, id: EntityId) -> Result<Option<EntityRecord>, StoreError> {
        entities::fetch(&mut self.tx, id, true).await
    }

    async fn update_entity_status(&mut self, update: &StatusUpdate) -> Result<(), StoreError> {
        entities::update_status(&mut self.tx, update).await
    }

    async fn update_position(
        &mut self,
        id: EntityId,
        expected: AnyStatus,
        position: i64,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        entities::update_position(&mut self.tx, id, expected, position, at).await
    }

    async fn soft_delete(&mut self, id: EntityId, at: Timestamp) -> Result<(), StoreError> {
        entities::soft_delete(&mut self.tx, id, at).await
    }

    async fn append_transition_record(&mut self, record: &TransitionRecord) -> Result<(), StoreError> {
        transitions::append(&mut self.tx, record).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(classify)
    }
}
