//! # Code Issuer
//!
//! Creates a record and assigns its reference code in one transaction.
//!
//! Every attempt re-reads the scope's highest issued code, computes the next
//! one and inserts. Two writers that read the same maximum both try to insert
//! the same code; the unique index on `code` lets exactly one of them commit.
//! The loser rolls back and starts over from the read, up to
//! `max_attempts` times, without backoff.
//!
//! Aborted attempts reserve nothing, so gaps in a scope are possible and
//! harmless. Codes of soft-deleted rows stay issued and are never reused.

use fcrm_sequence::{next_code, SequenceScope};

use crate::config::EngineConfig;
use crate::error::{LifecycleError, StoreError};
use crate::store::{
    finish, EntityRecord, LifecycleStore, PendingEntity, StoreTransaction,
    CODE_UNIQUE_CONSTRAINT,
};

/// Default attempt bound.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Bounded-retry creator of coded records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeIssuer {
    max_attempts: u32,
}

impl Default for CodeIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl CodeIssuer {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_create_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Insert `pending` with the next free code of `scope`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::SequenceExhaustedOrContended`] when every attempt
    ///   lost the code race, or the scope's counter overflowed.
    /// - [`LifecycleError::Store`] for any other backend failure, returned
    ///   without retrying.
    pub async fn create<St: LifecycleStore>(
        &self,
        store: &St,
        scope: SequenceScope,
        pending: &PendingEntity,
    ) -> Result<EntityRecord, LifecycleError> {
        for attempt in 1..=self.max_attempts {
            match attempt_once(store, &scope, pending, attempt).await {
                Ok(record) => {
                    tracing::debug!(
                        scope = %scope,
                        code = %record.code,
                        entity_id = %record.id,
                        attempt,
                        "reference code issued"
                    );
                    return Ok(record);
                }
                Err(LifecycleError::Store(StoreError::UniqueViolation { constraint }))
                    if constraint == CODE_UNIQUE_CONSTRAINT =>
                {
                    tracing::warn!(
                        scope = %scope,
                        attempt,
                        max_attempts = self.max_attempts,
                        "reference code already taken, retrying"
                    );
                    metrics::counter!("fcrm_code_conflicts_total", "kind" => scope.kind.as_str())
                        .increment(1);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            scope = %scope,
            attempts = self.max_attempts,
            "could not issue a reference code, scope contended"
        );
        metrics::counter!("fcrm_code_exhausted_total", "kind" => scope.kind.as_str()).increment(1);
        Err(LifecycleError::SequenceExhaustedOrContended {
            scope,
            attempts: self.max_attempts,
        })
    }
}

async fn attempt_once<St: LifecycleStore>(
    store: &St,
    scope: &SequenceScope,
    pending: &PendingEntity,
    attempt: u32,
) -> Result<EntityRecord, LifecycleError> {
    let mut tx = store.begin().await?;

    let staged = async {
        let last = tx.find_max_code(scope).await?;
        let code = next_code(scope, last.as_ref()).map_err(|e| {
            tracing::error!(scope = %scope, error = %e, "sequence counter overflow");
            LifecycleError::SequenceExhaustedOrContended { scope: *scope, attempts: attempt }
        })?;
        let record = pending.with_code(code);
        tx.insert_entity(&record).await?;
        Ok::<_, LifecycleError>(record)
    }
    .await;

    finish(tx, staged).await
}
