//! Append-only transition log.

use chrono::{DateTime, Utc};
use fcrm_core::{ActorId, EntityId, EntityKind, Timestamp};
use fcrm_state::{AnyStatus, TransitionRecord};
use sqlx::PgConnection;
use uuid::Uuid;

use super::classify;
use crate::error::StoreError;

pub(crate) async fn append(conn: &mut PgConnection, record: &TransitionRecord) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO lifecycle_transitions \
         (entity_id, kind, from_status, to_status, occurred_at, actor_id, reason_detail) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(record.entity_id.0)
    .bind(record.kind.as_str())
    .bind(record.from_status.as_str())
    .bind(record.to_status.as_str())
    .bind(*record.occurred_at.as_datetime())
    .bind(record.actor_id.map(|a| a.0))
    .bind(record.reason_detail.as_deref())
    .execute(&mut *conn)
    .await
    .map_err(classify)?;
    Ok(())
}

/// History of one entity, oldest first.
pub(crate) async fn for_entity(
    conn: &mut PgConnection,
    id: EntityId,
) -> Result<Vec<TransitionRecord>, StoreError> {
    let rows: Vec<TransitionRow> = sqlx::query_as(
        "SELECT entity_id, kind, from_status, to_status, occurred_at, actor_id, reason_detail \
         FROM lifecycle_transitions WHERE entity_id = $1 ORDER BY occurred_at, seq",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await
    .map_err(classify)?;
    rows.into_iter().map(TransitionRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct TransitionRow {
    entity_id: Uuid,
    kind: String,
    from_status: String,
    to_status: String,
    occurred_at: DateTime<Utc>,
    actor_id: Option<Uuid>,
    reason_detail: Option<String>,
}

impl TransitionRow {
    fn into_record(self) -> Result<TransitionRecord, StoreError> {
        let kind: EntityKind = self.kind.parse().map_err(|_| {
            StoreError::Corrupt(format!("transition of {}: unknown kind {:?}", self.entity_id, self.kind))
        })?;
        let status = |s: &str| {
            AnyStatus::parse(kind, s).ok_or_else(|| {
                StoreError::Corrupt(format!("transition of {}: {kind} has no status {s:?}", self.entity_id))
            })
        };
        Ok(TransitionRecord {
            entity_id: EntityId(self.entity_id),
            kind,
            from_status: status(&self.from_status)?,
            to_status: status(&self.to_status)?,
            occurred_at: Timestamp::from_utc(self.occurred_at),
            actor_id: self.actor_id.map(ActorId),
            reason_detail: self.reason_detail,
        })
    }
}
