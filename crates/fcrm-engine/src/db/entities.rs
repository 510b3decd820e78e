//! Persistence for lifecycle entities.

use chrono::{DateTime, Utc};
use fcrm_core::{ActorId, EntityId, EntityKind, Timestamp};
use fcrm_sequence::ReferenceCode;
use fcrm_state::AnyStatus;
use serde_json::{Map, Value};
use sqlx::PgConnection;
use uuid::Uuid;

use super::classify;
use crate::error::StoreError;
use crate::store::{column_index, EntityRecord, StatusUpdate};

const COLUMNS: &str = "id, kind, code, status, position, attributes, derived, \
                       created_by, created_at, updated_at, deleted_at";

/// Greatest well-formed code with `prefix`, by numeric-tail order. Includes
/// deleted rows. Codes whose tail is not 1 to 19 digits are ignored, so a
/// corrupt legacy code never becomes the maximum.
pub(crate) async fn max_code(
    conn: &mut PgConnection,
    prefix: &str,
) -> Result<Option<ReferenceCode>, StoreError> {
    let code: Option<(String,)> = sqlx::query_as(
        "SELECT code FROM lifecycle_entities WHERE code LIKE $1 AND code ~ $2 \
         ORDER BY length(code) DESC, code DESC LIMIT 1",
    )
    .bind(format!("{}%", escape_like(prefix)))
    .bind(sequence_pattern(prefix))
    .fetch_optional(&mut *conn)
    .await
    .map_err(classify)?;
    Ok(code.map(|(c,)| ReferenceCode::new(c)))
}

pub(crate) async fn insert(conn: &mut PgConnection, record: &EntityRecord) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO lifecycle_entities (id, kind, code, status, position, attributes, derived, \
         created_by, created_at, updated_at, deleted_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id.0)
    .bind(record.kind.as_str())
    .bind(record.code.as_str())
    .bind(record.status.as_str())
    .bind(record.position)
    .bind(Value::Object(record.attributes.clone()))
    .bind(Value::Object(record.derived.clone()))
    .bind(record.created_by.map(|a| a.0))
    .bind(*record.created_at.as_datetime())
    .bind(*record.updated_at.as_datetime())
    .bind(record.deleted_at.map(|t| *t.as_datetime()))
    .execute(&mut *conn)
    .await
    .map_err(classify)?;
    Ok(())
}

/// Load one entity. With `lock`, the row is held `FOR UPDATE` until the
/// surrounding transaction ends.
pub(crate) async fn fetch(
    conn: &mut PgConnection,
    id: EntityId,
    lock: bool,
) -> Result<Option<EntityRecord>, StoreError> {
    let sql = if lock {
        format!("SELECT {COLUMNS} FROM lifecycle_entities WHERE id = $1 FOR UPDATE")
    } else {
        format!("SELECT {COLUMNS} FROM lifecycle_entities WHERE id = $1")
    };
    let row: Option<EntityRow> = sqlx::query_as(&sql)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(classify)?;
    row.map(EntityRow::into_record).transpose()
}

/// Live entities of one kind in board order.
pub(crate) async fn list(
    conn: &mut PgConnection,
    kind: EntityKind,
) -> Result<Vec<EntityRecord>, StoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM lifecycle_entities \
         WHERE kind = $1 AND deleted_at IS NULL \
         ORDER BY position, length(code), code"
    );
    let rows: Vec<EntityRow> = sqlx::query_as(&sql)
        .bind(kind.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(classify)?;
    let mut records = rows
        .into_iter()
        .map(EntityRow::into_record)
        .collect::<Result<Vec<_>, _>>()?;
    // Stable: keeps the position order inside each column.
    records.sort_by_key(|r| column_index(r.status));
    Ok(records)
}

/// Compare-and-set the status column.
pub(crate) async fn update_status(
    conn: &mut PgConnection,
    update: &StatusUpdate,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE lifecycle_entities SET status = $1, derived = $2, updated_at = $3 \
         WHERE id = $4 AND status = $5 AND deleted_at IS NULL",
    )
    .bind(update.status.as_str())
    .bind(Value::Object(update.derived.clone()))
    .bind(*update.updated_at.as_datetime())
    .bind(update.entity_id.0)
    .bind(update.expected.as_str())
    .execute(&mut *conn)
    .await
    .map_err(classify)?;

    if result.rows_affected() == 0 {
        return Err(explain_miss(conn, update.entity_id, update.expected).await);
    }
    Ok(())
}

pub(crate) async fn update_position(
    conn: &mut PgConnection,
    id: EntityId,
    expected: AnyStatus,
    position: i64,
    at: Timestamp,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE lifecycle_entities SET position = $1, updated_at = $2 \
         WHERE id = $3 AND status = $4 AND deleted_at IS NULL",
    )
    .bind(position)
    .bind(*at.as_datetime())
    .bind(id.0)
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await
    .map_err(classify)?;

    if result.rows_affected() == 0 {
        return Err(explain_miss(conn, id, expected).await);
    }
    Ok(())
}

pub(crate) async fn soft_delete(
    conn: &mut PgConnection,
    id: EntityId,
    at: Timestamp,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE lifecycle_entities SET deleted_at = $1, updated_at = $1 \
         WHERE id = $2 AND deleted_at IS NULL",
    )
    .bind(*at.as_datetime())
    .bind(id.0)
    .execute(&mut *conn)
    .await
    .map_err(classify)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

/// Work out why a compare-and-set touched no row.
async fn explain_miss(conn: &mut PgConnection, id: EntityId, expected: AnyStatus) -> StoreError {
    match fetch(conn, id, false).await {
        Ok(Some(row)) if !row.is_deleted() => StoreError::StaleStatus {
            entity_id: id,
            expected,
            actual: row.status,
        },
        Ok(_) => StoreError::NotFound(id),
        Err(e) => e,
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Anchored POSIX regex for `prefix` followed by a u64-sized digit tail.
fn sequence_pattern(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 16);
    out.push('^');
    for c in prefix.chars() {
        if !c.is_ascii_alphanumeric() {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str("[0-9]{1,19}$");
    out
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    kind: String,
    code: String,
    status: String,
    position: i64,
    attributes: Value,
    derived: Value,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl EntityRow {
    fn into_record(self) -> Result<EntityRecord, StoreError> {
        let kind: EntityKind = self
            .kind
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("entity {}: unknown kind {:?}", self.id, self.kind)))?;
        let status = AnyStatus::parse(kind, &self.status).ok_or_else(|| {
            StoreError::Corrupt(format!("entity {}: {kind} has no status {:?}", self.id, self.status))
        })?;
        Ok(EntityRecord {
            id: EntityId(self.id),
            kind,
            code: ReferenceCode::new(self.code),
            status,
            position: self.position,
            attributes: object(self.id, "attributes", self.attributes)?,
            derived: object(self.id, "derived", self.derived)?,
            created_by: self.created_by.map(ActorId),
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
            deleted_at: self.deleted_at.map(Timestamp::from_utc),
        })
    }
}

fn object(id: Uuid, column: &str, value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(StoreError::Corrupt(format!(
            "entity {id}: {column} is not an object: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("ORD-2025-"), "ORD-2025-");
        assert_eq!(escape_like("A_B%C\\"), "A\\_B\\%C\\\\");
    }

    #[test]
    fn sequence_pattern_anchors_a_digit_tail() {
        assert_eq!(sequence_pattern("LEAD-2025-"), "^LEAD\\-2025\\-[0-9]{1,19}$");
        assert_eq!(sequence_pattern("O2025-"), "^O2025\\-[0-9]{1,19}$");
    }

    #[test]
    fn row_with_unknown_status_is_corrupt() {
        let now = Utc::now();
        let row = EntityRow {
            id: Uuid::new_v4(),
            kind: "lead".into(),
            code: "LEAD-2025-00001".into(),
            status: "archived".into(),
            position: 0,
            attributes: Value::Object(Map::new()),
            derived: Value::Null,
            created_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(matches!(row.into_record(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn row_maps_to_record() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let row = EntityRow {
            id,
            kind: "order".into(),
            code: "ORD-2025-00007".into(),
            status: "in_production".into(),
            position: 3,
            attributes: serde_json::json!({"customer": "Acme"}),
            derived: Value::Null,
            created_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let record = row.into_record().unwrap();
        assert_eq!(record.id, EntityId(id));
        assert_eq!(record.kind, EntityKind::Order);
        assert_eq!(record.status.as_str(), "in_production");
        assert_eq!(record.attributes["customer"], "Acme");
        assert!(record.derived.is_empty());
    }
}
