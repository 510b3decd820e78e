//! # Lifecycle Service
//!
//! The operations callers use to create records and move them between
//! statuses. Every write runs in one store transaction: a transition either
//! lands with its derived columns and its audit record, or not at all.
//!
//! Requests are validated before a transaction is opened, so a rejected
//! request never touches the store.

use fcrm_core::{ActorId, EntityId, EntityKind, Timestamp};
use fcrm_sequence::SequenceScope;
use fcrm_state::{
    reconstruct, validate_any, violations, AnyStatus, Board, DerivedFields, DerivedValue,
    LifecycleStatus, SlaRule, SlaViolation, StatusSpan, TransitionPayload, TransitionRecord,
    STAGE_ENTERED_AT,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::LifecycleError;
use crate::issuer::CodeIssuer;
use crate::store::{finish, EntityRecord, LifecycleStore, PendingEntity, StatusUpdate, StoreTransaction};

/// Input for [`LifecycleService::create_entity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub actor: Option<ActorId>,
}

/// A request to move one entity between statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub kind: EntityKind,
    pub entity_id: EntityId,
    /// Status the caller believes the entity is in.
    pub from: AnyStatus,
    pub to: AnyStatus,
    #[serde(default)]
    pub payload: TransitionPayload,
    #[serde(default)]
    pub actor: Option<ActorId>,
}

/// Result of an accepted transition request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// `from == to`. Nothing was written.
    Unchanged,
    Applied {
        record: EntityRecord,
        transition: TransitionRecord,
    },
}

/// Engine entry point over a store.
#[derive(Debug, Clone)]
pub struct LifecycleService<St> {
    store: St,
    issuer: CodeIssuer,
    sla_rules: Vec<SlaRule>,
}

impl<St: LifecycleStore> LifecycleService<St> {
    pub fn new(store: St, config: &EngineConfig) -> Self {
        Self {
            store,
            issuer: CodeIssuer::from_config(config),
            sla_rules: vec![SlaRule::callback_within(config.callback_sla_hours)],
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn sla_rules(&self) -> &[SlaRule] {
        &self.sla_rules
    }

    /// Create a record in its kind's entry status with a fresh code.
    pub async fn create_entity(
        &self,
        kind: EntityKind,
        new: NewEntity,
    ) -> Result<EntityRecord, LifecycleError> {
        self.create_entity_at(kind, new, Timestamp::now()).await
    }

    /// [`Self::create_entity`] with an explicit clock.
    pub async fn create_entity_at(
        &self,
        kind: EntityKind,
        new: NewEntity,
        now: Timestamp,
    ) -> Result<EntityRecord, LifecycleError> {
        let mut stamps = DerivedFields::new();
        stamps.set(STAGE_ENTERED_AT, DerivedValue::At(now));
        let mut derived = Map::new();
        stamps.apply_to(&mut derived);

        let pending = PendingEntity {
            id: EntityId::new(),
            kind,
            status: AnyStatus::initial(kind),
            position: 0,
            attributes: new.attributes,
            derived,
            created_by: new.actor,
            created_at: now,
        };

        let record = self
            .issuer
            .create(&self.store, SequenceScope::new(kind, now.year()), &pending)
            .await?;

        tracing::info!(
            kind = %kind,
            entity_id = %record.id,
            code = %record.code,
            "entity created"
        );
        metrics::counter!("fcrm_entities_created_total", "kind" => kind.as_str()).increment(1);
        Ok(record)
    }

    /// Apply a status change if the table allows it and the entity is still
    /// in `request.from`.
    pub async fn request_transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.request_transition_at(request, Timestamp::now()).await
    }

    /// [`Self::request_transition`] with an explicit clock.
    pub async fn request_transition_at(
        &self,
        request: TransitionRequest,
        now: Timestamp,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let TransitionRequest { kind, entity_id, from, to, payload, actor } = request;

        if from.kind() != kind || to.kind() != kind {
            return Err(LifecycleError::InvalidTransition {
                kind,
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        if from == to {
            tracing::debug!(kind = %kind, entity_id = %entity_id, status = %from, "same-status request ignored");
            return Ok(TransitionOutcome::Unchanged);
        }

        let accepted = validate_any(from, to, &payload, now).map_err(|rejection| {
            tracing::info!(
                kind = %kind,
                entity_id = %entity_id,
                from = %from,
                to = %to,
                reason = rejection.reason_code(),
                "transition rejected: {rejection}"
            );
            metrics::counter!(
                "fcrm_transitions_rejected_total",
                "kind" => kind.as_str(),
                "reason" => rejection.reason_code()
            )
            .increment(1);
            LifecycleError::from(rejection)
        })?;

        let mut tx = self.store.begin().await?;
        let staged = async {
            let current = load_live(&mut tx, kind, entity_id).await?;
            if current.status != from {
                return Err(LifecycleError::ConcurrentStatusChange {
                    entity_id,
                    expected: from,
                    actual: current.status,
                });
            }

            let mut derived = current.derived.clone();
            accepted.derived.apply_to(&mut derived);

            tx.update_entity_status(&StatusUpdate {
                entity_id,
                expected: from,
                status: to,
                derived: derived.clone(),
                updated_at: now,
            })
            .await?;

            let transition = TransitionRecord {
                entity_id,
                kind,
                from_status: from,
                to_status: to,
                occurred_at: now,
                actor_id: actor,
                reason_detail: payload.reason_detail(),
            };
            tx.append_transition_record(&transition).await?;

            let record = EntityRecord { status: to, derived, updated_at: now, ..current };
            Ok::<_, LifecycleError>((record, transition))
        }
        .await;

        let (record, transition) = finish(tx, staged).await.map_err(|e| {
            if let LifecycleError::ConcurrentStatusChange { actual, .. } = &e {
                tracing::info!(
                    kind = %kind,
                    entity_id = %entity_id,
                    expected = %from,
                    actual = %actual,
                    "transition lost to a concurrent change"
                );
            }
            e
        })?;

        tracing::info!(
            kind = %kind,
            entity_id = %entity_id,
            code = %record.code,
            from = %from,
            to = %to,
            class = ?accepted.class,
            "transition applied"
        );
        metrics::counter!("fcrm_transitions_applied_total", "kind" => kind.as_str()).increment(1);
        Ok(TransitionOutcome::Applied { record, transition })
    }

    /// Move an entity within its current column. Writes no audit record.
    pub async fn reorder_within_status(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        status: AnyStatus,
        position: i64,
    ) -> Result<EntityRecord, LifecycleError> {
        if status.kind() != kind {
            return Err(LifecycleError::UnknownStatus { kind, status: status.as_str().to_string() });
        }
        let now = Timestamp::now();

        let mut tx = self.store.begin().await?;
        let staged = async {
            let current = load_live(&mut tx, kind, entity_id).await?;
            if current.status != status {
                return Err(LifecycleError::ConcurrentStatusChange {
                    entity_id,
                    expected: status,
                    actual: current.status,
                });
            }
            tx.update_position(entity_id, status, position, now).await?;
            Ok::<_, LifecycleError>(EntityRecord { position, updated_at: now, ..current })
        }
        .await;
        finish(tx, staged).await
    }

    /// Hide a record from boards. Its code stays issued and its history
    /// is kept.
    pub async fn soft_delete(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        actor: Option<ActorId>,
    ) -> Result<(), LifecycleError> {
        let now = Timestamp::now();
        let mut tx = self.store.begin().await?;
        let staged = async {
            load_live(&mut tx, kind, entity_id).await?;
            tx.soft_delete(entity_id, now).await?;
            Ok::<_, LifecycleError>(())
        }
        .await;
        finish(tx, staged).await?;

        tracing::info!(
            kind = %kind,
            entity_id = %entity_id,
            actor = ?actor.map(|a| a.to_string()),
            "entity soft-deleted"
        );
        Ok(())
    }

    /// A record by id, soft-deleted ones included.
    pub async fn get(&self, entity_id: EntityId) -> Result<EntityRecord, LifecycleError> {
        self.store
            .get(entity_id)
            .await?
            .ok_or(LifecycleError::NotFound(entity_id))
    }

    /// Live records of `kind` in board order.
    pub async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, LifecycleError> {
        Ok(self.store.list(kind).await?)
    }

    /// Board of live `S` records, ready to hand to a reconciler.
    pub async fn board<S: LifecycleStatus>(&self) -> Result<Board<S>, LifecycleError> {
        let mut board = Board::new();
        for record in self.store.list(S::KIND).await? {
            if let Some(card) = record.to_card::<S>() {
                board.insert(card);
            }
        }
        Ok(board)
    }

    /// Audit log of one record, oldest first.
    pub async fn history(&self, entity_id: EntityId) -> Result<Vec<TransitionRecord>, LifecycleError> {
        Ok(self.store.transitions_for(entity_id).await?)
    }

    /// Status periods of one record, rebuilt from its audit log.
    pub async fn timeline(&self, entity_id: EntityId) -> Result<Vec<StatusSpan>, LifecycleError> {
        let record = self.get(entity_id).await?;
        let history = self.history(entity_id).await?;
        Ok(reconstruct(record.created_at, AnyStatus::initial(record.kind), &history))
    }

    /// SLA breaches of the record's current status as of `now`.
    pub async fn sla_violations(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        now: Timestamp,
    ) -> Result<Vec<SlaViolation>, LifecycleError> {
        let record = self.get(entity_id).await?;
        if record.kind != kind {
            return Err(LifecycleError::NotFound(entity_id));
        }
        let history = self.history(entity_id).await?;
        let spans = reconstruct(record.created_at, AnyStatus::initial(kind), &history);
        Ok(violations(&spans, &self.sla_rules, now))
    }
}

/// Lock a live record of `kind`, or report it missing.
async fn load_live<Tx: StoreTransaction>(
    tx: &mut Tx,
    kind: EntityKind,
    entity_id: EntityId,
) -> Result<EntityRecord, LifecycleError> {
    tx.load_for_update(entity_id)
        .await?
        .filter(|r| !r.is_deleted() && r.kind == kind)
        .ok_or(LifecycleError::NotFound(entity_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use fcrm_state::{LeadStatus, OrderStatus};
    use serde_json::json;

    fn at(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn service() -> LifecycleService<MemoryStore> {
        LifecycleService::new(MemoryStore::new(), &EngineConfig::default())
    }

    #[test]
    fn oversized_sla_in_a_hand_built_config_is_clamped() {
        let config = EngineConfig { callback_sla_hours: 9_999_999_999_999_999, ..EngineConfig::default() };
        let svc = LifecycleService::new(MemoryStore::new(), &config);
        assert_eq!(svc.sla_rules()[0].max_dwell, chrono::Duration::hours(fcrm_state::MAX_SLA_HOURS));
    }

    fn lead_move(id: EntityId, from: LeadStatus, to: LeadStatus, payload: TransitionPayload) -> TransitionRequest {
        TransitionRequest {
            kind: EntityKind::Lead,
            entity_id: id,
            from: from.into(),
            to: to.into(),
            payload,
            actor: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_code_and_entry_status() {
        let svc = service();
        let now = at("2025-03-10T08:00:00Z");
        let lead = svc
            .create_entity_at(EntityKind::Lead, NewEntity::default(), now)
            .await
            .unwrap();
        assert_eq!(lead.code.as_str(), "LEAD-2025-00001");
        assert_eq!(lead.status, AnyStatus::Lead(LeadStatus::New));
        assert_eq!(lead.derived[STAGE_ENTERED_AT], json!("2025-03-10T08:00:00Z"));
        assert!(svc.history(lead.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn applied_transition_writes_status_derived_and_audit() {
        let svc = service();
        let now = at("2025-03-10T08:00:00Z");
        let lead = svc.create_entity_at(EntityKind::Lead, NewEntity::default(), now).await.unwrap();

        let later = at("2025-03-10T09:00:00Z");
        let out = svc
            .request_transition_at(
                lead_move(
                    lead.id,
                    LeadStatus::New,
                    LeadStatus::CallbackRequested,
                    TransitionPayload::new().with("reason_detail", "asked for a call tomorrow"),
                ),
                later,
            )
            .await
            .unwrap();

        let TransitionOutcome::Applied { record, transition } = out else {
            panic!("expected an applied transition");
        };
        assert_eq!(record.status, AnyStatus::Lead(LeadStatus::CallbackRequested));
        assert_eq!(record.derived[STAGE_ENTERED_AT], json!("2025-03-10T09:00:00Z"));
        assert_eq!(transition.reason_detail.as_deref(), Some("asked for a call tomorrow"));

        let stored = svc.get(lead.id).await.unwrap();
        assert_eq!(stored, record);
        assert_eq!(svc.history(lead.id).await.unwrap(), vec![transition]);
    }

    #[tokio::test]
    async fn rejection_leaves_store_untouched() {
        let svc = service();
        let lead = svc.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap();

        let err = svc
            .request_transition(lead_move(
                lead.id,
                LeadStatus::New,
                LeadStatus::Demo,
                TransitionPayload::new(),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "missing_required_field");
        assert_eq!(svc.get(lead.id).await.unwrap(), lead);
        assert_eq!(svc.store().transition_count(), 0);
    }

    #[tokio::test]
    async fn same_status_is_unchanged() {
        let svc = service();
        let lead = svc.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap();
        let out = svc
            .request_transition(lead_move(lead.id, LeadStatus::New, LeadStatus::New, TransitionPayload::new()))
            .await
            .unwrap();
        assert_eq!(out, TransitionOutcome::Unchanged);
        assert_eq!(svc.store().transition_count(), 0);
    }

    #[tokio::test]
    async fn stale_from_is_concurrent_change() {
        let svc = service();
        let lead = svc.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap();

        let err = svc
            .request_transition(lead_move(
                lead.id,
                LeadStatus::EmailVerified,
                LeadStatus::CallbackRequested,
                TransitionPayload::new(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::ConcurrentStatusChange { expected, actual, .. }
                if expected == AnyStatus::Lead(LeadStatus::EmailVerified)
                    && actual == AnyStatus::Lead(LeadStatus::New)
        ));
    }

    #[tokio::test]
    async fn cross_kind_request_is_invalid() {
        let svc = service();
        let lead = svc.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap();
        let err = svc
            .request_transition(TransitionRequest {
                kind: EntityKind::Lead,
                entity_id: lead.id,
                from: LeadStatus::New.into(),
                to: OrderStatus::Confirmed.into(),
                payload: TransitionPayload::new(),
                actor: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
    }

    #[tokio::test]
    async fn unknown_and_wrong_kind_ids_are_not_found() {
        let svc = service();
        let order = svc.create_entity(EntityKind::Order, NewEntity::default()).await.unwrap();

        let missing = EntityId::new();
        let err = svc
            .request_transition(lead_move(missing, LeadStatus::New, LeadStatus::EmailVerified, TransitionPayload::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(id) if id == missing));

        let err = svc
            .request_transition(lead_move(order.id, LeadStatus::New, LeadStatus::EmailVerified, TransitionPayload::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(id) if id == order.id));
    }

    #[tokio::test]
    async fn reorder_checks_status_and_skips_audit() {
        let svc = service();
        let lead = svc.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap();

        let moved = svc
            .reorder_within_status(EntityKind::Lead, lead.id, LeadStatus::New.into(), 4)
            .await
            .unwrap();
        assert_eq!(moved.position, 4);
        assert_eq!(svc.get(lead.id).await.unwrap().position, 4);
        assert_eq!(svc.store().transition_count(), 0);

        let err = svc
            .reorder_within_status(EntityKind::Lead, lead.id, LeadStatus::EmailVerified.into(), 1)
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "concurrent_status_change");
    }

    #[tokio::test]
    async fn soft_deleted_entities_keep_their_code() {
        let svc = service();
        let now = at("2025-05-01T12:00:00Z");
        let first = svc.create_entity_at(EntityKind::Order, NewEntity::default(), now).await.unwrap();
        svc.soft_delete(EntityKind::Order, first.id, None).await.unwrap();

        assert!(svc.list(EntityKind::Order).await.unwrap().is_empty());
        assert!(svc.get(first.id).await.unwrap().is_deleted());

        let second = svc.create_entity_at(EntityKind::Order, NewEntity::default(), now).await.unwrap();
        assert_eq!(second.code.as_str(), "ORD-2025-00002");

        let err = svc.soft_delete(EntityKind::Order, first.id, None).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }

    #[tokio::test]
    async fn callback_sla_flags_overdue_leads() {
        let svc = service();
        let created = at("2025-03-01T08:00:00Z");
        let lead = svc.create_entity_at(EntityKind::Lead, NewEntity::default(), created).await.unwrap();
        let requested = at("2025-03-01T09:00:00Z");
        svc.request_transition_at(
            lead_move(
                lead.id,
                LeadStatus::New,
                LeadStatus::CallbackRequested,
                TransitionPayload::new(),
            ),
            requested,
        )
        .await
        .unwrap();

        let within = svc
            .sla_violations(EntityKind::Lead, lead.id, at("2025-03-02T09:00:00Z"))
            .await
            .unwrap();
        assert!(within.is_empty());

        let overdue = svc
            .sla_violations(EntityKind::Lead, lead.id, at("2025-03-03T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].overdue_by_secs, 3600);

        let spans = svc.timeline(lead.id).await.unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].left_at, Some(requested));
    }

    #[tokio::test]
    async fn board_lists_live_cards_by_column() {
        let svc = service();
        let a = svc.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap();
        let b = svc.create_entity(EntityKind::Lead, NewEntity::default()).await.unwrap();
        svc.reorder_within_status(EntityKind::Lead, a.id, LeadStatus::New.into(), 1)
            .await
            .unwrap();

        let board = svc.board::<LeadStatus>().await.unwrap();
        assert_eq!(board.column(LeadStatus::New), &[b.id, a.id]);
    }
}
