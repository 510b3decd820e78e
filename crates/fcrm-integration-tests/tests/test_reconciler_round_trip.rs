//! Board reconciler driven against the lifecycle service.
//!
//! The reconciler decides locally, the service decides for real. These tests
//! check the two agree, and that every path that does not end in a confirmed
//! commit leaves both the board and the store exactly as they were.

use fcrm_core::{EntityId, EntityKind, Timestamp};
use fcrm_engine::{
    EngineConfig, LifecycleError, LifecycleService, MemoryStore, NewEntity, TransitionOutcome,
    TransitionRequest,
};
use fcrm_state::{
    AnyStatus, CommitRequest, DragOutcome, LeadStatus, Phase, Reconciler, Rejection,
    TransitionPayload,
};

fn at(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn now() -> Timestamp {
    at("2025-09-01T10:00:00Z")
}

fn service() -> LifecycleService<MemoryStore> {
    LifecycleService::new(MemoryStore::new(), &EngineConfig::default())
}

/// A lead already in `callback_requested`.
async fn lead_awaiting_callback(svc: &LifecycleService<MemoryStore>) -> EntityId {
    let lead = svc
        .create_entity_at(EntityKind::Lead, NewEntity::default(), at("2025-09-01T08:00:00Z"))
        .await
        .unwrap();
    svc.request_transition_at(
        TransitionRequest {
            kind: EntityKind::Lead,
            entity_id: lead.id,
            from: LeadStatus::New.into(),
            to: LeadStatus::CallbackRequested.into(),
            payload: TransitionPayload::new(),
            actor: None,
        },
        at("2025-09-01T09:00:00Z"),
    )
    .await
    .unwrap();
    lead.id
}

fn to_request(commit: CommitRequest<LeadStatus>) -> TransitionRequest {
    TransitionRequest {
        kind: EntityKind::Lead,
        entity_id: commit.entity_id,
        from: commit.from.into(),
        to: commit.to.into(),
        payload: commit.payload,
        actor: None,
    }
}

#[tokio::test]
async fn callback_to_demo_prompts_then_commits() {
    let svc = service();
    let id = lead_awaiting_callback(&svc).await;
    let mut board = Reconciler::new(svc.board::<LeadStatus>().await.unwrap());

    let outcome = board
        .drag(id, LeadStatus::Demo, 0, TransitionPayload::new(), now())
        .unwrap();
    assert_eq!(outcome, DragOutcome::NeedsPayload { fields: vec!["demo_date"] });
    assert_eq!(board.board().column(LeadStatus::Demo), &[id]);
    assert!(matches!(board.phase(id), Phase::Speculative(_)));

    let extra = TransitionPayload::new().with("demo_date", "2025-09-03T14:00:00Z");
    let DragOutcome::Submit(commit) = board.supply_payload(id, &extra, now()).unwrap() else {
        panic!("expected a commit request");
    };
    assert_eq!(commit.from, LeadStatus::CallbackRequested);
    assert_eq!(commit.to, LeadStatus::Demo);

    let TransitionOutcome::Applied { record, transition } =
        svc.request_transition_at(to_request(commit), now()).await.unwrap()
    else {
        panic!("expected the server to apply the transition");
    };
    assert_eq!(transition.to_status, AnyStatus::Lead(LeadStatus::Demo));
    assert_eq!(record.derived["demo_scheduled_for"], "2025-09-03T14:00:00Z");

    board.confirm(record.to_card::<LeadStatus>().unwrap()).unwrap();
    assert_eq!(board.phase(id), Phase::Idle);
    assert_eq!(board.board(), &svc.board::<LeadStatus>().await.unwrap());
    assert_eq!(
        board.board().card(id).unwrap().derived["demo_scheduled_for"],
        "2025-09-03T14:00:00Z"
    );
}

#[tokio::test]
async fn local_rejection_and_abandon_restore_the_exact_board() {
    let svc = service();
    let first = lead_awaiting_callback(&svc).await;
    let second = lead_awaiting_callback(&svc).await;
    let mut board = Reconciler::new(svc.board::<LeadStatus>().await.unwrap());
    let before = board.board().clone();
    assert_eq!(before.column(LeadStatus::CallbackRequested), &[first, second]);
    let writes_before = svc.store().transition_count();

    let outcome = board
        .drag(first, LeadStatus::Converted, 0, TransitionPayload::new(), now())
        .unwrap();
    assert!(matches!(outcome, DragOutcome::RolledBack(Rejection::InvalidTransition { .. })));
    assert_eq!(board.board(), &before);

    let outcome = board
        .drag(first, LeadStatus::Demo, 0, TransitionPayload::new(), now())
        .unwrap();
    assert!(matches!(outcome, DragOutcome::NeedsPayload { .. }));
    board.abandon(first).unwrap();
    assert_eq!(board.board(), &before);
    assert_eq!(board.phase(first), Phase::Idle);

    assert_eq!(svc.store().transition_count(), writes_before);
}

#[tokio::test]
async fn server_refusal_rolls_back_without_partial_writes() {
    let svc = service();
    let id = lead_awaiting_callback(&svc).await;
    let mut board = Reconciler::new(svc.board::<LeadStatus>().await.unwrap());
    let before = board.board().clone();

    let payload = TransitionPayload::new().with("loss_reason", "price");
    let DragOutcome::Submit(commit) = board.drag(id, LeadStatus::Lost, 0, payload, now()).unwrap()
    else {
        panic!("expected a commit request");
    };

    // Someone else schedules a demo first.
    svc.request_transition_at(
        TransitionRequest {
            kind: EntityKind::Lead,
            entity_id: id,
            from: LeadStatus::CallbackRequested.into(),
            to: LeadStatus::Demo.into(),
            payload: TransitionPayload::new().with("demo_date", "2025-09-05T09:00:00Z"),
            actor: None,
        },
        now(),
    )
    .await
    .unwrap();
    let history_before = svc.history(id).await.unwrap();

    let err = svc.request_transition_at(to_request(commit), now()).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::ConcurrentStatusChange { actual, .. } if actual == AnyStatus::Lead(LeadStatus::Demo)
    ));

    board.reject(id).unwrap();
    assert_eq!(board.board(), &before);

    let stored = svc.get(id).await.unwrap();
    assert_eq!(stored.status, AnyStatus::Lead(LeadStatus::Demo));
    assert!(!stored.derived.contains_key("lost_date"));
    assert_eq!(svc.history(id).await.unwrap(), history_before);
}

#[tokio::test]
async fn reorder_is_mirrored_by_the_service() {
    let svc = service();
    let first = lead_awaiting_callback(&svc).await;
    let second = lead_awaiting_callback(&svc).await;
    let mut board = Reconciler::new(svc.board::<LeadStatus>().await.unwrap());

    let DragOutcome::Reordered(reorder) = board
        .drag(second, LeadStatus::CallbackRequested, 0, TransitionPayload::new(), now())
        .unwrap()
    else {
        panic!("expected a reorder");
    };
    assert_eq!(board.board().column(LeadStatus::CallbackRequested), &[second, first]);

    // Persist the new order by giving each card its column index.
    for (index, card) in board.board().column(reorder.status).iter().enumerate() {
        svc.reorder_within_status(EntityKind::Lead, *card, reorder.status.into(), index as i64)
            .await
            .unwrap();
    }
    assert_eq!(
        svc.board::<LeadStatus>().await.unwrap().column(LeadStatus::CallbackRequested),
        &[second, first]
    );
}
