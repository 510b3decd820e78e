//! Postgres store behaviour. Runs only when `FCRM_TEST_DATABASE_URL` points
//! at a disposable database; otherwise every test returns immediately.
//!
//! Codes are allocated in a far-future year picked per run so reruns against
//! the same database start from an empty scope.

use std::collections::BTreeSet;

use fcrm_core::{EntityKind, Timestamp};
use fcrm_engine::{
    init_pool, EngineConfig, LifecycleError, LifecycleService, NewEntity, PgStore,
    TransitionOutcome, TransitionRequest,
};
use fcrm_state::{AnyStatus, OrderStatus, TransitionPayload};

async fn service() -> Option<LifecycleService<PgStore>> {
    let url = std::env::var("FCRM_TEST_DATABASE_URL").ok()?;
    let config = EngineConfig {
        database_url: Some(url),
        db_max_connections: 8,
        ..EngineConfig::default()
    };
    let pool = init_pool(&config)
        .await
        .expect("connect to FCRM_TEST_DATABASE_URL")
        .expect("database url is set");
    Some(LifecycleService::new(PgStore::new(pool), &config))
}

/// A year no real record uses, unique to this run.
fn scratch_year() -> i32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    3000 + (nanos % 5000) as i32
}

fn in_year(year: i32) -> Timestamp {
    Timestamp::parse(&format!("{year}-03-01T10:00:00Z")).unwrap()
}

#[tokio::test]
async fn concurrent_creates_get_consecutive_codes() {
    let Some(svc) = service().await else { return };
    let now = in_year(scratch_year());

    let results = create_concurrently(&svc, now, 8).await;
    let codes: BTreeSet<u64> = results
        .iter()
        .map(|r| r.code.tail().parse::<u64>().unwrap())
        .collect();
    assert_eq!(codes, (1..=8).collect());
}

async fn create_concurrently(
    svc: &LifecycleService<PgStore>,
    now: Timestamp,
    n: usize,
) -> Vec<fcrm_engine::EntityRecord> {
    let mut set = tokio::task::JoinSet::new();
    for _ in 0..n {
        let svc = svc.clone();
        set.spawn(async move {
            svc.create_entity_at(EntityKind::Order, NewEntity::default(), now).await
        });
    }
    let mut out = Vec::new();
    while let Some(joined) = set.join_next().await {
        // Contention may exhaust the default budget; retry like a caller would.
        match joined.unwrap() {
            Ok(record) => out.push(record),
            Err(LifecycleError::SequenceExhaustedOrContended { .. }) => out.push(
                svc.create_entity_at(EntityKind::Order, NewEntity::default(), now)
                    .await
                    .unwrap(),
            ),
            Err(e) => panic!("create failed: {e}"),
        }
    }
    out
}

#[tokio::test]
async fn transition_is_atomic_with_its_audit_record() {
    let Some(svc) = service().await else { return };
    let now = in_year(scratch_year());

    let order = svc
        .create_entity_at(EntityKind::Order, NewEntity::default(), now)
        .await
        .unwrap();
    let request = TransitionRequest {
        kind: EntityKind::Order,
        entity_id: order.id,
        from: OrderStatus::Pending.into(),
        to: OrderStatus::Confirmed.into(),
        payload: TransitionPayload::new(),
        actor: None,
    };

    let TransitionOutcome::Applied { record, .. } =
        svc.request_transition_at(request.clone(), now).await.unwrap()
    else {
        panic!("expected an applied transition");
    };
    assert_eq!(record.status, AnyStatus::Order(OrderStatus::Confirmed));
    assert_eq!(svc.get(order.id).await.unwrap(), record);

    // Replaying the same request now finds the entity moved on.
    let err = svc.request_transition_at(request, now).await.unwrap_err();
    assert_eq!(err.reason_code(), "concurrent_status_change");
    assert_eq!(svc.history(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn soft_deleted_codes_are_not_reissued() {
    let Some(svc) = service().await else { return };
    let now = in_year(scratch_year());

    let first = svc.create_entity_at(EntityKind::Lead, NewEntity::default(), now).await.unwrap();
    svc.soft_delete(EntityKind::Lead, first.id, None).await.unwrap();
    let second = svc.create_entity_at(EntityKind::Lead, NewEntity::default(), now).await.unwrap();

    assert_ne!(first.code, second.code);
    assert!(svc.get(first.id).await.unwrap().is_deleted());
}
