//! `fcrm create`, `fcrm transition` and `fcrm history`: drive the lifecycle
//! service against the configured store.

use anyhow::{Context, Result};
use clap::Args;
use fcrm_core::{ActorId, EntityId, EntityKind, Timestamp};
use fcrm_engine::{
    init_pool, EngineConfig, LifecycleError, LifecycleService, LifecycleStore, MemoryStore,
    NewEntity, PgStore, TransitionRequest,
};
use serde_json::json;

/// Arguments for `fcrm create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Entity kind (lead, quote, order, agreement).
    pub kind: EntityKind,

    /// Business fields as a JSON object.
    #[arg(long)]
    pub attributes: Option<String>,

    /// Acting user id.
    #[arg(long)]
    pub actor: Option<ActorId>,
}

/// Arguments for `fcrm transition`.
#[derive(Args, Debug)]
pub struct TransitionArgs {
    /// Entity kind (lead, quote, order, agreement).
    pub kind: EntityKind,

    /// Entity id.
    pub id: EntityId,

    /// Status the entity is expected to be in.
    pub from: String,

    /// Target status.
    pub to: String,

    /// Transition payload as a JSON object.
    #[arg(long)]
    pub payload: Option<String>,

    /// Acting user id.
    #[arg(long)]
    pub actor: Option<ActorId>,
}

/// Arguments for `fcrm history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Entity kind (lead, quote, order, agreement).
    pub kind: EntityKind,

    /// Entity id.
    pub id: EntityId,
}

/// Execute `fcrm create`.
pub fn run_create(args: &CreateArgs) -> Result<u8> {
    let new = NewEntity {
        attributes: crate::parse_object(args.attributes.as_deref(), "--attributes")?,
        actor: args.actor,
    };
    with_store(|config| async move {
        match init_pool(&config).await? {
            Some(pool) => create(&LifecycleService::new(PgStore::new(pool), &config), args.kind, new).await,
            None => create(&LifecycleService::new(MemoryStore::new(), &config), args.kind, new).await,
        }
    })
}

/// Execute `fcrm transition`. Exits 2 when the engine refuses the change.
pub fn run_transition(args: &TransitionArgs) -> Result<u8> {
    let request = TransitionRequest {
        kind: args.kind,
        entity_id: args.id,
        from: crate::parse_status(args.kind, &args.from)?,
        to: crate::parse_status(args.kind, &args.to)?,
        payload: crate::parse_payload(args.payload.as_deref())?,
        actor: args.actor,
    };
    with_store(|config| async move {
        match init_pool(&config).await? {
            Some(pool) => transition(&LifecycleService::new(PgStore::new(pool), &config), request).await,
            None => transition(&LifecycleService::new(MemoryStore::new(), &config), request).await,
        }
    })
}

/// Execute `fcrm history`.
pub fn run_history(args: &HistoryArgs) -> Result<u8> {
    with_store(|config| async move {
        match init_pool(&config).await? {
            Some(pool) => history(&LifecycleService::new(PgStore::new(pool), &config), args).await,
            None => history(&LifecycleService::new(MemoryStore::new(), &config), args).await,
        }
    })
}

fn with_store<F, Fut>(body: F) -> Result<u8>
where
    F: FnOnce(EngineConfig) -> Fut,
    Fut: std::future::Future<Output = Result<u8>>,
{
    let config = EngineConfig::from_env()?;
    tracing::debug!(?config, "engine configuration");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(body(config))
}

async fn create<St: LifecycleStore>(
    service: &LifecycleService<St>,
    kind: EntityKind,
    new: NewEntity,
) -> Result<u8> {
    match service.create_entity(kind, new).await {
        Ok(record) => {
            crate::print_json(&record)?;
            Ok(0)
        }
        Err(e) => refused(e),
    }
}

async fn transition<St: LifecycleStore>(
    service: &LifecycleService<St>,
    request: TransitionRequest,
) -> Result<u8> {
    match service.request_transition(request).await {
        Ok(outcome) => {
            crate::print_json(&outcome)?;
            Ok(0)
        }
        Err(e) => refused(e),
    }
}

async fn history<St: LifecycleStore>(service: &LifecycleService<St>, args: &HistoryArgs) -> Result<u8> {
    let record = match service.get(args.id).await {
        Ok(record) if record.kind == args.kind => record,
        Ok(_) => return refused(LifecycleError::NotFound(args.id)),
        Err(e) => return refused(e),
    };
    let now = Timestamp::now();
    let transitions = service.history(args.id).await?;
    let spans = service.timeline(args.id).await?;
    let overdue = service.sla_violations(args.kind, args.id, now).await?;
    crate::print_json(&json!({
        "entity": record,
        "transitions": transitions,
        "spans": spans,
        "sla_violations": overdue,
    }))?;
    Ok(0)
}

/// Print an expected refusal and exit 2; propagate backend failures.
fn refused(e: LifecycleError) -> Result<u8> {
    if let LifecycleError::Store(_) = e {
        return Err(e.into());
    }
    crate::print_json(&json!({
        "error": e.reason_code(),
        "message": e.to_string(),
        "retryable": e.is_retryable(),
    }))?;
    Ok(2)
}
