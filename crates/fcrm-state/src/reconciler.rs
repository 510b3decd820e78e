//! # Optimistic Board Reconciler
//!
//! Drives an interactive board where dropping a card on a column requests a
//! status change. The card moves at once; persistence catches up.
//!
//! ## Per-card protocol
//!
//! ```text
//! Idle ──drag──▶ Speculative ──confirm──▶ Committed ──▶ Idle
//!                    │    ▲
//!                    │    └── supply_payload (still missing fields)
//!                    └──abandon / reject / local rejection──▶ RolledBack ──▶ Idle
//! ```
//!
//! - A drag within one column is a reorder and commits immediately.
//! - The local validator runs before anything is sent. A missing field holds
//!   the card in `Speculative` until the caller supplies it or abandons.
//! - Rolling back restores the snapshot taken before the drag, column index
//!   included, never a value derived from the server's reply.
//! - Confirming replaces the card with the server's copy so that
//!   server-stamped fields win over any local guess.
//!
//! Abandoning never produces a request, so an abandoned drag cannot reach
//! persistence.

use std::collections::HashMap;

use fcrm_core::{EntityId, Timestamp};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::edge::LifecycleStatus;
use crate::payload::TransitionPayload;
use crate::validator::{absent_fields, validate, FieldProblem, Rejection};

// ─── Board ───────────────────────────────────────────────────────────

/// A card as the board shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardCard<S> {
    pub id: EntityId,
    pub code: String,
    pub status: S,
    /// Derived columns last seen from the server.
    pub derived: Map<String, Value>,
}

impl<S> BoardCard<S> {
    pub fn new(id: EntityId, code: impl Into<String>, status: S) -> Self {
        Self { id, code: code.into(), status, derived: Map::new() }
    }
}

/// One status column, cards in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Column<S> {
    pub status: S,
    pub cards: Vec<EntityId>,
}

/// Columns for every status of a kind, plus the cards on them.
#[derive(Debug, Clone, PartialEq)]
pub struct Board<S: LifecycleStatus> {
    columns: Vec<Column<S>>,
    cards: HashMap<EntityId, BoardCard<S>>,
}

impl<S: LifecycleStatus> Default for Board<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: LifecycleStatus> Board<S> {
    /// An empty board with one column per status.
    pub fn new() -> Self {
        Self {
            columns: S::ALL
                .iter()
                .map(|s| Column { status: *s, cards: Vec::new() })
                .collect(),
            cards: HashMap::new(),
        }
    }

    /// Append `card` to the end of its status column, replacing any card
    /// with the same id.
    pub fn insert(&mut self, card: BoardCard<S>) {
        self.detach(card.id);
        let id = card.id;
        let status = card.status;
        self.cards.insert(id, card);
        self.attach(id, status, usize::MAX);
    }

    pub fn card(&self, id: EntityId) -> Option<&BoardCard<S>> {
        self.cards.get(&id)
    }

    pub fn column(&self, status: S) -> &[EntityId] {
        self.columns
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.cards.as_slice())
            .unwrap_or(&[])
    }

    pub fn columns(&self) -> &[Column<S>] {
        &self.columns
    }

    /// Column and index of a card.
    pub fn position(&self, id: EntityId) -> Option<(S, usize)> {
        self.columns.iter().find_map(|c| {
            c.cards.iter().position(|x| *x == id).map(|i| (c.status, i))
        })
    }

    fn detach(&mut self, id: EntityId) -> Option<(S, usize)> {
        for column in &mut self.columns {
            if let Some(i) = column.cards.iter().position(|x| *x == id) {
                column.cards.remove(i);
                return Some((column.status, i));
            }
        }
        None
    }

    /// Place `id` in `status` at `index`, clamped to the column length.
    fn attach(&mut self, id: EntityId, status: S, index: usize) -> usize {
        match self.columns.iter_mut().find(|c| c.status == status) {
            Some(column) => {
                let at = index.min(column.cards.len());
                column.cards.insert(at, id);
                at
            }
            None => 0,
        }
    }

    fn restore(&mut self, snapshot: BoardCard<S>, index: usize) {
        let id = snapshot.id;
        let status = snapshot.status;
        self.detach(id);
        self.cards.insert(id, snapshot);
        self.attach(id, status, index);
    }
}

// ─── Protocol types ──────────────────────────────────────────────────

/// What a speculative card is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Awaiting {
    /// Required fields the drag did not supply.
    Payload(Vec<&'static str>),
    /// The commit request has been handed out.
    Server,
}

/// A locally applied, unconfirmed status change.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeculativeTransition<S> {
    /// Card exactly as it was before the drag.
    pub snapshot: BoardCard<S>,
    /// Its index in the source column.
    pub from_index: usize,
    pub to: S,
    pub payload: TransitionPayload,
    pub awaiting: Awaiting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase<S> {
    Idle,
    Speculative(SpeculativeTransition<S>),
}

/// Status change to send to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRequest<S> {
    pub entity_id: EntityId,
    pub from: S,
    pub to: S,
    pub payload: TransitionPayload,
}

/// Display-order change, already applied locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderRequest<S> {
    pub entity_id: EntityId,
    pub status: S,
    pub position: usize,
}

/// Result of a drag or of supplying payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome<S> {
    /// Same-column move. Committed.
    Reordered(ReorderRequest<S>),
    /// Refused locally; the board is back to the pre-drag snapshot.
    RolledBack(Rejection),
    /// Held speculative until these fields are supplied.
    NeedsPayload { fields: Vec<&'static str> },
    /// Locally valid; send this and then `confirm` or `reject`.
    Submit(CommitRequest<S>),
}

/// Protocol misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("entity {0} is not on the board")]
    UnknownEntity(EntityId),

    #[error("entity {0} already has a transition in flight")]
    AlreadyPending(EntityId),

    #[error("entity {0} has no transition in flight")]
    NotPending(EntityId),

    #[error("entity {0} is waiting for the server")]
    AlreadySubmitted(EntityId),

    #[error("entity {0} has not been submitted")]
    NotSubmitted(EntityId),
}

// ─── Reconciler ──────────────────────────────────────────────────────

/// Board state plus one protocol phase per card.
#[derive(Debug, Clone)]
pub struct Reconciler<S: LifecycleStatus> {
    board: Board<S>,
    pending: HashMap<EntityId, SpeculativeTransition<S>>,
}

impl<S: LifecycleStatus> Reconciler<S> {
    pub fn new(board: Board<S>) -> Self {
        Self { board, pending: HashMap::new() }
    }

    pub fn board(&self) -> &Board<S> {
        &self.board
    }

    pub fn phase(&self, id: EntityId) -> Phase<S> {
        match self.pending.get(&id) {
            Some(moving) => Phase::Speculative(moving.clone()),
            None => Phase::Idle,
        }
    }

    /// Drop `id` onto column `to` at `index`.
    pub fn drag(
        &mut self,
        id: EntityId,
        to: S,
        index: usize,
        payload: TransitionPayload,
        now: Timestamp,
    ) -> Result<DragOutcome<S>, ReconcileError> {
        if self.pending.contains_key(&id) {
            return Err(ReconcileError::AlreadyPending(id));
        }
        let snapshot = self
            .board
            .card(id)
            .cloned()
            .ok_or(ReconcileError::UnknownEntity(id))?;
        let from = snapshot.status;

        if from == to {
            self.board.detach(id);
            let position = self.board.attach(id, to, index);
            return Ok(DragOutcome::Reordered(ReorderRequest { entity_id: id, status: to, position }));
        }

        let (_, from_index) = self.board.detach(id).ok_or(ReconcileError::UnknownEntity(id))?;
        if let Some(card) = self.board.cards.get_mut(&id) {
            card.status = to;
        }
        self.board.attach(id, to, index);

        let moving = SpeculativeTransition {
            snapshot,
            from_index,
            to,
            payload,
            awaiting: Awaiting::Server,
        };
        Ok(self.check(id, moving, now))
    }

    /// Add fields to a card held for payload and re-run the local check.
    pub fn supply_payload(
        &mut self,
        id: EntityId,
        extra: &TransitionPayload,
        now: Timestamp,
    ) -> Result<DragOutcome<S>, ReconcileError> {
        let mut moving = self.pending.remove(&id).ok_or(ReconcileError::NotPending(id))?;
        if moving.awaiting == Awaiting::Server {
            self.pending.insert(id, moving);
            return Err(ReconcileError::AlreadySubmitted(id));
        }
        moving.payload = moving.payload.merged(extra);
        Ok(self.check(id, moving, now))
    }

    /// The user closed the prompt. Restores the pre-drag card.
    pub fn abandon(&mut self, id: EntityId) -> Result<(), ReconcileError> {
        match self.pending.get(&id) {
            None => Err(ReconcileError::NotPending(id)),
            Some(moving) if moving.awaiting == Awaiting::Server => {
                Err(ReconcileError::AlreadySubmitted(id))
            }
            Some(_) => {
                self.roll_back(id);
                Ok(())
            }
        }
    }

    /// The server accepted. `server_card` replaces the local card.
    pub fn confirm(&mut self, server_card: BoardCard<S>) -> Result<(), ReconcileError> {
        let id = server_card.id;
        self.submitted(id)?;
        let index = self
            .board
            .position(id)
            .filter(|(status, _)| *status == server_card.status)
            .map(|(_, i)| i)
            .unwrap_or(usize::MAX);
        self.pending.remove(&id);
        self.board.restore(server_card, index);
        Ok(())
    }

    /// The server refused or the write failed. Restores the pre-drag card.
    pub fn reject(&mut self, id: EntityId) -> Result<(), ReconcileError> {
        self.submitted(id)?;
        self.roll_back(id);
        Ok(())
    }

    fn submitted(&self, id: EntityId) -> Result<&SpeculativeTransition<S>, ReconcileError> {
        match self.pending.get(&id) {
            None => Err(ReconcileError::NotPending(id)),
            Some(moving) if moving.awaiting != Awaiting::Server => Err(ReconcileError::NotSubmitted(id)),
            Some(moving) => Ok(moving),
        }
    }

    fn check(&mut self, id: EntityId, mut moving: SpeculativeTransition<S>, now: Timestamp) -> DragOutcome<S> {
        let from = moving.snapshot.status;
        match validate(from, moving.to, &moving.payload, now) {
            Ok(_) => {
                let request = CommitRequest {
                    entity_id: id,
                    from,
                    to: moving.to,
                    payload: moving.payload.clone(),
                };
                moving.awaiting = Awaiting::Server;
                self.pending.insert(id, moving);
                DragOutcome::Submit(request)
            }
            Err(Rejection::MissingRequiredField { problem: FieldProblem::Absent, .. }) => {
                let fields = absent_fields(from, moving.to, &moving.payload);
                moving.awaiting = Awaiting::Payload(fields.clone());
                self.pending.insert(id, moving);
                DragOutcome::NeedsPayload { fields }
            }
            Err(rejection) => {
                self.pending.insert(id, moving);
                self.roll_back(id);
                DragOutcome::RolledBack(rejection)
            }
        }
    }

    fn roll_back(&mut self, id: EntityId) {
        if let Some(moving) = self.pending.remove(&id) {
            self.board.restore(moving.snapshot, moving.from_index);
        }
    }
}
