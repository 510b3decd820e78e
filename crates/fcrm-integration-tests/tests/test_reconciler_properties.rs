//! Property tests: any drag that does not end in `confirm` leaves the board
//! exactly as it was.

use fcrm_core::{EntityId, Timestamp};
use fcrm_state::{
    Board, BoardCard, DragOutcome, LifecycleStatus, OrderStatus, Reconciler, TransitionPayload,
};
use proptest::prelude::*;

fn now() -> Timestamp {
    Timestamp::parse("2025-07-01T12:00:00Z").unwrap()
}

/// A board with `per_column` cards in every order column.
fn populated(per_column: usize) -> (Board<OrderStatus>, Vec<EntityId>) {
    let mut board = Board::new();
    let mut ids = Vec::new();
    for (c, status) in OrderStatus::ALL.iter().enumerate() {
        for i in 0..per_column {
            let id = EntityId::new();
            board.insert(BoardCard::new(id, format!("ORD-2025-{:05}", c * 10 + i + 1), *status));
            ids.push(id);
        }
    }
    (board, ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn unconfirmed_drags_restore_the_board(
        per_column in 1usize..4,
        card in any::<prop::sample::Index>(),
        target in any::<prop::sample::Index>(),
        index in 0usize..6,
        with_date in any::<bool>(),
    ) {
        let (board, ids) = populated(per_column);
        let id = ids[card.index(ids.len())];
        let to = OrderStatus::ALL[target.index(OrderStatus::ALL.len())];
        let mut payload = TransitionPayload::new();
        if with_date {
            payload.insert("delivery_date", "2025-07-20T09:00:00Z");
        }

        let mut reconciler = Reconciler::new(board.clone());
        match reconciler.drag(id, to, index, payload, now()).unwrap() {
            DragOutcome::Reordered(_) => return Ok(()),
            DragOutcome::RolledBack(_) => {}
            DragOutcome::NeedsPayload { .. } => reconciler.abandon(id).unwrap(),
            DragOutcome::Submit(_) => reconciler.reject(id).unwrap(),
        }
        prop_assert_eq!(reconciler.board(), &board);
    }
}
