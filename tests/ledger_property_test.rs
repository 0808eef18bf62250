mod common;

use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use common::{build_service, InMemoryInventoryRepository};
use warehouse_api::commands::inventory::{
    AdjustInventoryCommand, DispatchInventoryCommand, ReceiveInventoryCommand,
    ReleaseInventoryCommand, ReserveInventoryCommand, TransferInventoryCommand,
};
use warehouse_api::queries::inventory_queries::replay_movements;
use warehouse_api::services::InventoryService;

#[derive(Debug, Clone)]
enum Op {
    Receive(i32),
    Dispatch(i32),
    Reserve(i32),
    Release(i32),
    Adjust(i32),
    Transfer(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1..=15i32).prop_map(Op::Receive),
        (1..=15i32).prop_map(Op::Dispatch),
        (1..=15i32).prop_map(Op::Reserve),
        (1..=15i32).prop_map(Op::Release),
        ((-10..=10i32).prop_filter("adjust delta must be nonzero", |d| *d != 0))
            .prop_map(Op::Adjust),
        (1..=15i32).prop_map(Op::Transfer),
    ]
}

/// Applies one operation, ignoring domain rejections: a failed guard must
/// leave no state behind, which is exactly what the final reconciliation
/// checks.
async fn apply(svc: &InventoryService, batch: Uuid, loc_a: Uuid, loc_b: Uuid, op: &Op) {
    match *op {
        Op::Receive(q) => {
            let _ = svc
                .receive_inventory(ReceiveInventoryCommand {
                    product_batch_id: batch,
                    location_id: loc_a,
                    quantity: q,
                    created_by_id: None,
                    idempotency_key: None,
                })
                .await;
        }
        Op::Dispatch(q) => {
            let _ = svc
                .dispatch_inventory(DispatchInventoryCommand {
                    product_batch_id: batch,
                    location_id: loc_a,
                    quantity: q,
                    created_by_id: None,
                    idempotency_key: None,
                })
                .await;
        }
        Op::Reserve(q) => {
            let _ = svc
                .reserve_inventory(ReserveInventoryCommand {
                    product_batch_id: batch,
                    location_id: loc_a,
                    quantity: q,
                    reference: None,
                    created_by_id: None,
                    idempotency_key: None,
                })
                .await;
        }
        Op::Release(q) => {
            let _ = svc
                .release_inventory(ReleaseInventoryCommand {
                    product_batch_id: batch,
                    location_id: loc_a,
                    quantity: q,
                    reference: None,
                    created_by_id: None,
                    idempotency_key: None,
                })
                .await;
        }
        Op::Adjust(d) => {
            let _ = svc
                .adjust_inventory(AdjustInventoryCommand {
                    product_batch_id: batch,
                    location_id: loc_a,
                    adjustment_quantity: d,
                    reason: None,
                    note: None,
                    created_by_id: None,
                    idempotency_key: None,
                })
                .await;
        }
        Op::Transfer(q) => {
            let _ = svc
                .transfer_inventory(TransferInventoryCommand {
                    product_batch_id: batch,
                    from_location_id: loc_a,
                    to_location_id: loc_b,
                    quantity: q,
                    created_by_id: None,
                    idempotency_key: None,
                    note: None,
                })
                .await;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Replaying the ledger from zero reproduces the live counters, for any
    // sequence of operations, at every touched location.
    #[test]
    fn ledger_replay_matches_live_balances(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let repo = Arc::new(InMemoryInventoryRepository::new());
            let svc = build_service(repo.clone());
            let batch = repo.seed_batch();
            let loc_a = repo.seed_location();
            let loc_b = repo.seed_location();

            for op in &ops {
                apply(&svc, batch, loc_a, loc_b, op).await;
            }

            for loc in [loc_a, loc_b] {
                let (available, reserved) = repo.balance(batch, loc);
                prop_assert!(available >= 0, "available went negative: {}", available);
                prop_assert!(reserved >= 0, "reserved went negative: {}", reserved);
                prop_assert_eq!(
                    replay_movements(&repo.movements(batch, loc)),
                    (available, reserved)
                );
            }
            Ok(())
        })?;
    }

    // Reserving then releasing the same quantity is a no-op on both
    // counters, for every q within the available stock.
    #[test]
    fn reserve_release_round_trip_is_identity(initial in 1..=50i32, q in 1..=50i32) {
        prop_assume!(q <= initial);

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let repo = Arc::new(InMemoryInventoryRepository::new());
            let svc = build_service(repo.clone());
            let batch = repo.seed_batch();
            let loc = repo.seed_location();

            svc.receive_inventory(ReceiveInventoryCommand {
                product_batch_id: batch,
                location_id: loc,
                quantity: initial,
                created_by_id: None,
                idempotency_key: None,
            })
            .await
            .expect("seed receive");
            let before = repo.balance(batch, loc);

            svc.reserve_inventory(ReserveInventoryCommand {
                product_batch_id: batch,
                location_id: loc,
                quantity: q,
                reference: None,
                created_by_id: None,
                idempotency_key: None,
            })
            .await
            .expect("reserve within stock");
            svc.release_inventory(ReleaseInventoryCommand {
                product_batch_id: batch,
                location_id: loc,
                quantity: q,
                reference: None,
                created_by_id: None,
                idempotency_key: None,
            })
            .await
            .expect("release what was reserved");

            prop_assert_eq!(repo.balance(batch, loc), before);
            Ok(())
        })?;
    }
}
