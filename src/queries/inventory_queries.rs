use crate::{
    entities::{
        inventory::{self, Entity as Inventory, Model as InventoryModel},
        stock_movement::{
            self, Entity as StockMovement, Model as StockMovementModel, MovementType,
        },
    },
    errors::ServiceError,
};
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetInventoryQuery {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
}

#[async_trait]
impl Query for GetInventoryQuery {
    type Result = InventoryModel;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        Inventory::find_by_id((self.product_batch_id, self.location_id))
            .one(db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Inventory not found: ({}, {})",
                    self.product_batch_id, self.location_id
                ))
            })
    }
}

/// Balances at one location, paginated; archived rows excluded.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListInventoryByLocationQuery {
    pub location_id: Uuid,
    pub page: u64,
    pub limit: u64,
}

#[async_trait]
impl Query for ListInventoryByLocationQuery {
    type Result = (Vec<InventoryModel>, u64);

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        if self.page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if self.limit == 0 || self.limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let paginator = Inventory::find()
            .filter(inventory::Column::LocationId.eq(self.location_id))
            .filter(inventory::Column::DeletedAt.is_null())
            .order_by_asc(inventory::Column::ProductBatchId)
            .paginate(db_pool, self.limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(self.page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }
}

/// The ledger for one (batch, location) pair in creation order.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListMovementsQuery {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
}

#[async_trait]
impl Query for ListMovementsQuery {
    type Result = Vec<StockMovementModel>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        StockMovement::find()
            .filter(stock_movement::Column::ProductBatchId.eq(self.product_batch_id))
            .filter(stock_movement::Column::LocationId.eq(self.location_id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .order_by_asc(stock_movement::Column::Id)
            .all(db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Replays ledger entries from a zero state, returning the
/// (available, reserved) counters they produce.
///
/// Reserve and release are internal moves between the two counters; every
/// other type touches `available` only. Rows are assumed to belong to a
/// single (batch, location) pair, so TRANSFER_OUT always debits and
/// TRANSFER_IN always credits.
pub fn replay_movements(movements: &[StockMovementModel]) -> (i32, i32) {
    let mut available = 0i32;
    let mut reserved = 0i32;

    for movement in movements {
        match movement.movement_type() {
            Some(MovementType::Receive) | Some(MovementType::TransferIn) => {
                available += movement.quantity;
            }
            Some(MovementType::Dispatch) | Some(MovementType::TransferOut) => {
                available -= movement.quantity;
            }
            Some(MovementType::Reserve) => {
                available -= movement.quantity;
                reserved += movement.quantity;
            }
            Some(MovementType::Release) => {
                available += movement.quantity;
                reserved -= movement.quantity;
            }
            // ADJUST carries a signed quantity.
            Some(MovementType::Adjust) => {
                available += movement.quantity;
            }
            None => {}
        }
    }

    (available, reserved)
}

/// Outcome of checking a balance row against its ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
    pub ledger_available_qty: i32,
    pub ledger_reserved_qty: i32,
    pub current_available_qty: i32,
    pub current_reserved_qty: i32,
    pub consistent: bool,
}

/// Recomputes a balance from its movements and compares with the stored row.
/// An absent row reconciles against zero counters.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileLedgerQuery {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
}

#[async_trait]
impl Query for ReconcileLedgerQuery {
    type Result = ReconciliationReport;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let movements = ListMovementsQuery {
            product_batch_id: self.product_batch_id,
            location_id: self.location_id,
        }
        .execute(db_pool)
        .await?;

        let (ledger_available, ledger_reserved) = replay_movements(&movements);

        let (current_available, current_reserved) =
            Inventory::find_by_id((self.product_batch_id, self.location_id))
                .one(db_pool)
                .await
                .map_err(ServiceError::db_error)?
                .map(|inv| (inv.available_qty, inv.reserved_qty))
                .unwrap_or((0, 0));

        Ok(ReconciliationReport {
            product_batch_id: self.product_batch_id,
            location_id: self.location_id,
            ledger_available_qty: ledger_available,
            ledger_reserved_qty: ledger_reserved,
            current_available_qty: current_available,
            current_reserved_qty: current_reserved,
            consistent: ledger_available == current_available
                && ledger_reserved == current_reserved,
        })
    }
}
