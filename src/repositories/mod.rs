use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{inventory, location, product_batch, stock_movement, user};
use crate::errors::ServiceError;

pub mod inventory_repository;

pub use inventory_repository::SeaOrmInventoryRepository;

/// Result of a single-row inventory mutation: the updated balance row and the
/// ledger entry written in the same transaction.
#[derive(Debug, Clone)]
pub struct InventoryMutation {
    pub inventory: inventory::Model,
    pub movement: stock_movement::Model,
}

/// Result of a transfer: both balance rows plus the linked movement pair.
#[derive(Debug, Clone)]
pub struct TransferMutation {
    pub from_inventory: inventory::Model,
    pub to_inventory: inventory::Model,
    pub transfer_out: stock_movement::Model,
    pub transfer_in: stock_movement::Model,
}

/// Storage contract the inventory engine runs against.
///
/// Implementations own the atomic primitives: every `*_tx` method performs
/// its balance mutation and ledger insert inside one transaction, and every
/// quantity guard is embedded in the update statement itself rather than
/// checked from application code. The engine holds no locks of its own; this
/// contract is where its concurrency safety comes from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn find_product_batch(
        &self,
        id: Uuid,
    ) -> Result<Option<product_batch::Model>, ServiceError>;

    async fn find_location(&self, id: Uuid) -> Result<Option<location::Model>, ServiceError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError>;

    async fn find_inventory(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<inventory::Model>, ServiceError>;

    async fn find_movement_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<stock_movement::Model>, ServiceError>;

    /// Ledger entries for one (batch, location) pair in creation order.
    async fn movements_for(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError>;

    /// Upserts the balance row (creating it at zero if absent) and increments
    /// `available_qty`. Never fails for lack of stock.
    async fn receive_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError>;

    /// Decrements `available_qty` under the guard `available_qty >= quantity`.
    /// Fails with `InsufficientStock` when the guard does not hold.
    async fn dispatch_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError>;

    /// Guarded decrement at the source and upsert/increment at the
    /// destination, with both movements, in one transaction.
    #[allow(clippy::too_many_arguments)]
    async fn transfer_inventory_tx(
        &self,
        product_batch_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
        note: Option<String>,
    ) -> Result<TransferMutation, ServiceError>;

    /// Moves quantity from `available_qty` to `reserved_qty` under the guard
    /// `available_qty >= quantity`.
    #[allow(clippy::too_many_arguments)]
    async fn reserve_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        reference: Option<String>,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError>;

    /// Moves quantity from `reserved_qty` back to `available_qty` under the
    /// guard `reserved_qty >= quantity`; fails with `InvalidReleaseQuantity`
    /// otherwise.
    #[allow(clippy::too_many_arguments)]
    async fn release_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        reference: Option<String>,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError>;

    /// Applies a signed delta to `available_qty`, creating the row if absent.
    /// A negative delta may not take the counter below zero.
    #[allow(clippy::too_many_arguments)]
    async fn adjust_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        adjustment_quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
        reason: Option<String>,
        note: Option<String>,
    ) -> Result<InventoryMutation, ServiceError>;

    /// Soft-deletes a balance row, guarded on both counters being zero.
    async fn archive_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<inventory::Model, ServiceError>;
}
