use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionError, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::stock_movement::MovementType;
use crate::entities::{inventory, location, product_batch, stock_movement, user};
use crate::errors::ServiceError;
use crate::repositories::{InventoryMutation, InventoryRepository, TransferMutation};

/// Stock ledger access over sea-orm.
///
/// Quantity guards are embedded in the UPDATE statements themselves
/// (`... WHERE available_qty >= ?`), so two concurrent dispatches against the
/// same row serialize through the store's row-level conflict resolution. A
/// read-then-write from here would reintroduce the oversell race the guards
/// exist to prevent.
#[derive(Debug, Clone)]
pub struct SeaOrmInventoryRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmInventoryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn map_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        // Begin/commit failures: nothing was applied, safe to retry.
        TransactionError::Connection(db_err) => {
            ServiceError::TransactionAborted(db_err.to_string())
        }
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Reads a balance row inside the current transaction, erroring if it is
/// somehow absent after a mutation claimed to touch it.
async fn fetch_inventory(
    txn: &DatabaseTransaction,
    product_batch_id: Uuid,
    location_id: Uuid,
) -> Result<inventory::Model, ServiceError> {
    inventory::Entity::find_by_id((product_batch_id, location_id))
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "inventory row ({}, {}) missing after mutation",
                product_batch_id, location_id
            ))
        })
}

async fn available_qty_of(
    txn: &DatabaseTransaction,
    product_batch_id: Uuid,
    location_id: Uuid,
) -> Result<i32, ServiceError> {
    Ok(inventory::Entity::find_by_id((product_batch_id, location_id))
        .one(txn)
        .await?
        .map(|inv| inv.available_qty)
        .unwrap_or(0))
}

async fn reserved_qty_of(
    txn: &DatabaseTransaction,
    product_batch_id: Uuid,
    location_id: Uuid,
) -> Result<i32, ServiceError> {
    Ok(inventory::Entity::find_by_id((product_batch_id, location_id))
        .one(txn)
        .await?
        .map(|inv| inv.reserved_qty)
        .unwrap_or(0))
}

#[allow(clippy::too_many_arguments)]
async fn insert_movement(
    txn: &DatabaseTransaction,
    movement_type: MovementType,
    product_batch_id: Uuid,
    location_id: Uuid,
    quantity: i32,
    reference: Option<String>,
    note: Option<String>,
    correlation_id: Option<Uuid>,
    created_by_id: Option<Uuid>,
    idempotency_key: Option<String>,
) -> Result<stock_movement::Model, ServiceError> {
    let key_for_err = idempotency_key.clone();
    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        movement_type: Set(movement_type.as_str().to_string()),
        product_batch_id: Set(product_batch_id),
        location_id: Set(location_id),
        quantity: Set(quantity),
        reference: Set(reference),
        note: Set(note),
        correlation_id: Set(correlation_id),
        created_by_id: Set(created_by_id),
        created_at: Set(Utc::now()),
        idempotency_key: Set(idempotency_key),
    };

    movement.insert(txn).await.map_err(|e| {
        if let (Some(SqlErr::UniqueConstraintViolation(_)), Some(key)) = (e.sql_err(), key_for_err)
        {
            ServiceError::DuplicateIdempotencyKey(key)
        } else {
            ServiceError::DatabaseError(e)
        }
    })
}

/// One `INSERT ... ON CONFLICT DO UPDATE` that either creates the balance row
/// or increments `available_qty`, clearing any archive marker.
async fn upsert_available(
    txn: &DatabaseTransaction,
    product_batch_id: Uuid,
    location_id: Uuid,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let row = inventory::ActiveModel {
        product_batch_id: Set(product_batch_id),
        location_id: Set(location_id),
        available_qty: Set(quantity),
        reserved_qty: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    };

    inventory::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                inventory::Column::ProductBatchId,
                inventory::Column::LocationId,
            ])
            .value(
                inventory::Column::AvailableQty,
                Expr::col(inventory::Column::AvailableQty).add(quantity),
            )
            .value(inventory::Column::UpdatedAt, Expr::value(now))
            .value(
                inventory::Column::DeletedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .to_owned(),
        )
        .exec(txn)
        .await?;

    Ok(())
}

/// The atomic conditional decrement: `UPDATE ... SET available_qty =
/// available_qty - q WHERE pk AND available_qty >= q`. Returns
/// `InsufficientStock` when zero rows matched, reporting the quantity
/// observed at failure time.
async fn guarded_decrement_available(
    txn: &DatabaseTransaction,
    product_batch_id: Uuid,
    location_id: Uuid,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let update = inventory::Entity::update_many()
        .col_expr(
            inventory::Column::AvailableQty,
            Expr::col(inventory::Column::AvailableQty).sub(quantity),
        )
        .col_expr(inventory::Column::UpdatedAt, Expr::value(now))
        .filter(inventory::Column::ProductBatchId.eq(product_batch_id))
        .filter(inventory::Column::LocationId.eq(location_id))
        .filter(inventory::Column::AvailableQty.gte(quantity))
        .exec(txn)
        .await?;

    if update.rows_affected == 0 {
        let available = available_qty_of(txn, product_batch_id, location_id).await?;
        return Err(ServiceError::InsufficientStock {
            requested: quantity,
            available,
        });
    }

    Ok(())
}

#[async_trait::async_trait]
impl InventoryRepository for SeaOrmInventoryRepository {
    async fn find_product_batch(
        &self,
        id: Uuid,
    ) -> Result<Option<product_batch::Model>, ServiceError> {
        product_batch::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<location::Model>, ServiceError> {
        location::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_inventory(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<inventory::Model>, ServiceError> {
        inventory::Entity::find_by_id((product_batch_id, location_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_movement_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<stock_movement::Model>, ServiceError> {
        stock_movement::Entity::find()
            .filter(stock_movement::Column::IdempotencyKey.eq(key))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn movements_for(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        stock_movement::Entity::find()
            .filter(stock_movement::Column::ProductBatchId.eq(product_batch_id))
            .filter(stock_movement::Column::LocationId.eq(location_id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .order_by_asc(stock_movement::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn receive_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError> {
        let db = &*self.db;

        db.transaction::<_, InventoryMutation, ServiceError>(|txn| {
            Box::pin(async move {
                let now = Utc::now();
                upsert_available(txn, product_batch_id, location_id, quantity, now).await?;

                let inventory = fetch_inventory(txn, product_batch_id, location_id).await?;
                let movement = insert_movement(
                    txn,
                    MovementType::Receive,
                    product_batch_id,
                    location_id,
                    quantity,
                    None,
                    None,
                    None,
                    created_by_id,
                    idempotency_key,
                )
                .await?;

                Ok(InventoryMutation {
                    inventory,
                    movement,
                })
            })
        })
        .await
        .map_err(map_txn_err)
    }

    async fn dispatch_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError> {
        let db = &*self.db;

        db.transaction::<_, InventoryMutation, ServiceError>(|txn| {
            Box::pin(async move {
                let now = Utc::now();
                guarded_decrement_available(txn, product_batch_id, location_id, quantity, now)
                    .await?;

                let inventory = fetch_inventory(txn, product_batch_id, location_id).await?;
                let movement = insert_movement(
                    txn,
                    MovementType::Dispatch,
                    product_batch_id,
                    location_id,
                    quantity,
                    None,
                    None,
                    None,
                    created_by_id,
                    idempotency_key,
                )
                .await?;

                Ok(InventoryMutation {
                    inventory,
                    movement,
                })
            })
        })
        .await
        .map_err(map_txn_err)
    }

    async fn transfer_inventory_tx(
        &self,
        product_batch_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
        note: Option<String>,
    ) -> Result<TransferMutation, ServiceError> {
        let db = &*self.db;

        db.transaction::<_, TransferMutation, ServiceError>(|txn| {
            Box::pin(async move {
                let now = Utc::now();
                guarded_decrement_available(txn, product_batch_id, from_location_id, quantity, now)
                    .await?;
                upsert_available(txn, product_batch_id, to_location_id, quantity, now).await?;

                let from_inventory = fetch_inventory(txn, product_batch_id, from_location_id).await?;
                let to_inventory = fetch_inventory(txn, product_batch_id, to_location_id).await?;

                // The linked pair shares a correlation id; only the outbound
                // row carries the idempotency key, keeping the unique index
                // one-row-per-operation.
                let correlation_id = Uuid::new_v4();
                let transfer_out = insert_movement(
                    txn,
                    MovementType::TransferOut,
                    product_batch_id,
                    from_location_id,
                    quantity,
                    None,
                    note.clone(),
                    Some(correlation_id),
                    created_by_id,
                    idempotency_key,
                )
                .await?;
                let transfer_in = insert_movement(
                    txn,
                    MovementType::TransferIn,
                    product_batch_id,
                    to_location_id,
                    quantity,
                    None,
                    note,
                    Some(correlation_id),
                    created_by_id,
                    None,
                )
                .await?;

                Ok(TransferMutation {
                    from_inventory,
                    to_inventory,
                    transfer_out,
                    transfer_in,
                })
            })
        })
        .await
        .map_err(map_txn_err)
    }

    async fn reserve_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        reference: Option<String>,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError> {
        let db = &*self.db;

        db.transaction::<_, InventoryMutation, ServiceError>(|txn| {
            Box::pin(async move {
                let now = Utc::now();

                // Single statement moves quantity between the two counters
                // under the available_qty guard.
                let update = inventory::Entity::update_many()
                    .col_expr(
                        inventory::Column::AvailableQty,
                        Expr::col(inventory::Column::AvailableQty).sub(quantity),
                    )
                    .col_expr(
                        inventory::Column::ReservedQty,
                        Expr::col(inventory::Column::ReservedQty).add(quantity),
                    )
                    .col_expr(inventory::Column::UpdatedAt, Expr::value(now))
                    .filter(inventory::Column::ProductBatchId.eq(product_batch_id))
                    .filter(inventory::Column::LocationId.eq(location_id))
                    .filter(inventory::Column::AvailableQty.gte(quantity))
                    .exec(txn)
                    .await?;

                if update.rows_affected == 0 {
                    let available = available_qty_of(txn, product_batch_id, location_id).await?;
                    return Err(ServiceError::InsufficientStock {
                        requested: quantity,
                        available,
                    });
                }

                let inventory = fetch_inventory(txn, product_batch_id, location_id).await?;
                let movement = insert_movement(
                    txn,
                    MovementType::Reserve,
                    product_batch_id,
                    location_id,
                    quantity,
                    reference,
                    None,
                    None,
                    created_by_id,
                    idempotency_key,
                )
                .await?;

                Ok(InventoryMutation {
                    inventory,
                    movement,
                })
            })
        })
        .await
        .map_err(map_txn_err)
    }

    async fn release_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        reference: Option<String>,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError> {
        let db = &*self.db;

        db.transaction::<_, InventoryMutation, ServiceError>(|txn| {
            Box::pin(async move {
                let now = Utc::now();

                let update = inventory::Entity::update_many()
                    .col_expr(
                        inventory::Column::AvailableQty,
                        Expr::col(inventory::Column::AvailableQty).add(quantity),
                    )
                    .col_expr(
                        inventory::Column::ReservedQty,
                        Expr::col(inventory::Column::ReservedQty).sub(quantity),
                    )
                    .col_expr(inventory::Column::UpdatedAt, Expr::value(now))
                    .filter(inventory::Column::ProductBatchId.eq(product_batch_id))
                    .filter(inventory::Column::LocationId.eq(location_id))
                    .filter(inventory::Column::ReservedQty.gte(quantity))
                    .exec(txn)
                    .await?;

                if update.rows_affected == 0 {
                    let reserved = reserved_qty_of(txn, product_batch_id, location_id).await?;
                    return Err(ServiceError::InvalidReleaseQuantity {
                        requested: quantity,
                        reserved,
                    });
                }

                let inventory = fetch_inventory(txn, product_batch_id, location_id).await?;
                let movement = insert_movement(
                    txn,
                    MovementType::Release,
                    product_batch_id,
                    location_id,
                    quantity,
                    reference,
                    None,
                    None,
                    created_by_id,
                    idempotency_key,
                )
                .await?;

                Ok(InventoryMutation {
                    inventory,
                    movement,
                })
            })
        })
        .await
        .map_err(map_txn_err)
    }

    async fn adjust_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        adjustment_quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
        reason: Option<String>,
        note: Option<String>,
    ) -> Result<InventoryMutation, ServiceError> {
        let db = &*self.db;

        db.transaction::<_, InventoryMutation, ServiceError>(|txn| {
            Box::pin(async move {
                let now = Utc::now();

                if adjustment_quantity >= 0 {
                    upsert_available(txn, product_batch_id, location_id, adjustment_quantity, now)
                        .await?;
                } else {
                    // Negative corrections never create rows and may not take
                    // the counter below zero.
                    guarded_decrement_available(
                        txn,
                        product_batch_id,
                        location_id,
                        -adjustment_quantity,
                        now,
                    )
                    .await?;
                }

                let inventory = fetch_inventory(txn, product_batch_id, location_id).await?;
                let movement = insert_movement(
                    txn,
                    MovementType::Adjust,
                    product_batch_id,
                    location_id,
                    adjustment_quantity,
                    reason,
                    note,
                    None,
                    created_by_id,
                    idempotency_key,
                )
                .await?;

                Ok(InventoryMutation {
                    inventory,
                    movement,
                })
            })
        })
        .await
        .map_err(map_txn_err)
    }

    async fn archive_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<inventory::Model, ServiceError> {
        let db = &*self.db;

        db.transaction::<_, inventory::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let now = Utc::now();

                let update = inventory::Entity::update_many()
                    .col_expr(inventory::Column::DeletedAt, Expr::value(Some(now)))
                    .col_expr(inventory::Column::UpdatedAt, Expr::value(now))
                    .filter(inventory::Column::ProductBatchId.eq(product_batch_id))
                    .filter(inventory::Column::LocationId.eq(location_id))
                    .filter(inventory::Column::AvailableQty.eq(0))
                    .filter(inventory::Column::ReservedQty.eq(0))
                    .filter(inventory::Column::DeletedAt.is_null())
                    .exec(txn)
                    .await?;

                if update.rows_affected == 0 {
                    let existing =
                        inventory::Entity::find_by_id((product_batch_id, location_id))
                            .one(txn)
                            .await?;
                    return match existing {
                        None => Err(ServiceError::NotFound(format!(
                            "Inventory not found: ({}, {})",
                            product_batch_id, location_id
                        ))),
                        Some(inv) if inv.deleted_at.is_some() => Ok(inv),
                        Some(inv) => Err(ServiceError::InvalidOperation(format!(
                            "inventory still holds stock: available {}, reserved {}",
                            inv.available_qty, inv.reserved_qty
                        ))),
                    };
                }

                fetch_inventory(txn, product_batch_id, location_id).await
            })
        })
        .await
        .map_err(map_txn_err)
    }
}
