use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::commands::inventory::{
    AdjustInventoryCommand, DispatchInventoryCommand, ReceiveInventoryCommand,
    ReleaseInventoryCommand, ReserveInventoryCommand, TransferInventoryCommand,
};
use crate::entities::stock_movement::MovementType;
use crate::entities::{inventory, stock_movement};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::InventoryRepository;
use crate::services::side_effects::{SideEffectContext, SideEffects, TouchedBalance};

lazy_static! {
    static ref INVENTORY_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "inventory_operations_total",
            "Total number of committed inventory operations"
        ),
        &["operation"]
    )
    .expect("metric can be created");
    static ref INVENTORY_OPERATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "inventory_operation_failures_total",
            "Total number of failed inventory operations"
        ),
        &["operation", "error_type"]
    )
    .expect("metric can be created");
    static ref INVENTORY_IDEMPOTENT_REPLAYS: IntCounter = IntCounter::new(
        "inventory_idempotent_replays_total",
        "Total number of operations answered from an existing idempotency key"
    )
    .expect("metric can be created");
}

fn error_label(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::NotFound(_) => "not_found",
        ServiceError::ValidationError(_) => "validation_error",
        ServiceError::InsufficientStock { .. } => "insufficient_stock",
        ServiceError::InvalidReleaseQuantity { .. } => "invalid_release_quantity",
        ServiceError::DuplicateIdempotencyKey(_) => "duplicate_idempotency_key",
        ServiceError::TransactionAborted(_) => "transaction_aborted",
        ServiceError::DatabaseError(_) => "database_error",
        _ => "internal_error",
    }
}

/// Result of a single-row engine operation.
///
/// `inventory` is absent when the call was answered from an existing
/// idempotency key; the movement is then the original one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryOperationResult {
    pub inventory: Option<inventory::Model>,
    pub movement: stock_movement::Model,
    pub idempotent: bool,
}

/// Result of a transfer. On an idempotent replay only the original
/// TRANSFER_OUT movement is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOperationResult {
    pub from_inventory: Option<inventory::Model>,
    pub to_inventory: Option<inventory::Model>,
    pub transfer_out: stock_movement::Model,
    pub transfer_in: Option<stock_movement::Model>,
    pub idempotent: bool,
}

/// The inventory movement engine.
///
/// Validates inputs, enforces referential checks, orchestrates the atomic
/// repository transactions, answers idempotent replays, and fires post-commit
/// hooks without ever blocking on them. Holds no locks of its own: the
/// repository's guarded single-statement updates are the concurrency control.
#[derive(Clone)]
pub struct InventoryService {
    repo: Arc<dyn InventoryRepository>,
    event_sender: EventSender,
    hooks: Arc<SideEffects>,
}

impl InventoryService {
    /// Creates a new inventory service instance
    pub fn new(
        repo: Arc<dyn InventoryRepository>,
        event_sender: EventSender,
        hooks: Arc<SideEffects>,
    ) -> Self {
        Self {
            repo,
            event_sender,
            hooks,
        }
    }

    /// Receives stock, creating the balance row if this is the first receipt
    /// for the (batch, location) pair. Never fails for lack of stock.
    #[instrument(skip(self))]
    pub async fn receive_inventory(
        &self,
        command: ReceiveInventoryCommand,
    ) -> Result<InventoryOperationResult, ServiceError> {
        const OP: &str = "receive";
        self.validate(OP, &command)?;
        self.ensure_batch_exists(OP, command.product_batch_id)
            .await?;
        self.ensure_location_exists(OP, command.location_id).await?;
        self.ensure_user_exists(OP, command.created_by_id).await?;

        if let Some(replay) = self
            .replay_by_key(command.idempotency_key.as_deref())
            .await?
        {
            return Ok(replay);
        }

        let mutation = match self
            .repo
            .receive_inventory_tx(
                command.product_batch_id,
                command.location_id,
                command.quantity,
                command.created_by_id,
                command.idempotency_key.clone(),
            )
            .await
        {
            Ok(mutation) => mutation,
            Err(ServiceError::DuplicateIdempotencyKey(key)) => {
                return self.resolve_duplicate_key(key).await;
            }
            Err(e) => return Err(self.fail(OP, e)),
        };

        INVENTORY_OPERATIONS.with_label_values(&[OP]).inc();
        info!(
            product_batch_id = %command.product_batch_id,
            location_id = %command.location_id,
            quantity = %command.quantity,
            movement_id = %mutation.movement.id,
            "Inventory received"
        );

        self.emit_event(Event::InventoryReceived {
            product_batch_id: command.product_batch_id,
            location_id: command.location_id,
            quantity: command.quantity,
            movement_id: mutation.movement.id,
        });
        self.hooks.after_commit(SideEffectContext {
            operation: MovementType::Receive,
            actor_id: command.created_by_id,
            touched: vec![TouchedBalance {
                product_batch_id: command.product_batch_id,
                location_id: command.location_id,
                available_qty: mutation.inventory.available_qty,
            }],
            details: json!({
                "product_batch_id": command.product_batch_id,
                "location_id": command.location_id,
                "quantity": command.quantity,
                "movement_id": mutation.movement.id,
            }),
        });

        Ok(InventoryOperationResult {
            inventory: Some(mutation.inventory),
            movement: mutation.movement,
            idempotent: false,
        })
    }

    /// Dispatches stock under the atomic `available_qty >= quantity` guard.
    #[instrument(skip(self))]
    pub async fn dispatch_inventory(
        &self,
        command: DispatchInventoryCommand,
    ) -> Result<InventoryOperationResult, ServiceError> {
        const OP: &str = "dispatch";
        self.validate(OP, &command)?;
        self.ensure_batch_exists(OP, command.product_batch_id)
            .await?;
        self.ensure_location_exists(OP, command.location_id).await?;
        self.ensure_user_exists(OP, command.created_by_id).await?;

        if let Some(replay) = self
            .replay_by_key(command.idempotency_key.as_deref())
            .await?
        {
            return Ok(replay);
        }

        let mutation = match self
            .repo
            .dispatch_inventory_tx(
                command.product_batch_id,
                command.location_id,
                command.quantity,
                command.created_by_id,
                command.idempotency_key.clone(),
            )
            .await
        {
            Ok(mutation) => mutation,
            Err(ServiceError::DuplicateIdempotencyKey(key)) => {
                return self.resolve_duplicate_key(key).await;
            }
            Err(e) => return Err(self.fail(OP, e)),
        };

        INVENTORY_OPERATIONS.with_label_values(&[OP]).inc();
        info!(
            product_batch_id = %command.product_batch_id,
            location_id = %command.location_id,
            quantity = %command.quantity,
            remaining = %mutation.inventory.available_qty,
            "Inventory dispatched"
        );

        self.emit_event(Event::InventoryDispatched {
            product_batch_id: command.product_batch_id,
            location_id: command.location_id,
            quantity: command.quantity,
            movement_id: mutation.movement.id,
        });
        self.hooks.after_commit(SideEffectContext {
            operation: MovementType::Dispatch,
            actor_id: command.created_by_id,
            touched: vec![TouchedBalance {
                product_batch_id: command.product_batch_id,
                location_id: command.location_id,
                available_qty: mutation.inventory.available_qty,
            }],
            details: json!({
                "product_batch_id": command.product_batch_id,
                "location_id": command.location_id,
                "quantity": command.quantity,
                "movement_id": mutation.movement.id,
            }),
        });

        Ok(InventoryOperationResult {
            inventory: Some(mutation.inventory),
            movement: mutation.movement,
            idempotent: false,
        })
    }

    /// Transfers stock between two locations atomically; the linked movement
    /// pair and both balance changes commit or roll back together.
    #[instrument(skip(self))]
    pub async fn transfer_inventory(
        &self,
        command: TransferInventoryCommand,
    ) -> Result<TransferOperationResult, ServiceError> {
        const OP: &str = "transfer";
        self.validate(OP, &command)?;
        self.ensure_batch_exists(OP, command.product_batch_id)
            .await?;
        self.ensure_location_exists(OP, command.from_location_id)
            .await?;
        self.ensure_location_exists(OP, command.to_location_id)
            .await?;
        self.ensure_user_exists(OP, command.created_by_id).await?;

        if let Some(key) = command.idempotency_key.as_deref() {
            if let Some(movement) = self.repo.find_movement_by_idempotency_key(key).await? {
                INVENTORY_IDEMPOTENT_REPLAYS.inc();
                info!(
                    idempotency_key = %key,
                    movement_id = %movement.id,
                    "Transfer replayed from idempotency key"
                );
                return Ok(TransferOperationResult {
                    from_inventory: None,
                    to_inventory: None,
                    transfer_out: movement,
                    transfer_in: None,
                    idempotent: true,
                });
            }
        }

        let mutation = match self
            .repo
            .transfer_inventory_tx(
                command.product_batch_id,
                command.from_location_id,
                command.to_location_id,
                command.quantity,
                command.created_by_id,
                command.idempotency_key.clone(),
                command.note.clone(),
            )
            .await
        {
            Ok(mutation) => mutation,
            Err(ServiceError::DuplicateIdempotencyKey(key)) => {
                let movement = self.require_movement_for_key(key).await?;
                INVENTORY_IDEMPOTENT_REPLAYS.inc();
                return Ok(TransferOperationResult {
                    from_inventory: None,
                    to_inventory: None,
                    transfer_out: movement,
                    transfer_in: None,
                    idempotent: true,
                });
            }
            Err(e) => return Err(self.fail(OP, e)),
        };

        INVENTORY_OPERATIONS.with_label_values(&[OP]).inc();
        info!(
            product_batch_id = %command.product_batch_id,
            from_location_id = %command.from_location_id,
            to_location_id = %command.to_location_id,
            quantity = %command.quantity,
            "Inventory transferred"
        );

        let correlation_id = mutation
            .transfer_out
            .correlation_id
            .unwrap_or(mutation.transfer_out.id);
        self.emit_event(Event::InventoryTransferred {
            product_batch_id: command.product_batch_id,
            from_location_id: command.from_location_id,
            to_location_id: command.to_location_id,
            quantity: command.quantity,
            correlation_id,
        });
        self.hooks.after_commit(SideEffectContext {
            operation: MovementType::TransferOut,
            actor_id: command.created_by_id,
            touched: vec![
                TouchedBalance {
                    product_batch_id: command.product_batch_id,
                    location_id: command.from_location_id,
                    available_qty: mutation.from_inventory.available_qty,
                },
                TouchedBalance {
                    product_batch_id: command.product_batch_id,
                    location_id: command.to_location_id,
                    available_qty: mutation.to_inventory.available_qty,
                },
            ],
            details: json!({
                "product_batch_id": command.product_batch_id,
                "from_location_id": command.from_location_id,
                "to_location_id": command.to_location_id,
                "quantity": command.quantity,
                "correlation_id": correlation_id,
            }),
        });

        Ok(TransferOperationResult {
            from_inventory: Some(mutation.from_inventory),
            to_inventory: Some(mutation.to_inventory),
            transfer_out: mutation.transfer_out,
            transfer_in: Some(mutation.transfer_in),
            idempotent: false,
        })
    }

    /// Reserves stock by moving quantity from available to reserved under the
    /// `available_qty >= quantity` guard.
    #[instrument(skip(self))]
    pub async fn reserve_inventory(
        &self,
        command: ReserveInventoryCommand,
    ) -> Result<InventoryOperationResult, ServiceError> {
        const OP: &str = "reserve";
        self.validate(OP, &command)?;
        self.ensure_batch_exists(OP, command.product_batch_id)
            .await?;
        self.ensure_location_exists(OP, command.location_id).await?;
        self.ensure_user_exists(OP, command.created_by_id).await?;

        if let Some(replay) = self
            .replay_by_key(command.idempotency_key.as_deref())
            .await?
        {
            return Ok(replay);
        }

        let mutation = match self
            .repo
            .reserve_inventory_tx(
                command.product_batch_id,
                command.location_id,
                command.quantity,
                command.reference.clone(),
                command.created_by_id,
                command.idempotency_key.clone(),
            )
            .await
        {
            Ok(mutation) => mutation,
            Err(ServiceError::DuplicateIdempotencyKey(key)) => {
                return self.resolve_duplicate_key(key).await;
            }
            Err(e) => return Err(self.fail(OP, e)),
        };

        INVENTORY_OPERATIONS.with_label_values(&[OP]).inc();
        info!(
            product_batch_id = %command.product_batch_id,
            location_id = %command.location_id,
            quantity = %command.quantity,
            reference = ?command.reference,
            "Inventory reserved"
        );

        self.emit_event(Event::InventoryReserved {
            product_batch_id: command.product_batch_id,
            location_id: command.location_id,
            quantity: command.quantity,
            reference: command.reference.clone(),
        });
        self.hooks.after_commit(SideEffectContext {
            operation: MovementType::Reserve,
            actor_id: command.created_by_id,
            touched: vec![TouchedBalance {
                product_batch_id: command.product_batch_id,
                location_id: command.location_id,
                available_qty: mutation.inventory.available_qty,
            }],
            details: json!({
                "product_batch_id": command.product_batch_id,
                "location_id": command.location_id,
                "quantity": command.quantity,
                "reference": command.reference,
            }),
        });

        Ok(InventoryOperationResult {
            inventory: Some(mutation.inventory),
            movement: mutation.movement,
            idempotent: false,
        })
    }

    /// Releases previously reserved stock back to the available pool under
    /// the `reserved_qty >= quantity` guard.
    #[instrument(skip(self))]
    pub async fn release_inventory(
        &self,
        command: ReleaseInventoryCommand,
    ) -> Result<InventoryOperationResult, ServiceError> {
        const OP: &str = "release";
        self.validate(OP, &command)?;
        self.ensure_batch_exists(OP, command.product_batch_id)
            .await?;
        self.ensure_location_exists(OP, command.location_id).await?;
        self.ensure_user_exists(OP, command.created_by_id).await?;

        if let Some(replay) = self
            .replay_by_key(command.idempotency_key.as_deref())
            .await?
        {
            return Ok(replay);
        }

        let mutation = match self
            .repo
            .release_inventory_tx(
                command.product_batch_id,
                command.location_id,
                command.quantity,
                command.reference.clone(),
                command.created_by_id,
                command.idempotency_key.clone(),
            )
            .await
        {
            Ok(mutation) => mutation,
            Err(ServiceError::DuplicateIdempotencyKey(key)) => {
                return self.resolve_duplicate_key(key).await;
            }
            Err(e) => return Err(self.fail(OP, e)),
        };

        INVENTORY_OPERATIONS.with_label_values(&[OP]).inc();
        info!(
            product_batch_id = %command.product_batch_id,
            location_id = %command.location_id,
            quantity = %command.quantity,
            "Reservation released"
        );

        self.emit_event(Event::InventoryReleased {
            product_batch_id: command.product_batch_id,
            location_id: command.location_id,
            quantity: command.quantity,
            reference: command.reference.clone(),
        });
        self.hooks.after_commit(SideEffectContext {
            operation: MovementType::Release,
            actor_id: command.created_by_id,
            touched: vec![TouchedBalance {
                product_batch_id: command.product_batch_id,
                location_id: command.location_id,
                available_qty: mutation.inventory.available_qty,
            }],
            details: json!({
                "product_batch_id": command.product_batch_id,
                "location_id": command.location_id,
                "quantity": command.quantity,
                "reference": command.reference,
            }),
        });

        Ok(InventoryOperationResult {
            inventory: Some(mutation.inventory),
            movement: mutation.movement,
            idempotent: false,
        })
    }

    /// Applies an administrative stock-count correction. Intended for
    /// reconciliation, not the normal receive/dispatch flow.
    #[instrument(skip(self))]
    pub async fn adjust_inventory(
        &self,
        command: AdjustInventoryCommand,
    ) -> Result<InventoryOperationResult, ServiceError> {
        const OP: &str = "adjust";
        self.validate(OP, &command)?;
        self.ensure_batch_exists(OP, command.product_batch_id)
            .await?;
        self.ensure_location_exists(OP, command.location_id).await?;
        self.ensure_user_exists(OP, command.created_by_id).await?;

        if let Some(replay) = self
            .replay_by_key(command.idempotency_key.as_deref())
            .await?
        {
            return Ok(replay);
        }

        let mutation = match self
            .repo
            .adjust_inventory_tx(
                command.product_batch_id,
                command.location_id,
                command.adjustment_quantity,
                command.created_by_id,
                command.idempotency_key.clone(),
                command.reason.clone(),
                command.note.clone(),
            )
            .await
        {
            Ok(mutation) => mutation,
            Err(ServiceError::DuplicateIdempotencyKey(key)) => {
                return self.resolve_duplicate_key(key).await;
            }
            Err(e) => return Err(self.fail(OP, e)),
        };

        INVENTORY_OPERATIONS.with_label_values(&[OP]).inc();
        info!(
            product_batch_id = %command.product_batch_id,
            location_id = %command.location_id,
            adjustment_quantity = %command.adjustment_quantity,
            new_available = %mutation.inventory.available_qty,
            reason = ?command.reason,
            "Inventory adjusted"
        );

        self.emit_event(Event::InventoryAdjusted {
            product_batch_id: command.product_batch_id,
            location_id: command.location_id,
            adjustment_quantity: command.adjustment_quantity,
            new_available_qty: mutation.inventory.available_qty,
            reason: command.reason.clone(),
        });
        self.hooks.after_commit(SideEffectContext {
            operation: MovementType::Adjust,
            actor_id: command.created_by_id,
            touched: vec![TouchedBalance {
                product_batch_id: command.product_batch_id,
                location_id: command.location_id,
                available_qty: mutation.inventory.available_qty,
            }],
            details: json!({
                "product_batch_id": command.product_batch_id,
                "location_id": command.location_id,
                "adjustment_quantity": command.adjustment_quantity,
                "reason": command.reason,
            }),
        });

        Ok(InventoryOperationResult {
            inventory: Some(mutation.inventory),
            movement: mutation.movement,
            idempotent: false,
        })
    }

    /// Archives a balance row once both counters are zero. The row is never
    /// hard-deleted while any quantity remains.
    #[instrument(skip(self))]
    pub async fn archive_inventory(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<inventory::Model, ServiceError> {
        self.repo
            .archive_inventory_tx(product_batch_id, location_id)
            .await
            .map_err(|e| self.fail("archive", e))
    }

    /// Gets the balance row for a (batch, location) pair.
    #[instrument(skip(self))]
    pub async fn get_inventory(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<inventory::Model>, ServiceError> {
        self.repo
            .find_inventory(product_batch_id, location_id)
            .await
    }

    /// Checks whether at least `quantity` units are free to dispatch. A
    /// convenience read; the authoritative check is the guard inside the
    /// mutation itself.
    #[instrument(skip(self))]
    pub async fn is_in_stock(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        let inventory = self.get_inventory(product_batch_id, location_id).await?;

        match inventory {
            Some(inv) => Ok(inv.available_qty >= quantity),
            None => Ok(false),
        }
    }

    fn validate<C: Validate + std::fmt::Debug>(
        &self,
        op: &str,
        command: &C,
    ) -> Result<(), ServiceError> {
        command.validate().map_err(|e| {
            INVENTORY_OPERATION_FAILURES
                .with_label_values(&[op, "validation_error"])
                .inc();
            let msg = format!("Invalid input: {}", e);
            warn!(operation = %op, "{}", msg);
            ServiceError::ValidationError(msg)
        })
    }

    async fn ensure_batch_exists(&self, op: &str, id: Uuid) -> Result<(), ServiceError> {
        if self.repo.find_product_batch(id).await?.is_none() {
            return Err(self.fail(
                op,
                ServiceError::NotFound(format!("ProductBatch not found: {}", id)),
            ));
        }
        Ok(())
    }

    async fn ensure_location_exists(&self, op: &str, id: Uuid) -> Result<(), ServiceError> {
        if self.repo.find_location(id).await?.is_none() {
            return Err(self.fail(
                op,
                ServiceError::NotFound(format!("Location not found: {}", id)),
            ));
        }
        Ok(())
    }

    async fn ensure_user_exists(&self, op: &str, id: Option<Uuid>) -> Result<(), ServiceError> {
        if let Some(id) = id {
            if self.repo.find_user(id).await?.is_none() {
                return Err(
                    self.fail(op, ServiceError::NotFound(format!("User not found: {}", id)))
                );
            }
        }
        Ok(())
    }

    /// Pre-commit idempotency short circuit: an existing movement under this
    /// key answers the request without touching any balance.
    async fn replay_by_key(
        &self,
        key: Option<&str>,
    ) -> Result<Option<InventoryOperationResult>, ServiceError> {
        let Some(key) = key else { return Ok(None) };

        if let Some(movement) = self.repo.find_movement_by_idempotency_key(key).await? {
            INVENTORY_IDEMPOTENT_REPLAYS.inc();
            info!(
                idempotency_key = %key,
                movement_id = %movement.id,
                "Operation replayed from idempotency key"
            );
            return Ok(Some(InventoryOperationResult {
                inventory: None,
                movement,
                idempotent: true,
            }));
        }

        Ok(None)
    }

    /// A concurrent retry won the insert race; its movement is the result.
    async fn resolve_duplicate_key(
        &self,
        key: String,
    ) -> Result<InventoryOperationResult, ServiceError> {
        let movement = self.require_movement_for_key(key).await?;
        INVENTORY_IDEMPOTENT_REPLAYS.inc();
        Ok(InventoryOperationResult {
            inventory: None,
            movement,
            idempotent: true,
        })
    }

    async fn require_movement_for_key(
        &self,
        key: String,
    ) -> Result<stock_movement::Model, ServiceError> {
        self.repo
            .find_movement_by_idempotency_key(&key)
            .await?
            .ok_or(ServiceError::DuplicateIdempotencyKey(key))
    }

    fn fail(&self, op: &str, err: ServiceError) -> ServiceError {
        INVENTORY_OPERATION_FAILURES
            .with_label_values(&[op, error_label(&err)])
            .inc();
        err
    }

    /// Event emission is a post-commit side effect like the hooks: spawned,
    /// logged on failure, never surfaced.
    fn emit_event(&self, event: Event) {
        let sender = self.event_sender.clone();
        tokio::spawn(async move {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to publish domain event");
            }
        });
    }
}
