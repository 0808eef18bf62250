#![allow(dead_code)]

//! Shared test harness: an in-memory stock ledger whose guarded mutations run
//! atomically under one lock, standing in for the store's single-statement
//! conditional updates.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use warehouse_api::cache::InMemoryCache;
use warehouse_api::entities::stock_movement::MovementType;
use warehouse_api::entities::{inventory, location, product_batch, stock_movement, user};
use warehouse_api::errors::ServiceError;
use warehouse_api::events::{event_channel, process_events};
use warehouse_api::repositories::{InventoryMutation, InventoryRepository, TransferMutation};
use warehouse_api::services::{InventoryService, SideEffects};

#[derive(Default)]
struct State {
    batches: HashSet<Uuid>,
    locations: HashSet<Uuid>,
    users: HashSet<Uuid>,
    balances: HashMap<(Uuid, Uuid), inventory::Model>,
    movements: Vec<stock_movement::Model>,
}

impl State {
    fn movement_with_key(&self, key: &str) -> Option<stock_movement::Model> {
        self.movements
            .iter()
            .find(|m| m.idempotency_key.as_deref() == Some(key))
            .cloned()
    }

    /// Enforces the idempotency-key unique constraint the way the store's
    /// index would: the whole logical transaction fails, leaving no state.
    fn check_key_free(&self, key: &Option<String>) -> Result<(), ServiceError> {
        if let Some(key) = key {
            if self.movement_with_key(key).is_some() {
                return Err(ServiceError::DuplicateIdempotencyKey(key.clone()));
            }
        }
        Ok(())
    }

    fn upsert_available(&mut self, batch: Uuid, location: Uuid, quantity: i32) {
        let now = Utc::now();
        let entry = self
            .balances
            .entry((batch, location))
            .or_insert_with(|| inventory::Model {
                product_batch_id: batch,
                location_id: location,
                available_qty: 0,
                reserved_qty: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            });
        entry.available_qty += quantity;
        entry.updated_at = now;
        entry.deleted_at = None;
    }

    fn available(&self, batch: Uuid, location: Uuid) -> i32 {
        self.balances
            .get(&(batch, location))
            .map(|b| b.available_qty)
            .unwrap_or(0)
    }

    fn reserved(&self, batch: Uuid, location: Uuid) -> i32 {
        self.balances
            .get(&(batch, location))
            .map(|b| b.reserved_qty)
            .unwrap_or(0)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_movement(
        &mut self,
        movement_type: MovementType,
        batch: Uuid,
        location: Uuid,
        quantity: i32,
        reference: Option<String>,
        note: Option<String>,
        correlation_id: Option<Uuid>,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> stock_movement::Model {
        let movement = stock_movement::Model {
            id: Uuid::new_v4(),
            movement_type: movement_type.as_str().to_string(),
            product_batch_id: batch,
            location_id: location,
            quantity,
            reference,
            note,
            correlation_id,
            created_by_id,
            created_at: Utc::now(),
            idempotency_key,
        };
        self.movements.push(movement.clone());
        movement
    }
}

/// In-memory repository. Each `*_tx` method takes the lock once and performs
/// its guard, mutation and ledger insert inside it, emulating the store
/// evaluating a conditional update against the latest committed value.
pub struct InMemoryInventoryRepository {
    state: Mutex<State>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn seed_batch(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().batches.insert(id);
        id
    }

    pub fn seed_location(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().locations.insert(id);
        id
    }

    pub fn seed_user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().users.insert(id);
        id
    }

    /// Seeds a balance row directly, bypassing the ledger. Tests that assert
    /// ledger reconciliation should seed through `receive_inventory` instead.
    pub fn set_balance(&self, batch: Uuid, location: Uuid, available: i32, reserved: i32) {
        let now = Utc::now();
        self.state.lock().unwrap().balances.insert(
            (batch, location),
            inventory::Model {
                product_batch_id: batch,
                location_id: location,
                available_qty: available,
                reserved_qty: reserved,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        );
    }

    pub fn balance(&self, batch: Uuid, location: Uuid) -> (i32, i32) {
        let state = self.state.lock().unwrap();
        (state.available(batch, location), state.reserved(batch, location))
    }

    pub fn movement_count(&self) -> usize {
        self.state.lock().unwrap().movements.len()
    }

    pub fn movements(&self, batch: Uuid, location: Uuid) -> Vec<stock_movement::Model> {
        self.state
            .lock()
            .unwrap()
            .movements
            .iter()
            .filter(|m| m.product_batch_id == batch && m.location_id == location)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryInventoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn find_product_batch(
        &self,
        id: Uuid,
    ) -> Result<Option<product_batch::Model>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.batches.contains(&id).then(|| product_batch::Model {
            id,
            product_id: Uuid::new_v4(),
            batch_number: format!("BATCH-{}", &id.to_string()[..8]),
            expiry_date: None,
            created_at: Utc::now(),
        }))
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<location::Model>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.locations.contains(&id).then(|| location::Model {
            id,
            warehouse_id: Uuid::new_v4(),
            code: format!("LOC-{}", &id.to_string()[..8]),
            name: None,
            created_at: Utc::now(),
        }))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.contains(&id).then(|| user::Model {
            id,
            email: format!("{}@example.com", &id.to_string()[..8]),
            full_name: None,
            created_at: Utc::now(),
        }))
    }

    async fn find_inventory(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<inventory::Model>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.balances.get(&(product_batch_id, location_id)).cloned())
    }

    async fn find_movement_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<stock_movement::Model>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.movement_with_key(key))
    }

    async fn movements_for(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        Ok(self.movements(product_batch_id, location_id))
    }

    async fn receive_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.check_key_free(&idempotency_key)?;

        state.upsert_available(product_batch_id, location_id, quantity);
        let inventory = state.balances[&(product_batch_id, location_id)].clone();
        let movement = state.push_movement(
            MovementType::Receive,
            product_batch_id,
            location_id,
            quantity,
            None,
            None,
            None,
            created_by_id,
            idempotency_key,
        );

        Ok(InventoryMutation {
            inventory,
            movement,
        })
    }

    async fn dispatch_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        created_by_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<InventoryMutation, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.check_key_free(&idempotency_key)?;

        let available = state.available(product_batch_id, location_id);
        if available < quantity {
            return Err(ServiceError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        let entry = state
            .balances
            .get_mut(&(product_batch_id, location_id))
            .expect("guard passed, row exists");
        entry.available_qty -= quantity;
        entry.updated_at = Utc::now();

        let inventory = state.balances[&(product_batch_id, location_id)].clone();
        let movement = state.push_movement(
            MovementType::Dispatch,
            product_batch_id,
            location_id,
            quantity,
            None,
            None,
            None,
            created_by_id,
            idempotency_key,
        );

        Ok(InventoryMutation {
            inventory,
            movement,
        })
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
        let mut state = self.state.lock().unwrap();
        state.check_key_free(&idempotency_key)?;

        let available = state.available(product_batch_id, from_location_id);
        if available < quantity {
            return Err(ServiceError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        let entry = state
            .balances
            .get_mut(&(product_batch_id, from_location_id))
            .expect("guard passed, row exists");
        entry.available_qty -= quantity;
        entry.updated_at = Utc::now();
        state.upsert_available(product_batch_id, to_location_id, quantity);

        let from_inventory = state.balances[&(product_batch_id, from_location_id)].clone();
        let to_inventory = state.balances[&(product_batch_id, to_location_id)].clone();

        let correlation_id = Uuid::new_v4();
        let transfer_out = state.push_movement(
            MovementType::TransferOut,
            product_batch_id,
            from_location_id,
            quantity,
            None,
            note.clone(),
            Some(correlation_id),
            created_by_id,
            idempotency_key,
        );
        let transfer_in = state.push_movement(
            MovementType::TransferIn,
            product_batch_id,
            to_location_id,
            quantity,
            None,
            note,
            Some(correlation_id),
            created_by_id,
            None,
        );

        Ok(TransferMutation {
            from_inventory,
            to_inventory,
            transfer_out,
            transfer_in,
        })
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
        let mut state = self.state.lock().unwrap();
        state.check_key_free(&idempotency_key)?;

        let available = state.available(product_batch_id, location_id);
        if available < quantity {
            return Err(ServiceError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        let entry = state
            .balances
            .get_mut(&(product_batch_id, location_id))
            .expect("guard passed, row exists");
        entry.available_qty -= quantity;
        entry.reserved_qty += quantity;
        entry.updated_at = Utc::now();

        let inventory = state.balances[&(product_batch_id, location_id)].clone();
        let movement = state.push_movement(
            MovementType::Reserve,
            product_batch_id,
            location_id,
            quantity,
            reference,
            None,
            None,
            created_by_id,
            idempotency_key,
        );

        Ok(InventoryMutation {
            inventory,
            movement,
        })
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
        let mut state = self.state.lock().unwrap();
        state.check_key_free(&idempotency_key)?;

        let reserved = state.reserved(product_batch_id, location_id);
        if reserved < quantity {
            return Err(ServiceError::InvalidReleaseQuantity {
                requested: quantity,
                reserved,
            });
        }

        let entry = state
            .balances
            .get_mut(&(product_batch_id, location_id))
            .expect("guard passed, row exists");
        entry.available_qty += quantity;
        entry.reserved_qty -= quantity;
        entry.updated_at = Utc::now();

        let inventory = state.balances[&(product_batch_id, location_id)].clone();
        let movement = state.push_movement(
            MovementType::Release,
            product_batch_id,
            location_id,
            quantity,
            reference,
            None,
            None,
            created_by_id,
            idempotency_key,
        );

        Ok(InventoryMutation {
            inventory,
            movement,
        })
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
        let mut state = self.state.lock().unwrap();
        state.check_key_free(&idempotency_key)?;

        if adjustment_quantity >= 0 {
            state.upsert_available(product_batch_id, location_id, adjustment_quantity);
        } else {
            let available = state.available(product_batch_id, location_id);
            if available < -adjustment_quantity {
                return Err(ServiceError::InsufficientStock {
                    requested: -adjustment_quantity,
                    available,
                });
            }
            let entry = state
                .balances
                .get_mut(&(product_batch_id, location_id))
                .expect("guard passed, row exists");
            entry.available_qty += adjustment_quantity;
            entry.updated_at = Utc::now();
        }

        let inventory = state.balances[&(product_batch_id, location_id)].clone();
        let movement = state.push_movement(
            MovementType::Adjust,
            product_batch_id,
            location_id,
            adjustment_quantity,
            reason,
            note,
            None,
            created_by_id,
            idempotency_key,
        );

        Ok(InventoryMutation {
            inventory,
            movement,
        })
    }

    async fn archive_inventory_tx(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<inventory::Model, ServiceError> {
        let mut state = self.state.lock().unwrap();

        let entry = state
            .balances
            .get_mut(&(product_batch_id, location_id))
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Inventory not found: ({}, {})",
                    product_batch_id, location_id
                ))
            })?;

        if entry.deleted_at.is_some() {
            return Ok(entry.clone());
        }
        if entry.available_qty != 0 || entry.reserved_qty != 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "inventory still holds stock: available {}, reserved {}",
                entry.available_qty, entry.reserved_qty
            )));
        }

        let now = Utc::now();
        entry.deleted_at = Some(now);
        entry.updated_at = now;
        Ok(entry.clone())
    }
}

/// Builds an engine over the given repository with the standard hook wiring
/// and a draining event consumer.
pub fn build_service(repo: Arc<InMemoryInventoryRepository>) -> InventoryService {
    let (sender, rx) = event_channel(256);
    tokio::spawn(process_events(rx));

    let hooks = Arc::new(SideEffects::standard(
        Arc::new(InMemoryCache::new()),
        sender.clone(),
        10,
        slog::Logger::root(slog::Discard, slog::o!()),
    ));

    InventoryService::new(repo, sender, hooks)
}
