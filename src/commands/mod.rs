//! Typed inputs for engine operations.
//!
//! Each command is a plain validated value; `services::InventoryService`
//! executes it. Validation failures surface as
//! `ServiceError::ValidationError` before any store round trip.

pub mod inventory;
