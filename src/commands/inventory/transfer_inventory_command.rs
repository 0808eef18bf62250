use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Moves stock between two locations as one transaction: a guarded decrement
/// at the source and an upsert at the destination, with a linked
/// TRANSFER_OUT/TRANSFER_IN movement pair.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_distinct_locations"))]
pub struct TransferInventoryCommand {
    pub product_batch_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub created_by_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: Option<String>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

fn validate_distinct_locations(cmd: &TransferInventoryCommand) -> Result<(), ValidationError> {
    if cmd.from_location_id == cmd.to_location_id {
        return Err(ValidationError::new(
            "source and destination locations must be different",
        ));
    }
    Ok(())
}
