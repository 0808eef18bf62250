use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Administrative stock-count correction. Applies a signed delta to
/// `available_qty` and records it as an ADJUST movement; not part of the
/// normal receive/dispatch flow.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_nonzero_adjustment"))]
pub struct AdjustInventoryCommand {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
    /// Signed delta; a negative value may not take the counter below zero.
    pub adjustment_quantity: i32,
    #[validate(length(min = 1, max = 255))]
    pub reason: Option<String>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    pub created_by_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: Option<String>,
}

fn validate_nonzero_adjustment(cmd: &AdjustInventoryCommand) -> Result<(), ValidationError> {
    if cmd.adjustment_quantity == 0 {
        return Err(ValidationError::new("adjustment quantity must not be zero"));
    }
    Ok(())
}
