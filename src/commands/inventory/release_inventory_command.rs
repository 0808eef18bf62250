use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Returns previously reserved stock to the available pool.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReleaseInventoryCommand {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Order id or similar caller-side correlation value.
    #[validate(length(min = 1, max = 255))]
    pub reference: Option<String>,
    pub created_by_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_quantity() {
        let cmd = ReleaseInventoryCommand {
            product_batch_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            quantity: -2,
            reference: None,
            created_by_id: None,
            idempotency_key: None,
        };
        assert!(cmd.validate().is_err());
    }
}
