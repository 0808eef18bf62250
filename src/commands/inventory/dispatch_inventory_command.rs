use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Dispatches stock out of a location against the `available_qty` guard.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchInventoryCommand {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub created_by_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false)]
    #[case(-1, false)]
    #[case(1, true)]
    #[case(10_000, true)]
    fn quantity_must_be_positive(#[case] quantity: i32, #[case] ok: bool) {
        let cmd = DispatchInventoryCommand {
            product_batch_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            quantity,
            created_by_id: None,
            idempotency_key: None,
        };
        assert_eq!(cmd.validate().is_ok(), ok);
    }
}
