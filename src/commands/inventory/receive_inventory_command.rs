use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Receives stock into a location, creating the balance row if absent.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiveInventoryCommand {
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

    fn command(quantity: i32) -> ReceiveInventoryCommand {
        ReceiveInventoryCommand {
            product_batch_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            quantity,
            created_by_id: None,
            idempotency_key: None,
        }
    }

    #[rstest]
    #[case(0)]
    #[case(-5)]
    fn rejects_non_positive_quantity(#[case] quantity: i32) {
        assert!(command(quantity).validate().is_err());
    }

    #[test]
    fn accepts_positive_quantity() {
        assert!(command(1).validate().is_ok());
    }

    #[test]
    fn rejects_empty_idempotency_key() {
        let mut cmd = command(5);
        cmd.idempotency_key = Some(String::new());
        assert!(cmd.validate().is_err());
    }
}
