use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Earmarks available stock for a pending outbound commitment by moving
/// quantity from `available_qty` to `reserved_qty`.
///
/// Reservations carry no identity of their own beyond the ledger entry; the
/// optional `reference` (an order id, typically) is the only handle a caller
/// gets back.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReserveInventoryCommand {
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
    use rstest::rstest;

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    fn quantity_must_be_positive(#[case] quantity: i32, #[case] ok: bool) {
        let cmd = ReserveInventoryCommand {
            product_batch_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            quantity,
            reference: Some("SO-1001".to_string()),
            created_by_id: None,
            idempotency_key: None,
        };
        assert_eq!(cmd.validate().is_ok(), ok);
    }
}
