use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of ledger entry a stock movement records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    Receive,
    Dispatch,
    TransferOut,
    TransferIn,
    Reserve,
    Release,
    Adjust,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Receive => "RECEIVE",
            MovementType::Dispatch => "DISPATCH",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::Reserve => "RESERVE",
            MovementType::Release => "RELEASE",
            MovementType::Adjust => "ADJUST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RECEIVE" => Some(MovementType::Receive),
            "DISPATCH" => Some(MovementType::Dispatch),
            "TRANSFER_OUT" => Some(MovementType::TransferOut),
            "TRANSFER_IN" => Some(MovementType::TransferIn),
            "RESERVE" => Some(MovementType::Reserve),
            "RELEASE" => Some(MovementType::Release),
            "ADJUST" => Some(MovementType::Adjust),
            _ => None,
        }
    }
}

/// Append-only ledger entry. Created exactly once per successful logical
/// operation, never mutated or deleted. A transfer writes a linked
/// TRANSFER_OUT/TRANSFER_IN pair sharing `correlation_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Storing as string in DB, converted to/from `MovementType`.
    pub movement_type: String,
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
    /// Positive for all types except ADJUST, which records the signed delta.
    pub quantity: i32,
    /// Free-form reference: order id for reservations, reason for adjustments.
    pub reference: Option<String>,
    pub note: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

impl Model {
    pub fn movement_type(&self) -> Option<MovementType> {
        MovementType::from_str(&self.movement_type)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_batch::Entity",
        from = "Column::ProductBatchId",
        to = "super::product_batch::Column::Id"
    )]
    ProductBatch,
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::product_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductBatch.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_round_trips_through_storage_form() {
        for mt in [
            MovementType::Receive,
            MovementType::Dispatch,
            MovementType::TransferOut,
            MovementType::TransferIn,
            MovementType::Reserve,
            MovementType::Release,
            MovementType::Adjust,
        ] {
            assert_eq!(MovementType::from_str(mt.as_str()), Some(mt));
        }
        assert_eq!(MovementType::from_str("CYCLE_COUNT"), None);
    }
}
