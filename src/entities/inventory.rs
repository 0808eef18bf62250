use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-hand stock for one (product batch, location) pair.
///
/// Both counters are kept non-negative by single-statement conditional
/// updates in the repository layer; this row is never mutated through a
/// read-modify-write in application code.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_batch_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub location_id: Uuid,
    /// Units free to dispatch or reserve.
    pub available_qty: i32,
    /// Units held against a future dispatch.
    pub reserved_qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only once both counters are zero; the row is archived, not dropped.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Total units physically present at the location for this batch.
    pub fn on_hand(&self) -> i32 {
        self.available_qty + self.reserved_qty
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

impl ActiveModelBehavior for ActiveModel {}
