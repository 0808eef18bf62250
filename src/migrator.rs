use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_product_batches_table::Migration),
            Box::new(m20240101_000002_create_locations_table::Migration),
            Box::new(m20240101_000003_create_users_table::Migration),
            Box::new(m20240101_000004_create_inventory_table::Migration),
            Box::new(m20240101_000005_create_stock_movements_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_product_batches_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_product_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create product_batches table aligned with entities::product_batch Model
            manager
                .create_table(
                    Table::create()
                        .table(ProductBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductBatches::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductBatches::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductBatches::ExpiryDate)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductBatches::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_batches_product_id")
                        .table(ProductBatches::Table)
                        .col(ProductBatches::ProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ProductBatches {
        Table,
        Id,
        ProductId,
        BatchNumber,
        ExpiryDate,
        CreatedAt,
    }
}

mod m20240101_000002_create_locations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_locations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Locations::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Locations::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Locations::Code).string().not_null())
                        .col(ColumnDef::new(Locations::Name).string().null())
                        .col(ColumnDef::new(Locations::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_locations_warehouse_id")
                        .table(Locations::Table)
                        .col(Locations::WarehouseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Locations {
        Table,
        Id,
        WarehouseId,
        Code,
        Name,
        CreatedAt,
    }
}

mod m20240101_000003_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::FullName).string().null())
                        .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        Email,
        FullName,
        CreatedAt,
    }
}

mod m20240101_000004_create_inventory_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_inventory_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Composite primary key: one row per (product_batch_id, location_id)
            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Inventory::ProductBatchId).uuid().not_null())
                        .col(ColumnDef::new(Inventory::LocationId).uuid().not_null())
                        .col(
                            ColumnDef::new(Inventory::AvailableQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::ReservedQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Inventory::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Inventory::UpdatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Inventory::DeletedAt).timestamp().null())
                        .primary_key(
                            Index::create()
                                .col(Inventory::ProductBatchId)
                                .col(Inventory::LocationId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_product_batch_id")
                                .from(Inventory::Table, Inventory::ProductBatchId)
                                .to(
                                    super::m20240101_000001_create_product_batches_table::ProductBatches::Table,
                                    super::m20240101_000001_create_product_batches_table::ProductBatches::Id,
                                )
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_location_id")
                                .from(Inventory::Table, Inventory::LocationId)
                                .to(
                                    super::m20240101_000002_create_locations_table::Locations::Table,
                                    super::m20240101_000002_create_locations_table::Locations::Id,
                                )
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_location_id")
                        .table(Inventory::Table)
                        .col(Inventory::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Inventory {
        Table,
        ProductBatchId,
        LocationId,
        AvailableQty,
        ReservedQty,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240101_000005_create_stock_movements_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ProductBatchId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::LocationId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Reference).string().null())
                        .col(ColumnDef::new(StockMovements::Note).string().null())
                        .col(ColumnDef::new(StockMovements::CorrelationId).uuid().null())
                        .col(ColumnDef::new(StockMovements::CreatedById).uuid().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::IdempotencyKey)
                                .string()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_product_batch_id")
                                .from(StockMovements::Table, StockMovements::ProductBatchId)
                                .to(
                                    super::m20240101_000001_create_product_batches_table::ProductBatches::Table,
                                    super::m20240101_000001_create_product_batches_table::ProductBatches::Id,
                                )
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_location_id")
                                .from(StockMovements::Table, StockMovements::LocationId)
                                .to(
                                    super::m20240101_000002_create_locations_table::Locations::Table,
                                    super::m20240101_000002_create_locations_table::Locations::Id,
                                )
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            // Idempotency-key deduplication is enforced here, at the storage
            // layer: a retried request that races its original collides on
            // this index instead of double-applying.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_idempotency_key")
                        .table(StockMovements::Table)
                        .col(StockMovements::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_batch_location")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductBatchId)
                        .col(StockMovements::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMovements {
        Table,
        Id,
        MovementType,
        ProductBatchId,
        LocationId,
        Quantity,
        Reference,
        Note,
        CorrelationId,
        CreatedById,
        CreatedAt,
        IdempotencyKey,
    }
}
