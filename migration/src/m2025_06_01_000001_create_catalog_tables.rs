//! Migration to create the catalog reference tables.
//!
//! Creates locations, categories, items, variations, inventory_records, and
//! vendors. All catalog rows carry an upstream-assigned text id, a soft-delete
//! flag, and an updated_at timestamp.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Locations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Locations::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Locations::Name).text().not_null())
                    .col(ColumnDef::new(Locations::Address).text().null())
                    .col(ColumnDef::new(Locations::Timezone).text().null())
                    .col(
                        ColumnDef::new(Locations::Status)
                            .text()
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Locations::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Locations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).text().not_null())
                    .col(ColumnDef::new(Categories::ParentCategoryId).text().null())
                    .col(
                        ColumnDef::new(Categories::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Categories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Items::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Items::Name).text().not_null())
                    .col(ColumnDef::new(Items::Description).text().null())
                    .col(ColumnDef::new(Items::CategoryId).text().null())
                    .col(
                        ColumnDef::new(Items::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Items::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_items_category_id")
                    .table(Items::Table)
                    .col(Items::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Variations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Variations::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Variations::ItemId).text().not_null())
                    .col(ColumnDef::new(Variations::Name).text().not_null())
                    .col(ColumnDef::new(Variations::Sku).text().null())
                    .col(ColumnDef::new(Variations::PriceAmount).big_integer().null())
                    .col(ColumnDef::new(Variations::PriceCurrency).text().null())
                    .col(
                        ColumnDef::new(Variations::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Variations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_variations_item_id")
                            .from(Variations::Table, Variations::ItemId)
                            .to(Items::Table, Items::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_variations_item_id")
                    .table(Variations::Table)
                    .col(Variations::ItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InventoryRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::VariationId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::LocationId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::Quantity)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::State)
                            .text()
                            .not_null()
                            .default("IN_STOCK"),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inventory_records_variation_id")
                            .from(InventoryRecords::Table, InventoryRecords::VariationId)
                            .to(Variations::Table, Variations::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inventory_records_location_id")
                            .from(InventoryRecords::Table, InventoryRecords::LocationId)
                            .to(Locations::Table, Locations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One inventory row per (variation, location) pair
        manager
            .create_index(
                Index::create()
                    .name("idx_inventory_records_variation_location")
                    .table(InventoryRecords::Table)
                    .col(InventoryRecords::VariationId)
                    .col(InventoryRecords::LocationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vendors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Vendors::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Vendors::Name).text().not_null())
                    .col(ColumnDef::new(Vendors::ContactEmail).text().null())
                    .col(
                        ColumnDef::new(Vendors::Status)
                            .text()
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Vendors::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Vendors::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Variations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vendors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Locations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Locations {
    Table,
    Id,
    Name,
    Address,
    Timezone,
    Status,
    IsDeleted,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    ParentCategoryId,
    IsDeleted,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
    Name,
    Description,
    CategoryId,
    IsDeleted,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Variations {
    Table,
    Id,
    ItemId,
    Name,
    Sku,
    PriceAmount,
    PriceCurrency,
    IsDeleted,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum InventoryRecords {
    Table,
    Id,
    VariationId,
    LocationId,
    Quantity,
    State,
    IsDeleted,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Vendors {
    Table,
    Id,
    Name,
    ContactEmail,
    Status,
    IsDeleted,
    UpdatedAt,
}
