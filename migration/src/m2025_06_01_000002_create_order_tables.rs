//! Migration to create the transactional order tables.
//!
//! Orders are keyed by their upstream id; line items have no independent
//! global identity and use a composite primary key of (order_id, line_uid).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Orders::LocationId).text().null())
                    .col(
                        ColumnDef::new(Orders::State)
                            .text()
                            .not_null()
                            .default("OPEN"),
                    )
                    .col(ColumnDef::new(Orders::TotalAmount).big_integer().null())
                    .col(ColumnDef::new(Orders::TotalCurrency).text().null())
                    .col(
                        ColumnDef::new(Orders::CreatedAtUpstream)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::ClosedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Date-range scans during backfill and incremental order sync
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_created_at_upstream")
                    .table(Orders::Table)
                    .col(Orders::CreatedAtUpstream)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_location_state")
                    .table(Orders::Table)
                    .col(Orders::LocationId)
                    .col(Orders::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderLineItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderLineItems::OrderId).text().not_null())
                    .col(ColumnDef::new(OrderLineItems::LineUid).text().not_null())
                    .col(ColumnDef::new(OrderLineItems::ItemName).text().null())
                    .col(ColumnDef::new(OrderLineItems::VariationId).text().null())
                    .col(
                        ColumnDef::new(OrderLineItems::Quantity)
                            .text()
                            .not_null()
                            .default("1"),
                    )
                    .col(
                        ColumnDef::new(OrderLineItems::BasePriceAmount)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderLineItems::TotalAmount)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderLineItems::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OrderLineItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(OrderLineItems::OrderId)
                            .col(OrderLineItems::LineUid),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_line_items_order_id")
                            .from(OrderLineItems::Table, OrderLineItems::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderLineItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    LocationId,
    State,
    TotalAmount,
    TotalCurrency,
    CreatedAtUpstream,
    ClosedAt,
    IsDeleted,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderLineItems {
    Table,
    OrderId,
    LineUid,
    ItemName,
    VariationId,
    Quantity,
    BasePriceAmount,
    TotalAmount,
    IsDeleted,
    UpdatedAt,
}
