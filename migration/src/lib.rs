//! Database migrations for the merchsync service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_catalog_tables;
mod m2025_06_01_000002_create_order_tables;
mod m2025_06_01_000003_create_sync_state;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_catalog_tables::Migration),
            Box::new(m2025_06_01_000002_create_order_tables::Migration),
            Box::new(m2025_06_01_000003_create_sync_state::Migration),
        ]
    }
}
