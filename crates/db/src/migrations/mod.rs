//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_webhook_configuration_table;
mod m20250101_000002_create_webhook_execution_history_table;
mod m20250101_000003_add_active_webhook_unique_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_webhook_configuration_table::Migration),
            Box::new(m20250101_000002_create_webhook_execution_history_table::Migration),
            Box::new(m20250101_000003_add_active_webhook_unique_index::Migration),
        ]
    }
}
