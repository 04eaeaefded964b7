//! Create webhook configuration table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookConfiguration::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookConfiguration::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WebhookConfiguration::EventCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookConfiguration::Url).text().not_null())
                    .col(
                        ColumnDef::new(WebhookConfiguration::Method)
                            .string_len(8)
                            .not_null()
                            .default("POST"),
                    )
                    .col(
                        ColumnDef::new(WebhookConfiguration::Headers)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(WebhookConfiguration::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(WebhookConfiguration::CreatedBy)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookConfiguration::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(WebhookConfiguration::UpdatedBy).string().null())
                    .col(
                        ColumnDef::new(WebhookConfiguration::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Subscription lookup by event
        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_configuration_event_active")
                    .table(WebhookConfiguration::Table)
                    .col(WebhookConfiguration::EventCode)
                    .col(WebhookConfiguration::IsActive)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookConfiguration::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum WebhookConfiguration {
    Table,
    Id,
    EventCode,
    Url,
    Method,
    Headers,
    IsActive,
    CreatedBy,
    CreatedAt,
    UpdatedBy,
    UpdatedAt,
}
