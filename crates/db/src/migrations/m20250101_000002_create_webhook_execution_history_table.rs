//! Create webhook execution history table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookExecutionHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::WebhookId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::ExecutedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::Success)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::StatusCode)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::Attempt)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::RequestPayload)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::ResponseBody)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(WebhookExecutionHistory::Error).text().null())
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::DurationMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookExecutionHistory::TriggeredBy)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_webhook_execution_history_webhook")
                            .from(
                                WebhookExecutionHistory::Table,
                                WebhookExecutionHistory::WebhookId,
                            )
                            .to(WebhookConfiguration::Table, WebhookConfiguration::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // History pages, stats and last-execution lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_execution_history_webhook_executed")
                    .table(WebhookExecutionHistory::Table)
                    .col(WebhookExecutionHistory::WebhookId)
                    .col(WebhookExecutionHistory::ExecutedAt)
                    .to_owned(),
            )
            .await?;

        // Retention cutoff scans
        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_execution_history_executed_at")
                    .table(WebhookExecutionHistory::Table)
                    .col(WebhookExecutionHistory::ExecutedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookExecutionHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum WebhookExecutionHistory {
    Table,
    Id,
    WebhookId,
    ExecutedAt,
    Success,
    StatusCode,
    Attempt,
    RequestPayload,
    ResponseBody,
    Error,
    DurationMs,
    TriggeredBy,
}

#[derive(Iden)]
pub enum WebhookConfiguration {
    Table,
    Id,
}
