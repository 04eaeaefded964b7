//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `backoffice_test`)
//!   `TEST_DB_PASSWORD` (default: `backoffice_test`)
//!   `TEST_DB_NAME` (default: `backoffice_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use backoffice_common::{AppError, IdGenerator, PageRequest};
use backoffice_db::entities::{webhook, webhook::HttpMethod, webhook_execution};
use backoffice_db::repositories::{WebhookExecutionRepository, WebhookRepository};
use backoffice_db::test_utils::{TestDatabase, TestDbConfig};
use chrono::{Duration, Utc};
use sea_orm::{Set, SqlxPostgresConnector};
use serde_json::json;

async fn setup() -> (TestDatabase, WebhookRepository, WebhookExecutionRepository) {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.expect("Cleanup failed");
    // `DatabaseConnection` is not `Clone` with sea-orm's `mock` feature (enabled in dev-deps);
    // share the underlying pool instead, which is what the derived `Clone` does.
    let conn = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        db.connection().get_postgres_connection_pool().clone(),
    ));
    (
        db,
        WebhookRepository::new(Arc::clone(&conn)),
        WebhookExecutionRepository::new(conn),
    )
}

async fn insert_webhook(repo: &WebhookRepository, url: &str) -> webhook::Model {
    repo.create(webhook::ActiveModel {
        id: Set(IdGenerator::new().generate()),
        event_code: Set("LOAN_APPROVED".to_string()),
        url: Set(url.to_string()),
        method: Set(HttpMethod::Post),
        headers: Set(json!([])),
        is_active: Set(true),
        created_by: Set("it".to_string()),
        created_at: Set(Utc::now().into()),
        updated_by: Set(None),
        updated_at: Set(None),
    })
    .await
    .unwrap()
}

async fn insert_execution(
    repo: &WebhookExecutionRepository,
    webhook_id: &str,
    success: bool,
    age: Duration,
) -> webhook_execution::Model {
    repo.create(webhook_execution::ActiveModel {
        id: Set(IdGenerator::new().generate()),
        webhook_id: Set(webhook_id.to_string()),
        executed_at: Set((Utc::now() - age).into()),
        success: Set(success),
        status_code: Set(Some(if success { 200 } else { 500 })),
        attempt: Set(1),
        request_payload: Set("{}".to_string()),
        response_body: Set(None),
        error: Set(None),
        duration_ms: Set(5),
        triggered_by: Set("system".to_string()),
    })
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_detection_against_active_rows() {
    let (_db, webhooks, _) = setup().await;
    let hook = insert_webhook(&webhooks, "https://a.example/hook").await;

    assert!(
        webhooks
            .exists_duplicate("LOAN_APPROVED", "https://a.example/hook", None)
            .await
            .unwrap()
    );
    assert!(
        !webhooks
            .exists_duplicate("LOAN_APPROVED", "https://a.example/hook", Some(&hook.id))
            .await
            .unwrap()
    );

    webhooks.set_active(&hook.id, false, "it").await.unwrap();
    assert!(
        !webhooks
            .exists_duplicate("LOAN_APPROVED", "https://a.example/hook", None)
            .await
            .unwrap()
    );
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_second_active_target_is_conflict() {
    let (_db, webhooks, _) = setup().await;
    let first = insert_webhook(&webhooks, "https://dup.example/hook").await;

    let second = webhooks
        .create(webhook::ActiveModel {
            id: Set(IdGenerator::new().generate()),
            event_code: Set("LOAN_APPROVED".to_string()),
            url: Set("https://dup.example/hook".to_string()),
            method: Set(HttpMethod::Post),
            headers: Set(json!([])),
            is_active: Set(true),
            created_by: Set("it".to_string()),
            created_at: Set(Utc::now().into()),
            updated_by: Set(None),
            updated_at: Set(None),
        })
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    // Once the first is inactive the same target may be registered again.
    webhooks.set_active(&first.id, false, "it").await.unwrap();
    insert_webhook(&webhooks, "https://dup.example/hook").await;
    assert!(matches!(
        webhooks.set_active(&first.id, true, "it").await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_history_pagination_is_stable() {
    let (_db, webhooks, history) = setup().await;
    let hook = insert_webhook(&webhooks, "https://b.example/hook").await;
    for minutes in 0..15 {
        insert_execution(&history, &hook.id, true, Duration::minutes(minutes)).await;
    }

    let page = PageRequest::new(Some(2), Some(10));
    let (first, total) = history.find_by_webhook_id(&hook.id, page).await.unwrap();
    let (second, _) = history.find_by_webhook_id(&hook.id, page).await.unwrap();

    assert_eq!(total, 15);
    assert_eq!(first.len(), 5);
    assert_eq!(first, second);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_stats_and_retention() {
    let (_db, webhooks, history) = setup().await;
    let hook = insert_webhook(&webhooks, "https://c.example/hook").await;
    insert_execution(&history, &hook.id, true, Duration::days(1)).await;
    insert_execution(&history, &hook.id, false, Duration::days(2)).await;
    let old = insert_execution(&history, &hook.id, true, Duration::days(120)).await;

    let from = Utc::now() - Duration::days(30);
    assert_eq!(history.count_since(&hook.id, from).await.unwrap(), 2);
    assert_eq!(history.count_successful_since(&hook.id, from).await.unwrap(), 1);

    let deleted = history
        .delete_older_than(Utc::now() - Duration::days(90))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let last = history.find_last(&hook.id).await.unwrap().unwrap();
    assert_ne!(last.id, old.id);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_deleting_webhook_cascades_to_history() {
    let (_db, webhooks, history) = setup().await;
    let hook = insert_webhook(&webhooks, "https://d.example/hook").await;
    insert_execution(&history, &hook.id, true, Duration::zero()).await;

    webhooks.delete(&hook.id).await.unwrap();

    let (items, total) = history
        .find_by_webhook_id(&hook.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(items.is_empty());
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(config.database_url().starts_with("postgres://"));
}
