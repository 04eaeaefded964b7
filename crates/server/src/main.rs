//! Back-office webhook engine server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use backoffice_api::{AdminKeys, AppState};
use backoffice_common::Config;
use backoffice_core::{
    CancelSignal, DispatchSettings, EventCatalog, ExecutionHistoryStoreRef, HistoryRetentionJob,
    HttpDispatchClient, SubscriptionStoreRef, WebhookDispatcher, WebhookService,
};
use backoffice_db::repositories::{WebhookExecutionRepository, WebhookRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "backoffice=debug,webhook_alert=error,tower_http=debug".into()
            }),
        )
        .init();

    info!("Starting back-office server...");

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    let catalog = EventCatalog::builtin();
    catalog.validate().context("invalid event catalog")?;
    info!(
        events = catalog.events().len(),
        categories = catalog.categories().len(),
        "Event catalog loaded"
    );

    // Connect to database
    let db = Arc::new(backoffice_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    backoffice_db::migrate(&db).await?;
    info!("Migrations completed");

    if config.admin.api_keys.is_empty() {
        tracing::warn!("No admin API keys configured, every API request will be rejected");
    }

    // Initialize repositories
    let webhook_repo = WebhookRepository::new(Arc::clone(&db));
    let subscriptions: SubscriptionStoreRef = Arc::new(webhook_repo.clone());
    let history: ExecutionHistoryStoreRef =
        Arc::new(WebhookExecutionRepository::new(Arc::clone(&db)));

    // Initialize services
    let dispatcher = WebhookDispatcher::new(
        Arc::new(catalog),
        subscriptions.clone(),
        history.clone(),
        Arc::new(
            HttpDispatchClient::new().with_body_limit(config.webhooks.max_response_body_bytes),
        ),
        DispatchSettings::from(&config.webhooks),
    );
    let webhook_service = WebhookService::new(webhook_repo, subscriptions, history.clone(), dispatcher);

    let (shutdown_tx, shutdown) = CancelSignal::channel();

    // Start history retention
    let retention = if config.retention.enabled {
        info!(
            keep_days = config.retention.keep_days,
            interval_secs = config.retention.interval_secs,
            "Starting history retention job"
        );
        Some(HistoryRetentionJob::from_config(history, &config.retention).spawn(shutdown.clone()))
    } else {
        None
    };

    let state = AppState {
        webhook_service,
        admin_keys: AdminKeys::new(config.admin.api_keys.clone()),
        shutdown,
    };

    let app = backoffice_api::app(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Abandon pending retries and stop background jobs.
            shutdown_tx.send_replace(true);
        })
        .await?;

    if let Some(handle) = retention
        && let Err(e) = handle.await
    {
        tracing::error!(error = %e, "History retention job ended abnormally");
    }

    info!("Server shutdown complete");
    Ok(())
}
