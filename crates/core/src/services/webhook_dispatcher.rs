//! Webhook delivery engine.
//!
//! Resolves subscriptions for an event (or a single webhook), sends each one
//! through a [`DispatchClient`] with retry and backoff, and appends one
//! history record per attempt.
//!
//! Delivery failures never surface as errors: they end up in the returned
//! [`DeliveryOutcome`] and in the execution history. Only resolution problems
//! (unknown event, unknown webhook, subscription lookup failure) are returned
//! as `Err`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backoffice_common::{AppError, AppResult, IdGenerator, config::WebhookDispatchConfig};
use backoffice_db::entities::{webhook, webhook_execution};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use super::cancel::CancelSignal;
use super::dispatch_client::{
    DispatchClientRef, DispatchResponse, OutboundRequest, TransportError,
};
use super::event_catalog::EventCatalog;
use super::webhook_store::{ExecutionHistoryStoreRef, SubscriptionStoreRef};

/// Exponential backoff between attempts of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`, capped.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether another attempt is allowed after `attempts_made`.
    #[must_use]
    pub const fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Runtime knobs of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Per-attempt timeout handed to the client.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Concurrent subscriptions served for one event.
    pub max_concurrency: usize,
    /// Stored response bodies are cut to this many bytes.
    pub max_response_body_bytes: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&WebhookDispatchConfig::default())
    }
}

impl From<&WebhookDispatchConfig> for DispatchSettings {
    fn from(config: &WebhookDispatchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                base_delay: Duration::from_millis(config.backoff_base_ms),
                max_delay: Duration::from_millis(config.backoff_max_ms),
            },
            max_concurrency: config.max_concurrency.max(1),
            max_response_body_bytes: config.max_response_body_bytes,
        }
    }
}

/// Who caused a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A domain event.
    System,
    /// A manual test from the admin UI.
    Test { actor: String },
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Test { actor } => write!(f, "test:{actor}"),
        }
    }
}

/// Why the last attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FailureReason {
    /// The server answered with a non-2xx status.
    Http {
        #[serde(rename = "statusCode")]
        status_code: u16,
    },
    /// The call never completed.
    Transport(TransportError),
}

/// Classified result of a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeliveryStatus {
    Success,
    Failure { reason: FailureReason },
    /// Cancelled before any attempt was made.
    Cancelled,
}

/// Aggregated result of all attempts for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub webhook_id: String,
    /// Status of the last attempt.
    #[serde(flatten)]
    pub status: DeliveryStatus,
    /// HTTP status of the last attempt, if it got a response.
    pub status_code: Option<u16>,
    pub attempts: u32,
    /// Wall time across all attempts and backoff waits.
    pub elapsed_ms: u64,
    /// Remaining retries were abandoned because of cancellation.
    pub cancelled: bool,
    /// Attempts whose history record could not be written.
    pub unrecorded_attempts: u32,
}

impl DeliveryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, DeliveryStatus::Success)
    }
}

enum AttemptResult {
    Response(DispatchResponse),
    Transport(TransportError),
}

impl AttemptResult {
    const fn is_success(&self) -> bool {
        matches!(self, Self::Response(r) if r.is_success())
    }

    /// 5xx and transport failures. 4xx is a configuration problem on our side.
    const fn is_retryable(&self) -> bool {
        match self {
            Self::Response(r) => r.status_code >= 500,
            Self::Transport(_) => true,
        }
    }

    const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response(r) => Some(r.status_code),
            Self::Transport(_) => None,
        }
    }

    fn into_status(self) -> DeliveryStatus {
        match self {
            Self::Response(r) if r.is_success() => DeliveryStatus::Success,
            Self::Response(r) => DeliveryStatus::Failure {
                reason: FailureReason::Http {
                    status_code: r.status_code,
                },
            },
            Self::Transport(e) => DeliveryStatus::Failure {
                reason: FailureReason::Transport(e),
            },
        }
    }
}

/// Cut `body` to at most `max` bytes on a char boundary.
fn truncate_body(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// The delivery engine. Cheap to clone; holds no per-call state.
#[derive(Clone)]
pub struct WebhookDispatcher {
    catalog: Arc<EventCatalog>,
    subscriptions: SubscriptionStoreRef,
    history: ExecutionHistoryStoreRef,
    client: DispatchClientRef,
    settings: DispatchSettings,
    id_gen: IdGenerator,
}

impl WebhookDispatcher {
    /// Create a new dispatcher.
    #[must_use]
    pub fn new(
        catalog: Arc<EventCatalog>,
        subscriptions: SubscriptionStoreRef,
        history: ExecutionHistoryStoreRef,
        client: DispatchClientRef,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            catalog,
            subscriptions,
            history,
            client,
            settings,
            id_gen: IdGenerator::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Deliver `payload` to every active subscription of `event_code`.
    ///
    /// Returns one outcome per subscription, in completion order. No
    /// subscribers is a normal, empty result.
    pub async fn dispatch_for_event(
        &self,
        event_code: &str,
        payload: &Value,
        cancel: &CancelSignal,
    ) -> AppResult<Vec<DeliveryOutcome>> {
        self.catalog.require(event_code)?;

        let subscriptions = self
            .subscriptions
            .find_active_by_event_code(event_code)
            .await?;
        if subscriptions.is_empty() {
            tracing::debug!(event = %event_code, "No active subscriptions for event");
            return Ok(Vec::new());
        }

        let body = serialize_payload(payload)?;
        let trigger = Trigger::System;

        tracing::info!(
            event = %event_code,
            subscriptions = subscriptions.len(),
            "Dispatching event to webhooks"
        );

        let outcomes = stream::iter(subscriptions)
            .map(|webhook| self.deliver(webhook, &body, &trigger, cancel))
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        Ok(outcomes)
    }

    /// Deliver `payload` to one webhook, active or not.
    pub async fn dispatch_one(
        &self,
        webhook_id: &str,
        payload: &Value,
        trigger: Trigger,
        cancel: &CancelSignal,
    ) -> AppResult<DeliveryOutcome> {
        let webhook = self
            .subscriptions
            .find_by_id(webhook_id)
            .await?
            .ok_or_else(|| AppError::WebhookNotFound(webhook_id.to_string()))?;

        let body = serialize_payload(payload)?;
        Ok(self.deliver(webhook, &body, &trigger, cancel).await)
    }

    async fn deliver(
        &self,
        webhook: webhook::Model,
        body: &str,
        trigger: &Trigger,
        cancel: &CancelSignal,
    ) -> DeliveryOutcome {
        let request = OutboundRequest {
            method: webhook.method,
            url: webhook.url.clone(),
            headers: webhook.header_list(),
            body: body.to_string(),
        };

        // History timestamps follow the monotonic clock from here on.
        let wall_start = Utc::now();
        let started = Instant::now();

        let mut attempts = 0u32;
        let mut unrecorded_attempts = 0u32;
        let mut cancelled = false;
        let mut last: Option<AttemptResult> = None;

        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            attempts += 1;
            let attempt_started = Instant::now();
            let executed_at = wall_start
                + chrono::Duration::from_std(attempt_started - started)
                    .unwrap_or_else(|_| chrono::Duration::zero());

            let result = match self.client.send(&request, self.settings.timeout).await {
                Ok(response) => AttemptResult::Response(response),
                Err(err) => AttemptResult::Transport(err),
            };
            let duration = attempt_started.elapsed();

            self.log_attempt(&webhook, attempts, &result, duration);
            if !self
                .record(&webhook, attempts, executed_at, body, &result, duration, trigger)
                .await
            {
                unrecorded_attempts += 1;
            }

            let retry = result.is_retryable() && self.settings.retry.should_retry(attempts);
            last = Some(result);
            if !retry {
                break;
            }

            let delay = self.settings.retry.delay_for_retry(attempts);
            tracing::debug!(
                webhook_id = %webhook.id,
                attempt = attempts,
                delay_ms = as_millis(delay),
                "Retrying webhook after backoff"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
            }
        }

        if cancelled {
            tracing::info!(
                webhook_id = %webhook.id,
                attempts,
                "Webhook delivery cancelled"
            );
        }

        let (status, status_code) = match last {
            Some(result) => {
                let code = result.status_code();
                (result.into_status(), code)
            }
            None => (DeliveryStatus::Cancelled, None),
        };

        DeliveryOutcome {
            webhook_id: webhook.id,
            status,
            status_code,
            attempts,
            elapsed_ms: as_millis(started.elapsed()),
            cancelled,
            unrecorded_attempts,
        }
    }

    fn log_attempt(
        &self,
        webhook: &webhook::Model,
        attempt: u32,
        result: &AttemptResult,
        duration: Duration,
    ) {
        let elapsed_ms = as_millis(duration);
        match result {
            AttemptResult::Response(r) if r.is_success() => tracing::info!(
                webhook_id = %webhook.id,
                attempt,
                status_code = r.status_code,
                elapsed_ms,
                "Webhook delivered"
            ),
            AttemptResult::Response(r) => tracing::warn!(
                webhook_id = %webhook.id,
                url = %webhook.url,
                attempt,
                status_code = r.status_code,
                elapsed_ms,
                "Webhook endpoint returned error status"
            ),
            AttemptResult::Transport(e) => tracing::warn!(
                webhook_id = %webhook.id,
                url = %webhook.url,
                attempt,
                error = %e,
                elapsed_ms,
                "Webhook transport failure"
            ),
        }
    }

    /// Append the history record for one attempt. Returns `false` if it was lost.
    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        webhook: &webhook::Model,
        attempt: u32,
        executed_at: DateTime<Utc>,
        body: &str,
        result: &AttemptResult,
        duration: Duration,
        trigger: &Trigger,
    ) -> bool {
        let (response_body, error) = match result {
            AttemptResult::Response(r) => (
                Some(truncate_body(
                    r.body.clone(),
                    self.settings.max_response_body_bytes,
                )),
                (!r.is_success()).then(|| format!("HTTP {}", r.status_code)),
            ),
            AttemptResult::Transport(e) => (None, Some(e.to_string())),
        };

        let record = webhook_execution::Model {
            id: self.id_gen.generate(),
            webhook_id: webhook.id.clone(),
            executed_at: executed_at.into(),
            success: result.is_success(),
            status_code: result.status_code().map(i32::from),
            attempt: attempt as i32,
            request_payload: body.to_string(),
            response_body,
            error,
            duration_ms: as_millis(duration) as i64,
            triggered_by: trigger.to_string(),
        };

        match self.history.append(record).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    target: "webhook_alert",
                    alert = true,
                    webhook_id = %webhook.id,
                    attempt,
                    error = %e,
                    "Failed to persist webhook execution history"
                );
                false
            }
        }
    }
}

fn serialize_payload(payload: &Value) -> AppResult<String> {
    serde_json::to_string(payload)
        .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {e}")))
}
