//! Webhook engine services.

#![allow(missing_docs)]

pub mod cancel;
pub mod dispatch_client;
pub mod event_catalog;
pub mod retention;
pub mod webhook;
pub mod webhook_dispatcher;
pub mod webhook_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use cancel::CancelSignal;
pub use dispatch_client::{
    DispatchClient, DispatchClientRef, DispatchResponse, HttpDispatchClient, OutboundRequest,
    TransportError,
};
pub use event_catalog::{EventCatalog, EventCategory, SystemEvent};
pub use retention::HistoryRetentionJob;
pub use webhook::{
    CreateWebhookInput, ExecutionResponse, UpdateWebhookInput, WebhookResponse, WebhookService,
    WebhookStatsResponse,
};
pub use webhook_dispatcher::{
    DeliveryOutcome, DeliveryStatus, DispatchSettings, FailureReason, RetryPolicy, Trigger,
    WebhookDispatcher,
};
pub use webhook_store::{
    ExecutionHistoryStore, ExecutionHistoryStoreRef, ExecutionStats, SubscriptionStore,
    SubscriptionStoreRef,
};
