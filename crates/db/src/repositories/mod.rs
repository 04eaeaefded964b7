//! Data access repositories.

mod webhook;
mod webhook_execution;

pub use webhook::WebhookRepository;
pub use webhook_execution::WebhookExecutionRepository;
