//! Database entities.

pub mod webhook;
pub mod webhook_execution;

pub use webhook::Entity as Webhook;
pub use webhook_execution::Entity as WebhookExecution;
