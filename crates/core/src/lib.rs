//! Webhook delivery engine and administrative services.

pub mod services;

pub use services::*;
