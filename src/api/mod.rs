//! Webhook backend access
//!
//! `types` holds the loosely-typed records the backend sends and their
//! mapping into domain types; `client` performs the requests.

pub mod client;
pub mod types;

pub use client::{ApiError, NewTask, WebhookClient};
