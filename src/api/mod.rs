//! API layer
//!
//! - Authenticated client for the Heroku Platform API
//! - Protected account pages
//! - Metrics (Prometheus)

mod account;
mod client;
mod dto;
pub mod metrics;

pub use dto::*;

pub use account::account_router;
pub use client::{ApiClient, ApiRequest};
pub use metrics::metrics_router;
