//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login flow metrics
    pub static ref LOGIN_STARTS_TOTAL: IntCounter = IntCounter::new(
        "herokugate_login_starts_total",
        "Total number of login flows started"
    ).expect("metric can be created");
    pub static ref CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("herokugate_callbacks_total", "Total number of OAuth callbacks by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref TOKEN_EXCHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("herokugate_token_exchanges_total", "Total number of authorization code exchanges by outcome"),
        &["outcome"]
    ).expect("metric can be created");

    // Provider API metrics
    pub static ref API_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("herokugate_api_calls_total", "Total number of provider API calls by outcome"),
        &["outcome"]
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("herokugate_errors_total", "Total number of error responses"),
        &["kind"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGIN_STARTS_TOTAL.clone()))
            .expect("LOGIN_STARTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CALLBACKS_TOTAL.clone()))
            .expect("CALLBACKS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(TOKEN_EXCHANGES_TOTAL.clone()))
            .expect("TOKEN_EXCHANGES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(API_CALLS_TOTAL.clone()))
            .expect("API_CALLS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
