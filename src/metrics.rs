//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("karmafeed_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");

    // Write Metrics
    pub static ref POSTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "karmafeed_posts_created_total",
        "Total number of posts created"
    ).expect("metric can be created");
    pub static ref COMMENTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "karmafeed_comments_created_total",
        "Total number of comments created"
    ).expect("metric can be created");
    pub static ref LIKE_TOGGLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("karmafeed_like_toggles_total", "Total number of like toggles"),
        &["target", "outcome"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("karmafeed_errors_total", "Total number of errors"),
        &["error_type", "endpoint"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(POSTS_CREATED_TOTAL.clone()))
        .expect("POSTS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(COMMENTS_CREATED_TOTAL.clone()))
        .expect("COMMENTS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(LIKE_TOGGLES_TOTAL.clone()))
        .expect("LIKE_TOGGLES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
