//! Karmafeed - a small community feed server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Feed endpoints (posts, comments, likes)                  │
//! │  - Leaderboard and auth endpoints                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Comment tree reconstruction                              │
//! │  - Karma aggregation and ranking                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `auth`: Sessions, passwords, principal resolution
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and configuration.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,
}

impl AppState {
    /// Initialize application state
    ///
    /// Connects to the SQLite database and runs migrations. The guest
    /// account is not created here; it is created lazily on the first
    /// anonymous write.
    ///
    /// # Errors
    /// Returns error if the database connection or migration fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
