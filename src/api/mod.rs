//! API layer
//!
//! HTTP handlers for:
//! - Feed (posts, comments, likes)
//! - Leaderboard
//! - Authentication
//! - Metrics (Prometheus)

mod auth;
mod comments;
mod dto;
mod leaderboard;
pub mod metrics;
mod posts;

pub use dto::*;

use axum::Router;

use crate::AppState;

pub use metrics::metrics_router;

/// Create the combined /api router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(posts::posts_router())
        .merge(comments::comments_router())
        .merge(leaderboard::leaderboard_router())
        .nest("/auth", auth::auth_router())
}
