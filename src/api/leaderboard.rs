//! Leaderboard endpoint

use axum::{Json, Router, extract::State, routing::get};

use super::dto::LeaderboardEntry;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::service::KarmaService;

/// Create leaderboard router
pub fn leaderboard_router() -> Router<AppState> {
    Router::new().route("/leaderboard", get(leaderboard))
}

/// GET /api/leaderboard
///
/// Top 5 users by recent (24h) karma, descending; users with zero
/// recent karma never appear.
async fn leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let rows = KarmaService::new(state.db.clone()).leaderboard().await?;

    // Record successful request
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/leaderboard", "200"])
        .inc();

    Ok(Json(rows.into_iter().map(LeaderboardEntry::from).collect()))
}
