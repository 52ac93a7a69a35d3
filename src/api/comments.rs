//! Comment endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;

use super::dto::LikeToggleResponse;
use crate::AppState;
use crate::auth::{MaybeUser, resolve_write_principal};
use crate::data::LikeOutcome;
use crate::error::AppError;
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::service::{CommentAuthor, CommentNode, CommentService};

/// Create comments router
pub fn comments_router() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/:id", axum::routing::delete(delete_comment))
        .route("/comments/:id/like", post(toggle_comment_like))
}

/// Comment creation request
#[derive(Debug, Deserialize)]
struct CreateCommentRequest {
    post_id: String,
    parent_id: Option<String>,
    content: String,
}

/// POST /api/comments
///
/// The parent, if given, must belong to the same post. Anonymous writes
/// are attributed to the guest account.
async fn create_comment(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentNode>), AppError> {
    let author = resolve_write_principal(&state, &maybe_user).await?;
    let service = CommentService::new(state.db.clone());

    let created = service
        .create(
            &author,
            &request.post_id,
            request.parent_id.as_deref(),
            &request.content,
        )
        .await?;

    let response = CommentNode {
        id: created.id,
        post_id: created.post_id,
        parent_id: created.parent_id,
        author: CommentAuthor {
            id: author.id,
            username: author.username,
        },
        content: created.content,
        created_at: created.created_at,
        like_count: 0,
        user_has_liked: false,
        replies: Vec::new(),
    };

    // Record successful request
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/comments", "201"])
        .inc();

    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /api/comments/:id
///
/// Author only; cascades to replies and likes.
async fn delete_comment(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let actor = resolve_write_principal(&state, &maybe_user).await?;
    let service = CommentService::new(state.db.clone());

    service.delete(&actor, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/comments/:id/like
///
/// Same toggle contract as post likes.
async fn toggle_comment_like(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<LikeToggleResponse>), AppError> {
    let user = resolve_write_principal(&state, &maybe_user).await?;
    let service = CommentService::new(state.db.clone());

    let outcome = service.toggle_like(&user, &id).await?;
    let status = match outcome {
        LikeOutcome::Liked => StatusCode::CREATED,
        LikeOutcome::Unliked => StatusCode::OK,
    };

    Ok((
        status,
        Json(LikeToggleResponse {
            status: outcome.as_str().to_string(),
        }),
    ))
}
