//! Post endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use super::dto::{LikeToggleResponse, PostResponse, UserResponse};
use crate::AppState;
use crate::auth::{MaybeUser, resolve_write_principal};
use crate::data::{LikeOutcome, LikeTarget};
use crate::error::AppError;
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::service::{CommentNode, CommentService, PostService};

/// Create posts router
pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", get(get_post).delete(delete_post))
        .route("/posts/:id/like", post(toggle_post_like))
        .route("/posts/:id/comments", get(get_post_comments))
}

/// Post creation request
#[derive(Debug, Deserialize)]
struct CreatePostRequest {
    content: String,
}

/// GET /api/posts
///
/// All posts, newest first, annotated with derived counts and whether
/// the viewer has liked each one (single batched lookup).
async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let service = PostService::new(state.db.clone());

    let rows = service.list_with_counts().await?;
    let post_ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
    let liked = service
        .liked_post_ids(session.as_ref().map(|s| s.user_id.as_str()), &post_ids)
        .await?;

    let posts = rows
        .into_iter()
        .map(|row| {
            let user_has_liked = liked.contains(&row.id);
            PostResponse::from_row(row, user_has_liked)
        })
        .collect();

    // Record successful request
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/posts", "200"])
        .inc();

    Ok(Json(posts))
}

/// POST /api/posts
///
/// Anonymous writes are attributed to the guest account.
async fn create_post(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let author = resolve_write_principal(&state, &maybe_user).await?;
    let service = PostService::new(state.db.clone());

    let created = service.create(&author, &request.content).await?;

    let response = PostResponse {
        id: created.id,
        author: UserResponse {
            id: author.id,
            username: author.username,
        },
        content: created.content,
        created_at: created.created_at,
        like_count: 0,
        comment_count: 0,
        user_has_liked: false,
    };

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/posts", "201"])
        .inc();

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/posts/:id
async fn get_post(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, AppError> {
    let service = PostService::new(state.db.clone());

    let row = service.get_with_counts(&id).await?;
    let user_has_liked = match &session {
        Some(session) => {
            state
                .db
                .has_liked(&session.user_id, LikeTarget::Post(&row.id))
                .await?
        }
        None => false,
    };

    Ok(Json(PostResponse::from_row(row, user_has_liked)))
}

/// DELETE /api/posts/:id
///
/// Author only; cascades to comments and likes.
async fn delete_post(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let actor = resolve_write_principal(&state, &maybe_user).await?;
    let service = PostService::new(state.db.clone());

    service.delete(&actor, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/posts/:id/like
///
/// Toggle: 201 with "liked" when the like was created, 200 with
/// "unliked" when it was removed.
async fn toggle_post_like(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<LikeToggleResponse>), AppError> {
    let user = resolve_write_principal(&state, &maybe_user).await?;
    let service = PostService::new(state.db.clone());

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

/// GET /api/posts/:id/comments
///
/// The reconstructed comment tree for the post.
async fn get_post_comments(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<CommentNode>>, AppError> {
    let service = CommentService::new(state.db.clone());

    let tree = service
        .comment_tree(&id, session.as_ref().map(|s| s.user_id.as_str()))
        .await?;

    Ok(Json(tree))
}
