//! Authentication endpoints
//!
//! Session-cookie login with username/password. Tokens are also
//! accepted as `Authorization: Bearer` for non-browser clients.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::dto::SessionUserResponse;
use crate::AppState;
use crate::auth::{MaybeUser, SESSION_COOKIE, Session, create_session_token, password};
use crate::data::{EntityId, User};
use crate::error::AppError;
use crate::service::KarmaService;

const MAX_USERNAME_CHARS: usize = 32;
const MIN_PASSWORD_CHARS: usize = 8;

/// Create authentication router
///
/// Routes:
/// - POST /register - Create an account and sign in
/// - POST /login - Sign in, set session cookie
/// - POST /logout - Clear session cookie
/// - GET /me - Current principal with karma
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Credentials for register and login
#[derive(Debug, Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.should_use_secure_cookies())
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

async fn signed_in_response(
    state: &AppState,
    user: &User,
) -> Result<(Cookie<'static>, SessionUserResponse), AppError> {
    let session = Session::for_user(
        user.id.clone(),
        user.username.clone(),
        state.config.auth.session_max_age,
    );
    let token = create_session_token(&session, &state.config.auth.session_secret)?;

    let karma = KarmaService::new(state.db.clone())
        .summary(&user.id)
        .await?;

    Ok((
        session_cookie(state, token),
        SessionUserResponse::for_user(user.id.clone(), &user.username, karma),
    ))
}

/// POST /api/auth/register
///
/// Creates an account and signs it in. The guest username is reserved.
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, CookieJar, Json<SessionUserResponse>), AppError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AppError::Validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_CHARS
        )));
    }
    if username == state.config.auth.guest_username {
        return Err(AppError::Validation(
            "this username is reserved".to_string(),
        ));
    }
    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }

    let user = User {
        id: EntityId::new().0,
        username: username.to_string(),
        password_hash: Some(password::hash_password(&request.password)?),
        created_at: chrono::Utc::now(),
    };

    // Duplicate username surfaces as Conflict (409)
    state.db.insert_user(&user).await?;

    tracing::info!(username = %user.username, "User registered");

    let (cookie, response) = signed_in_response(&state, &user).await?;
    Ok((StatusCode::CREATED, jar.add(cookie), Json(response)))
}

/// POST /api/auth/login
///
/// 400 for missing fields, 401 for bad credentials. A failed login is
/// never silently defaulted to the guest account.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<CredentialsRequest>,
) -> Result<(CookieJar, Json<SessionUserResponse>), AppError> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let user = state
        .db
        .get_user_by_username(request.username.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    // Accounts without a password (the guest account) cannot log in
    let stored_hash = user.password_hash.as_deref().ok_or(AppError::Unauthorized)?;
    if !password::verify_password(&request.password, stored_hash) {
        return Err(AppError::Unauthorized);
    }

    tracing::info!(username = %user.username, "User logged in");

    let (cookie, response) = signed_in_response(&state, &user).await?;
    Ok((jar.add(cookie), Json(response)))
}

/// POST /api/auth/logout
async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    (
        jar.remove(removal_cookie()),
        Json(serde_json::json!({ "status": "logged out" })),
    )
}

/// GET /api/auth/me
///
/// Authenticated principals get their karma; anonymous viewers get a
/// zero-karma placeholder.
async fn me(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
) -> Result<Json<SessionUserResponse>, AppError> {
    let Some(session) = session else {
        return Ok(Json(SessionUserResponse::anonymous(
            &state.config.auth.guest_username,
        )));
    };

    let Some(user) = state.db.get_user(&session.user_id).await? else {
        // Session outlived the account
        return Ok(Json(SessionUserResponse::anonymous(
            &state.config.auth.guest_username,
        )));
    };

    let karma = KarmaService::new(state.db.clone())
        .summary(&user.id)
        .await?;

    Ok(Json(SessionUserResponse::for_user(
        user.id.clone(),
        &user.username,
        karma,
    )))
}
