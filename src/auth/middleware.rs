//! Authentication extractors and principal resolution
//!
//! The "current principal" is threaded explicitly: handlers extract an
//! optional session, and writes resolve it to a concrete user row (the
//! shared guest account for anonymous requests).

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::session::{Session, verify_session_token};
use crate::AppState;
use crate::data::User;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session";

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned())
        })
}

fn authenticate_token(token: &str, state: &AppState) -> Result<Session, AppError> {
    verify_session_token(token, &state.config.auth.session_secret)
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(MaybeUser(Some(session)));
        }

        let app_state = AppState::from_ref(state);
        let session = match extract_token_from_headers(&parts.headers) {
            Some(token) => authenticate_token(&token, &app_state).ok(),
            None => None,
        };

        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(MaybeUser(session))
    }
}

/// Resolve the acting principal for a write request.
///
/// Authenticated sessions map to their user row; anonymous requests are
/// attributed to the lazily created guest account.
pub async fn resolve_write_principal(
    state: &AppState,
    maybe_user: &MaybeUser,
) -> Result<User, AppError> {
    match &maybe_user.0 {
        Some(session) => state
            .db
            .get_user(&session.user_id)
            .await?
            .ok_or(AppError::Unauthorized),
        None => {
            state
                .db
                .get_or_create_user(&state.config.auth.guest_username)
                .await
        }
    }
}
