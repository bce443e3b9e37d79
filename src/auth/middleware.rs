//! Session extractors
//!
//! Resolve the `session` cookie to a live session for handlers that need auth.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::session::{SESSION_COOKIE, Session, verify_signed_token};
use crate::AppState;
use crate::error::AppError;

/// Signed session id from the request cookies, if any
pub(crate) fn session_id_from_jar(jar: &CookieJar, secret: &str) -> Option<String> {
    let token = jar.get(SESSION_COOKIE)?;
    verify_signed_token::<String>(token.value(), secret).ok()
}

async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Session, AppError> {
    let jar = CookieJar::from_headers(headers);
    let session_id = session_id_from_jar(&jar, &state.config.auth.session_secret)
        .ok_or(AppError::Unauthorized)?;

    state
        .sessions
        .get(&session_id)
        .await
        .ok_or(AppError::Unauthorized)
}

/// Extractor for current authenticated user
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.identity.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let session = authenticate(&parts.headers, &state).await?;

        Ok(CurrentUser(session))
    }
}
