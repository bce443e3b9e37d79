//! OpenID Connect authorization code flow
//!
//! Implements login, callback and logout against the configured tenant.

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::login_state::{PendingLogin, clear_login_state_cookie};
use super::middleware::session_id_from_jar;
use super::session::{Identity, clear_session_cookie, create_signed_token, session_cookie};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::{LOGINS_TOTAL, LOGOUTS_TOTAL};

/// Create authentication router
///
/// Routes:
/// - GET /oidc/login - Redirect to the provider
/// - GET /oidc/login/callback - Authorization code callback
/// - GET /oidc/logout - End session
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/oidc/login", get(login))
        .route("/oidc/login/callback", get(callback))
        .route("/oidc/logout", get(logout))
}

/// 302 Found to `location`
fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

// =============================================================================
// Login
// =============================================================================

/// GET /oidc/login
///
/// # Steps
/// 1. Generate state and nonce
/// 2. Store them in the signed `oidc_state` cookie
/// 3. Redirect to the provider authorization endpoint
async fn login(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let pending = PendingLogin::generate();
    let cookie = pending.to_cookie(
        &state.config.auth.session_secret,
        state.config.auth.secure_cookies,
    )?;
    let location = state
        .oidc
        .authorization_url(&pending.state, &pending.nonce);

    tracing::debug!("Redirecting to identity provider");
    Ok((jar.add(cookie), found(location)).into_response())
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Identity claims in the ID token
///
/// Missing claims become empty strings; claims of the wrong type are an error.
#[derive(Debug, Deserialize)]
struct IdentityClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<IdentityClaims> for Identity {
    fn from(claims: IdentityClaims) -> Self {
        Identity {
            email: claims
                .email
                .or(claims.preferred_username)
                .unwrap_or_default(),
            name: claims.name.unwrap_or_default(),
        }
    }
}

/// GET /oidc/login/callback
///
/// # Steps
/// 1. Verify state against the pending login cookie
/// 2. Exchange code for tokens
/// 3. Verify the ID token
/// 4. Map claims to an identity
/// 5. Replace any existing session, then set the new cookie
/// 6. Redirect to the front-end dashboard
///
/// The pending login cookie is cleared whether or not the callback succeeds.
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let result = complete_login(&state, query, &jar).await;
    LOGINS_TOTAL
        .with_label_values(&[if result.is_ok() { "success" } else { "failure" }])
        .inc();

    let jar = jar.add(clear_login_state_cookie());
    match result {
        Ok(identity) => match start_session(&state, identity, jar.clone()).await {
            Ok(response) => response,
            Err(error) => (jar, error).into_response(),
        },
        Err(error) => (jar, error).into_response(),
    }
}

async fn start_session(
    state: &AppState,
    identity: Identity,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if let Some(previous) = session_id_from_jar(&jar, &state.config.auth.session_secret) {
        if state.sessions.remove(&previous).await.is_some() {
            tracing::debug!(session_id = %previous, "Replaced existing session");
        }
    }

    let session = state.sessions.create(identity).await;
    let token = create_signed_token(&session.id, &state.config.auth.session_secret)?;

    tracing::info!(
        email = %session.identity.email,
        expires_at = %session.expires_at,
        "User signed in"
    );
    tracing::debug!(session_id = %session.id, "Session created");

    let jar = jar.add(session_cookie(
        token,
        state.config.auth.session_max_age,
        state.config.auth.secure_cookies,
    ));

    Ok((jar, found(state.config.frontend.dashboard_url())).into_response())
}

async fn complete_login(
    state: &AppState,
    query: CallbackQuery,
    jar: &CookieJar,
) -> Result<Identity, AppError> {
    let pending = PendingLogin::validate(
        jar,
        &state.config.auth.session_secret,
        query.state.as_deref(),
    )?;

    if let Some(error) = query.error {
        let detail = match query.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(AppError::AuthorizationDenied(detail));
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Exchange("missing authorization code".to_string()))?;

    let tokens = state.oidc.exchange_code(&code).await?;
    let raw_id_token = tokens.id_token.ok_or(AppError::MissingIdToken)?;

    let id_token = state
        .oidc
        .verifier()
        .verify(&raw_id_token, Some(&pending.nonce))
        .await?;

    let claims: IdentityClaims = id_token.claims()?;
    Ok(claims.into())
}

// =============================================================================
// Logout
// =============================================================================

/// GET /oidc/logout
///
/// Drops the local session (if any), expires the cookie and hands the
/// browser to the provider's end-session endpoint.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(session_id) = session_id_from_jar(&jar, &state.config.auth.session_secret) {
        if let Some(session) = state.sessions.remove(&session_id).await {
            tracing::info!(email = %session.identity.email, "User signed out");
        }
    }
    LOGOUTS_TOTAL.inc();

    let location = state
        .oidc
        .end_session_url(state.config.frontend.origin());
    let jar = jar.add(clear_session_cookie(state.config.auth.secure_cookies));

    (jar, found(location)).into_response()
}
