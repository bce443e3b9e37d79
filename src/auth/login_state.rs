//! Pending login state
//!
//! Binds an authorization request to the browser that started it. The
//! `state` and `nonce` go out with the authorization URL; a signed copy
//! rides along in a short-lived cookie and is checked on callback.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::session::{create_signed_token, random_token, verify_signed_token};
use crate::error::AppError;

pub const LOGIN_STATE_COOKIE: &str = "oidc_state";

/// How long a user has to finish signing in at the provider
pub const LOGIN_STATE_TTL_SECONDS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub state: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingLogin {
    pub fn generate() -> Self {
        Self {
            state: random_token(),
            nonce: random_token(),
            expires_at: Utc::now() + Duration::seconds(LOGIN_STATE_TTL_SECONDS),
        }
    }

    pub fn to_cookie(&self, secret: &str, secure: bool) -> Result<Cookie<'static>, AppError> {
        let token = create_signed_token(self, secret)?;
        Ok(Cookie::build((LOGIN_STATE_COOKIE, token))
            .path("/oidc")
            .max_age(time::Duration::seconds(LOGIN_STATE_TTL_SECONDS))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .build())
    }

    /// Recover the pending login and check it against the callback `state`
    ///
    /// # Errors
    /// `AppError::InvalidState` if the cookie is missing, forged, expired,
    /// or holds a different state value
    pub fn validate(jar: &CookieJar, secret: &str, state: Option<&str>) -> Result<Self, AppError> {
        let state = state.ok_or(AppError::InvalidState)?;
        let cookie = jar.get(LOGIN_STATE_COOKIE).ok_or(AppError::InvalidState)?;
        let pending: Self =
            verify_signed_token(cookie.value(), secret).map_err(|_| AppError::InvalidState)?;

        if pending.expires_at < Utc::now() {
            return Err(AppError::InvalidState);
        }

        if !constant_time_eq(pending.state.as_bytes(), state.as_bytes()) {
            return Err(AppError::InvalidState);
        }

        Ok(pending)
    }
}

pub fn clear_login_state_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((LOGIN_STATE_COOKIE, ""))
        .path("/oidc")
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
