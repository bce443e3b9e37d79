//! Session management
//!
//! Sessions live in a process-local store keyed by a random id.
//! The browser only holds the id, signed with HMAC-SHA256.

use std::collections::HashMap;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::AppError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Authenticated user, as exposed on `/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Random session id (also the signed cookie payload)
    pub id: String,
    pub identity: Identity,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// In-memory session store
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    max_age: Duration,
}

impl SessionStore {
    /// # Errors
    /// `AppError::Config` if `max_age_seconds` does not fit a duration
    pub fn new(max_age_seconds: i64) -> Result<Self, AppError> {
        let max_age = Duration::try_seconds(max_age_seconds).ok_or_else(|| {
            AppError::Config(format!(
                "session max age of {max_age_seconds} seconds is out of range"
            ))
        })?;

        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            max_age,
        })
    }

    /// Open a new session for `identity`
    pub async fn create(&self, identity: Identity) -> Session {
        let now = Utc::now();
        let session = Session {
            id: random_token(),
            identity,
            created_at: now,
            expires_at: now + self.max_age,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        crate::metrics::ACTIVE_SESSIONS.set(sessions.len() as i64);

        session
    }

    /// Look up a live session
    ///
    /// Expired sessions are treated as absent.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(id).filter(|s| !s.is_expired()).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id);
        crate::metrics::ACTIVE_SESSIONS.set(sessions.len() as i64);
        removed
    }

    /// Drop expired sessions
    ///
    /// # Returns
    /// Number of sessions removed
    pub async fn prune_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        crate::metrics::ACTIVE_SESSIONS.set(sessions.len() as i64);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// 32 random bytes, URL-safe base64
pub fn random_token() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Create a signed token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `payload` - Data to encode
/// * `secret` - HMAC secret key
pub fn create_signed_token<T: Serialize>(payload: &T, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let payload = serde_json::to_string(payload).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let mut mac = hmac_for(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a signed token
///
/// # Errors
/// Returns `AppError::Unauthorized` if the signature is invalid or the
/// token is malformed
pub fn verify_signed_token<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let mut mac = hmac_for(secret)?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;

    serde_json::from_slice(&payload).map_err(|_| AppError::Unauthorized)
}

fn hmac_for(secret: &str) -> Result<hmac::Hmac<sha2::Sha256>, AppError> {
    use hmac::Mac;

    hmac::Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session secret: {e}")))
}

/// Session cookie carrying the signed session id
pub fn session_cookie(token: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    let max_age = time::Duration::seconds(max_age_seconds);
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(max_age)
        .expires(time::OffsetDateTime::now_utc() + max_age)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Expired session cookie
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}
