//! Signing key caching
//!
//! Caches the provider's JSON Web Key Set and refetches it when a token
//! names a key id that is not in the cached set (key rotation).

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Minimum spacing between refetches triggered by unknown key ids
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

/// JWKS cache
///
/// Thread-safe cache for the provider's signing keys.
pub struct JwksCache {
    jwks_uri: String,
    keys: Arc<RwLock<Option<CachedKeys>>>,
    http_client: Arc<reqwest::Client>,
    /// Keys older than this are refetched on next use
    ttl: Duration,
}

impl JwksCache {
    /// Create an empty cache
    ///
    /// # Arguments
    /// * `jwks_uri` - Provider `jwks_uri` from discovery
    /// * `http_client` - HTTP client for fetching keys
    /// * `ttl` - Max age of the cached set (default: 24 hours)
    pub fn new(jwks_uri: String, http_client: Arc<reqwest::Client>, ttl: Option<Duration>) -> Self {
        Self {
            jwks_uri,
            keys: Arc::new(RwLock::new(None)),
            http_client,
            ttl: ttl.unwrap_or(Duration::from_secs(24 * 3600)),
        }
    }

    /// Fetch the key set and replace the cached copy
    ///
    /// # Returns
    /// Number of keys in the fetched set
    pub async fn refresh(&self) -> Result<usize, AppError> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Fetching provider signing keys");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AppError::Discovery(format!("{}: {e}", self.jwks_uri)))?;

        if !response.status().is_success() {
            return Err(AppError::Discovery(format!(
                "{} returned {}",
                self.jwks_uri,
                response.status()
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AppError::Discovery(format!("invalid JWKS document: {e}")))?;
        let count = set.keys.len();

        let mut keys = self.keys.write().await;
        *keys = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });

        tracing::info!(keys = count, "Provider signing keys cached");
        Ok(count)
    }

    /// Get the decoding key for a token's `kid`
    ///
    /// Checks the cache first, refetches if the set is stale or the key id is
    /// unknown. A token without `kid` is accepted only when the set holds
    /// exactly one key.
    pub async fn key_for(&self, kid: Option<&str>) -> Result<DecodingKey, AppError> {
        let needs_refresh = {
            let keys = self.keys.read().await;
            match keys.as_ref() {
                Some(cached) if cached.fetched_at.elapsed() < self.ttl => {
                    if let Some(key) = select_key(&cached.set, kid)? {
                        return Ok(key);
                    }
                    cached.fetched_at.elapsed() >= MIN_REFRESH_INTERVAL
                }
                _ => true,
            }
        };

        if needs_refresh {
            tracing::debug!(kid = ?kid, "Signing key not cached, refetching");
            self.refresh().await?;
        }

        let keys = self.keys.read().await;
        keys.as_ref()
            .and_then(|cached| select_key(&cached.set, kid).transpose())
            .transpose()?
            .ok_or_else(|| AppError::Verification(format!("no signing key for kid {:?}", kid)))
    }
}

fn select_key(set: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, AppError> {
    let jwk = match kid {
        Some(kid) => set.find(kid),
        None if set.keys.len() == 1 => set.keys.first(),
        None => None,
    };

    jwk.map(|jwk| {
        DecodingKey::from_jwk(jwk).map_err(|e| AppError::Verification(format!("unusable JWK: {e}")))
    })
    .transpose()
}
