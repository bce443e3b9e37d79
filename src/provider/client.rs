//! OIDC relying-party client
//!
//! Implements the authorization code flow against the discovered provider.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use super::discovery::{ProviderMetadata, discover};
use super::jwks::JwksCache;
use super::verify::IdTokenVerifier;
use crate::config::OidcConfig;
use crate::error::AppError;

/// Token endpoint response (RFC 6749 section 5.1 plus OIDC `id_token`)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Token endpoint error body (RFC 6749 section 5.2)
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Provider handle built once at startup
pub struct OidcClient {
    config: OidcConfig,
    metadata: ProviderMetadata,
    authorization_endpoint: Url,
    end_session_endpoint: Url,
    verifier: IdTokenVerifier,
    http_client: Arc<reqwest::Client>,
}

impl OidcClient {
    /// Discover the provider and prime its signing keys
    ///
    /// # Steps
    /// 1. Fetch the discovery document for the tenant issuer
    /// 2. Fetch the JWKS
    /// 3. Build the ID token verifier
    ///
    /// # Errors
    /// Returns `AppError::Discovery` if the provider is unreachable or
    /// advertises unusable endpoints
    pub async fn discover(
        config: &OidcConfig,
        http_client: Arc<reqwest::Client>,
    ) -> Result<Self, AppError> {
        let issuer = config.issuer_url();
        let metadata = discover(&issuer, &http_client).await?;

        let authorization_endpoint = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
            AppError::Discovery(format!("invalid authorization_endpoint: {e}"))
        })?;
        let end_session_endpoint = match metadata.end_session_endpoint.as_deref() {
            Some(endpoint) => Url::parse(endpoint)
                .map_err(|e| AppError::Discovery(format!("invalid end_session_endpoint: {e}")))?,
            None => Url::parse(&config.fallback_logout_url())
                .map_err(|e| AppError::Discovery(format!("invalid logout url: {e}")))?,
        };

        let jwks = Arc::new(JwksCache::new(
            metadata.jwks_uri.clone(),
            http_client.clone(),
            None,
        ));
        jwks.refresh().await?;

        let verifier = IdTokenVerifier::new(metadata.issuer.clone(), config.client_id.clone(), jwks);

        tracing::info!(
            issuer = %metadata.issuer,
            token_endpoint = %metadata.token_endpoint,
            "OIDC provider discovered"
        );

        Ok(Self {
            config: config.clone(),
            metadata,
            authorization_endpoint,
            end_session_endpoint,
            verifier,
            http_client,
        })
    }

    pub fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }

    /// Build the authorization request URL
    ///
    /// Requests offline access the same way every time; only `state` and
    /// `nonce` vary between calls.
    pub fn authorization_url(&self, state: &str, nonce: &str) -> String {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("nonce", nonce)
            .append_pair("access_type", "offline");
        url.into()
    }

    /// Exchange an authorization code at the token endpoint
    ///
    /// # Errors
    /// `AppError::Exchange` on transport failure, non-2xx status or an
    /// unparsable body
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.metadata.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Exchange(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Exchange(e.to_string()))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => format!("token endpoint returned {status}"),
            };
            return Err(AppError::Exchange(detail));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::Exchange(format!("invalid token response: {e}")))
    }

    /// Provider logout URL that returns the browser to `post_logout_redirect`
    pub fn end_session_url(&self, post_logout_redirect: &str) -> String {
        let mut url = self.end_session_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("post_logout_redirect_uri", post_logout_redirect);
        url.into()
    }
}
