//! OpenID Provider discovery
//!
//! Fetches `{issuer}/.well-known/openid-configuration` once at startup.

use serde::Deserialize;

use crate::error::AppError;

/// The subset of the discovery document this service relies on
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    /// Absent for providers without RP-initiated logout
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// Fetch and sanity-check provider metadata
///
/// # Errors
/// Returns `AppError::Discovery` if the document cannot be fetched or parsed,
/// or if it advertises an issuer other than the one requested.
pub async fn discover(
    issuer: &str,
    http_client: &reqwest::Client,
) -> Result<ProviderMetadata, AppError> {
    let issuer = issuer.trim_end_matches('/');
    let url = format!("{}/.well-known/openid-configuration", issuer);

    tracing::debug!(%url, "Fetching provider metadata");

    let response = http_client
        .get(&url)
        .send()
        .await
        .map_err(|e| AppError::Discovery(format!("{url}: {e}")))?;

    if !response.status().is_success() {
        return Err(AppError::Discovery(format!(
            "{url} returned {}",
            response.status()
        )));
    }

    let metadata: ProviderMetadata = response
        .json()
        .await
        .map_err(|e| AppError::Discovery(format!("invalid discovery document: {e}")))?;

    if metadata.issuer.trim_end_matches('/') != issuer {
        return Err(AppError::Discovery(format!(
            "issuer did not match the issuer returned by provider, expected {:?} got {:?}",
            issuer, metadata.issuer
        )));
    }

    Ok(metadata)
}
