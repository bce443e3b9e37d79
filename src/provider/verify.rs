//! ID token verification
//!
//! Checks signature (RS256 against the provider JWKS), issuer, audience,
//! expiry and nonce before any claim is trusted.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::de::DeserializeOwned;

use super::jwks::JwksCache;
use crate::error::AppError;

/// Verifier bound to one issuer and one client id
pub struct IdTokenVerifier {
    issuer: String,
    client_id: String,
    jwks: Arc<JwksCache>,
}

/// An ID token whose signature and registered claims have been checked
#[derive(Debug, Clone)]
pub struct VerifiedIdToken {
    claims: serde_json::Value,
}

impl VerifiedIdToken {
    /// Map the token's claims onto a caller-defined type
    ///
    /// # Errors
    /// `AppError::ClaimParse` if the claims do not fit `T`
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.claims.clone()).map_err(|e| AppError::ClaimParse(e.to_string()))
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(|v| v.as_str())
    }
}

impl IdTokenVerifier {
    pub fn new(issuer: String, client_id: String, jwks: Arc<JwksCache>) -> Self {
        Self {
            issuer,
            client_id,
            jwks,
        }
    }

    /// Verify a raw compact-serialized ID token
    ///
    /// # Arguments
    /// * `raw` - The `id_token` string from the token response
    /// * `expected_nonce` - Nonce sent with the authorization request
    ///
    /// # Errors
    /// `AppError::Verification` for any signature or claim failure
    pub async fn verify(
        &self,
        raw: &str,
        expected_nonce: Option<&str>,
    ) -> Result<VerifiedIdToken, AppError> {
        let header = decode_header(raw)
            .map_err(|e| AppError::Verification(format!("malformed jwt: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::Verification(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }

        let key = self
            .jwks
            .key_for(header.kid.as_deref())
            .await
            .map_err(|e| match e {
                AppError::Verification(_) => e,
                other => AppError::Verification(other.to_string()),
            })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = decode::<serde_json::Value>(raw, &key, &validation)
            .map_err(|e| AppError::Verification(e.to_string()))?;

        if let Some(expected) = expected_nonce {
            let nonce = data.claims.get("nonce").and_then(|v| v.as_str());
            if nonce != Some(expected) {
                return Err(AppError::Verification("nonce mismatch".to_string()));
            }
        }

        Ok(VerifiedIdToken {
            claims: data.claims,
        })
    }
}
