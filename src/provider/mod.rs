//! OpenID Connect provider integration
//!
//! Handles:
//! - Provider discovery
//! - JWKS fetching and caching
//! - ID token verification
//! - Authorization URL construction and code exchange

mod client;
mod discovery;
mod jwks;
mod verify;

pub use client::{OidcClient, TokenResponse};
pub use discovery::{ProviderMetadata, discover};
pub use jwks::JwksCache;
pub use verify::{IdTokenVerifier, VerifiedIdToken};
