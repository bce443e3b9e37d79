//! entra-rp - A minimal OpenID Connect relying party for Microsoft Entra ID
//!
//! # Architecture
//!
//! ```text
//! browser ──► /oidc/login ─────────► provider /authorize
//!         ◄── /oidc/login/callback ◄─ code + state
//!               │ token exchange, ID token verification
//!               ▼
//!           SessionStore (in-memory) ◄── /me, /oidc/logout
//! ```
//!
//! # Modules
//!
//! - `api`: Session reader and metrics endpoints
//! - `auth`: Login flow, pending login state, sessions
//! - `provider`: OIDC discovery, JWKS, ID token verification, code exchange
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod provider;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Built explicitly at startup; nothing here is process-global, so several
/// instances can run side by side.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Discovered identity provider
    pub oidc: Arc<provider::OidcClient>,

    /// In-memory session store
    pub sessions: Arc<auth::SessionStore>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build HTTP client
    /// 2. Discover the provider and fetch its signing keys
    /// 3. Create the session store
    ///
    /// # Errors
    /// Returns error if the provider cannot be reached
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("entra-rp/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let oidc = provider::OidcClient::discover(&config.oidc, Arc::new(http_client)).await?;
        let sessions = auth::SessionStore::new(config.auth.session_max_age)?;

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            oidc: Arc::new(oidc),
            sessions: Arc::new(sessions),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.frontend);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::me_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

/// Allow the front-end origin to call `/me` with credentials
fn build_cors_layer(frontend: &config::FrontendConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let base = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    match HeaderValue::from_str(frontend.origin()) {
        Ok(origin) => base.allow_origin([origin]).allow_credentials(true),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %frontend.origin(),
                "Failed to parse CORS origin from frontend URL; denying cross-origin requests"
            );
            base
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
