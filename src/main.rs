//! entra-rp binary entry point

use entra_rp::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are swept from memory
const SESSION_PRUNE_INTERVAL_SECS: u64 = 60;

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Discover the identity provider (fatal on failure)
/// 4. Build Axum router
/// 5. Start background session pruning
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);

    tracing::info!("Starting entra-rp...");
    tracing::info!(
        tenant = %config.oidc.tenant_id,
        client_id = %config.oidc.client_id,
        frontend = %config.frontend.url,
        "Configuration loaded"
    );
    if !config.auth.secure_cookies {
        tracing::warn!("Using insecure session cookies; only suitable for local development");
    }

    entra_rp::metrics::init_metrics();

    // 3. Initialize application state
    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(error) => {
            tracing::error!(%error, "Failed to initialize provider");
            std::process::exit(1);
        }
    };

    // 4. Build Axum router
    let app = entra_rp::build_router(state.clone());

    // 5. Start background tasks
    spawn_session_prune_task(state);

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level when set.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directive().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Spawn background session pruning task
fn spawn_session_prune_task(state: AppState) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(SESSION_PRUNE_INTERVAL_SECS));

        loop {
            interval.tick().await;

            let removed = state.sessions.prune_expired().await;
            if removed > 0 {
                tracing::info!(removed, "Pruned expired sessions");
            }
        }
    });

    tracing::info!("Session prune task spawned");
}
