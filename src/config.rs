//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub oidc: OidcConfig,
    pub frontend: FrontendConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Identity provider registration (single Entra ID tenant)
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    /// Authority host, e.g. "https://login.microsoftonline.com"
    pub authority: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Absolute URL of `/oidc/login/callback` as registered with the provider
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl OidcConfig {
    /// Tenant-scoped v2.0 issuer
    ///
    /// # Returns
    /// URL like "https://login.microsoftonline.com/{tenant}/v2.0"
    pub fn issuer_url(&self) -> String {
        format!(
            "{}/{}/v2.0",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Logout endpoint used when discovery does not advertise one
    pub fn fallback_logout_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/logout",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

/// Single-page front-end the service hands users back to
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Front-end origin (e.g., "http://localhost:3000")
    pub url: String,
    /// Path the browser lands on after login
    pub dashboard_path: String,
}

impl FrontendConfig {
    pub fn origin(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}{}", self.origin(), self.dashboard_path)
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session signing secret (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 28800 = 8 hours)
    pub session_max_age: i64,
    /// Mark cookies `Secure` (disable only for plain-http development)
    pub secure_cookies: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Default `EnvFilter` directive for the configured level
    pub fn filter_directive(&self) -> String {
        format!("entra_rp={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (ENTRA_RP__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("oidc.authority", "https://login.microsoftonline.com")?
            .set_default(
                "oidc.redirect_url",
                "http://localhost:8080/oidc/login/callback",
            )?
            .set_default("oidc.scopes", vec!["openid", "profile", "email"])?
            .set_default("frontend.url", "http://localhost:3000")?
            .set_default("frontend.dashboard_path", "/dashboard")?
            .set_default("auth.session_max_age", 28800)?
            .set_default("auth.secure_cookies", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("ENTRA_RP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("oidc.scopes")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;
        const MAX_SESSION_MAX_AGE_SECONDS: i64 = 365 * 24 * 3600;

        for (key, value) in [
            ("oidc.tenant_id", &self.oidc.tenant_id),
            ("oidc.client_id", &self.oidc.client_id),
            ("oidc.client_secret", &self.oidc.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(crate::error::AppError::Config(format!(
                    "{key} must not be empty"
                )));
            }
        }

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.session_max_age > MAX_SESSION_MAX_AGE_SECONDS {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_max_age must be at most {} seconds",
                MAX_SESSION_MAX_AGE_SECONDS
            )));
        }

        for (key, value) in [
            ("oidc.authority", &self.oidc.authority),
            ("oidc.redirect_url", &self.oidc.redirect_url),
            ("frontend.url", &self.frontend.url),
        ] {
            url::Url::parse(value).map_err(|e| {
                crate::error::AppError::Config(format!("{key} is not a valid URL: {e}"))
            })?;
        }

        if !self.oidc.scopes.iter().any(|scope| scope == "openid") {
            return Err(crate::error::AppError::Config(
                "oidc.scopes must include \"openid\"".to_string(),
            ));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }

        if !["pretty", "json"].contains(&self.logging.format.as_str()) {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\" (got {:?})",
                self.logging.format
            )));
        }

        Ok(())
    }
}
