//! Common test utilities for E2E tests

#![allow(dead_code)]

use entra_rp::{AppState, config};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "tenant-123";
pub const CLIENT_ID: &str = "client-abc";
pub const KID: &str = "test-key-1";
pub const FRONTEND_URL: &str = "http://localhost:3000";

pub const PROVIDER_KEY_PEM: &str = include_str!("../fixtures/provider_key.pem");
pub const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");
const PROVIDER_KEY_N: &str = include_str!("../fixtures/provider_key.n");

/// Mock Entra ID tenant (discovery, JWKS, token endpoint)
pub struct MockProvider {
    pub server: MockServer,
}

impl MockProvider {
    /// Start a provider serving discovery and JWKS
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let provider = Self { server };

        Mock::given(method("GET"))
            .and(path(format!("/{TENANT}/v2.0/.well-known/openid-configuration")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": provider.issuer(),
                "authorization_endpoint": provider.authorize_endpoint(),
                "token_endpoint": provider.token_endpoint(),
                "jwks_uri": format!("{}/{TENANT}/discovery/v2.0/keys", provider.server.uri()),
                "end_session_endpoint": provider.end_session_endpoint(),
                "response_types_supported": ["code", "id_token"],
                "id_token_signing_alg_values_supported": ["RS256"]
            })))
            .mount(&provider.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/{TENANT}/discovery/v2.0/keys")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{
                    "kty": "RSA",
                    "use": "sig",
                    "alg": "RS256",
                    "kid": KID,
                    "n": PROVIDER_KEY_N.trim(),
                    "e": "AQAB"
                }]
            })))
            .mount(&provider.server)
            .await;

        provider
    }

    pub fn authority(&self) -> String {
        self.server.uri()
    }

    pub fn issuer(&self) -> String {
        format!("{}/{TENANT}/v2.0", self.server.uri())
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/{TENANT}/oauth2/v2.0/authorize", self.server.uri())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/{TENANT}/oauth2/v2.0/token", self.server.uri())
    }

    pub fn end_session_endpoint(&self) -> String {
        format!("{}/{TENANT}/oauth2/v2.0/logout", self.server.uri())
    }

    /// Make the next token request answer with `status` and `body`
    pub async fn mock_token_endpoint(&self, status: u16, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Claims for a valid ID token
    pub fn id_token_claims(&self, nonce: &str) -> serde_json::Value {
        let now = chrono::Utc::now().timestamp();
        serde_json::json!({
            "iss": self.issuer(),
            "aud": CLIENT_ID,
            "sub": "AAAAAAAAAAAAAAAAAAAAAIkzqFVrSaSaFHy782bbtaQ",
            "iat": now,
            "nbf": now,
            "exp": now + 3600,
            "nonce": nonce,
            "email": "ada@example.com",
            "name": "Ada Lovelace",
            "tid": TENANT
        })
    }

    pub fn sign(&self, claims: &serde_json::Value, pem: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_string());
        encode(
            &header,
            claims,
            &EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key parses"),
        )
        .expect("id token encodes")
    }

    /// Token endpoint success body carrying `id_token`
    pub fn token_body(id_token: &str) -> serde_json::Value {
        serde_json::json!({
            "token_type": "Bearer",
            "scope": "openid profile email",
            "expires_in": 3599,
            "access_token": "access-token",
            "id_token": id_token
        })
    }
}

/// Result of `GET /oidc/login`
pub struct LoginStart {
    pub location: url::Url,
    pub state: String,
    pub nonce: String,
    /// `oidc_state=...` pair for the Cookie header
    pub state_cookie: String,
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: MockProvider,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance against a fresh mock provider
    pub async fn new() -> Self {
        let provider = MockProvider::start().await;
        let config = test_config(&provider);

        let state = AppState::new(config).await.expect("provider discovery");

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("client builds");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = entra_rp::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Self {
            addr: addr_str,
            state,
            provider,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start a login and capture state, nonce and the state cookie
    pub async fn start_login(&self) -> LoginStart {
        let response = self
            .client
            .get(self.url("/oidc/login"))
            .send()
            .await
            .expect("login request succeeds");
        assert_eq!(response.status(), 302);

        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(|v| url::Url::parse(v).expect("absolute location"))
            .expect("location header");
        let state_cookie = cookie_pair(&response, "oidc_state").expect("state cookie set");

        let param = |name: &str| {
            location
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_else(|| panic!("{name} in authorization url"))
        };

        LoginStart {
            state: param("state"),
            nonce: param("nonce"),
            location,
            state_cookie,
        }
    }

    /// Hit the callback with `state` and `code`, presenting `cookie`
    pub async fn callback(&self, state: &str, code: &str, cookie: &str) -> reqwest::Response {
        self.client
            .get(self.url("/oidc/login/callback"))
            .query(&[("state", state), ("code", code)])
            .header("Cookie", cookie)
            .send()
            .await
            .expect("callback request succeeds")
    }

    /// Run the whole flow and return the `session=...` pair
    pub async fn sign_in(&self) -> String {
        self.sign_in_with(None).await
    }

    /// Run the whole flow, presenting `existing` session cookie if given
    pub async fn sign_in_with(&self, existing: Option<&str>) -> String {
        let login = self.start_login().await;
        let id_token = self
            .provider
            .sign(&self.provider.id_token_claims(&login.nonce), PROVIDER_KEY_PEM);
        self.provider
            .mock_token_endpoint(200, MockProvider::token_body(&id_token))
            .await;

        let cookie = match existing {
            Some(session) => format!("{}; {session}", login.state_cookie),
            None => login.state_cookie,
        };
        let response = self.callback(&login.state, "auth-code", &cookie).await;
        assert_eq!(response.status(), 302);
        cookie_pair(&response, "session").expect("session cookie set")
    }

    pub async fn me(&self, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url("/me"));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.expect("me request succeeds")
    }
}

pub fn test_config(provider: &MockProvider) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        oidc: config::OidcConfig {
            authority: provider.authority(),
            tenant_id: TENANT.to_string(),
            client_id: CLIENT_ID.to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "http://localhost:8080/oidc/login/callback".to_string(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
        },
        frontend: config::FrontendConfig {
            url: FRONTEND_URL.to_string(),
            dashboard_path: "/dashboard".to_string(),
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 28_800,
            secure_cookies: true,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// All `Set-Cookie` header values
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// Full `Set-Cookie` value for the non-empty cookie `name`
pub fn set_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|v| v.starts_with(&prefix) && !v.starts_with(&format!("{prefix};")))
}

/// `Set-Cookie` value that removes the cookie `name`
pub fn removal_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=;");
    set_cookies(response)
        .into_iter()
        .find(|v| v.starts_with(&prefix))
}

/// `name=value` pair of a non-empty cookie, ready for a Cookie header
pub fn cookie_pair(response: &reqwest::Response, name: &str) -> Option<String> {
    set_cookie(response, name).map(|v| v.split(';').next().unwrap_or_default().to_string())
}
