#![allow(dead_code)]

use std::sync::Arc;

use access_service::{
    build_router,
    config::{AccessConfig, Environment, HttpConfig, IapConfig, SessionConfig, TokenConfig},
    models::{Team, User},
    services::{
        IapValidator, MemoryStore, SessionStrategy, StaticKeySource, TeamStore, UserStore,
        DEFAULT_IAP_HEADER, IAP_ISSUER,
    },
    AppState, Stores,
};
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{jwk::JwkSet, Algorithm, EncodingKey, Header};
use secrecy::SecretString;
use tower::ServiceExt;

pub const TOKEN_SECRET: &str = "0123456789abcdef0123456789abcdef";
pub const SITE_TOKEN: &str = "site-token-for-tests";
pub const IAP_AUDIENCE: &str = "/projects/1/global/backendServices/2";
const IAP_SIGNING_KEY: &str = "iap-test-signing-key-0123456789ab";

pub fn test_config(strategy: SessionStrategy) -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        environment: Environment::Dev,
        service_name: "access-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        tokens: TokenConfig {
            secret: SecretString::new(TOKEN_SECRET.to_string()),
            site_token: Some(SecretString::new(SITE_TOKEN.to_string())),
            registry_session_expiry_minutes: 10,
            user_token_expiry_days: 365,
        },
        iap: IapConfig {
            audience: Some(IAP_AUDIENCE.to_string()),
            header: DEFAULT_IAP_HEADER.to_string(),
            jwks_url: "http://127.0.0.1:1/jwks".to_string(),
        },
        sessions: SessionConfig {
            strategy,
            lifetime_minutes: 60,
            sweep_interval_seconds: 300,
        },
        http: HttpConfig {
            ui_prefix: "/app".to_string(),
            login_path: "/login".to_string(),
            authenticated_prefixes: vec!["/api/".to_string(), "/app/".to_string()],
        },
    }
}

fn iap_validator() -> IapValidator {
    let keys: JwkSet = serde_json::from_value(serde_json::json!({
        "keys": [{
            "kty": "oct",
            "kid": "test",
            "alg": "HS256",
            "k": "aWFwLXRlc3Qtc2lnbmluZy1rZXktMDEyMzQ1Njc4OWFi"
        }]
    }))
    .unwrap();
    IapValidator::new(
        Some(IAP_AUDIENCE.to_string()),
        Arc::new(StaticKeySource::new(keys)),
    )
    .with_algorithms(vec![Algorithm::HS256])
}

/// Signs a proxy assertion with the test key.
pub fn iap_assertion(email: &str) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("test".to_string());
    let claims = serde_json::json!({
        "email": email,
        "iss": IAP_ISSUER,
        "aud": IAP_AUDIENCE,
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    jsonwebtoken::encode(
        &header,
        &claims,
        &EncodingKey::from_secret(IAP_SIGNING_KEY.as_bytes()),
    )
    .unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_strategy(SessionStrategy::Stateful)
    }

    pub fn with_strategy(strategy: SessionStrategy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            test_config(strategy),
            Stores::memory(store.clone()),
            Some(iap_validator()),
        );
        let router = build_router(state.clone());
        Self {
            state,
            store,
            router,
        }
    }

    /// Creates a user with the given team memberships.
    pub async fn seed_user(&self, username: &str, teams: Vec<Team>) -> User {
        let mut user = User::new(username);
        for team in &teams {
            self.store.create_team(team.clone()).await.unwrap();
            if !user.organizations.contains(&team.organization) {
                user.organizations.push(team.organization.clone());
            }
        }
        user.teams = teams;
        self.store.create_user(user).await.unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer(builder: axum::http::request::Builder, token: &str) -> Request<Body> {
    builder
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Every `Set-Cookie` header value on the response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of the named cookie set on the response, if any.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
