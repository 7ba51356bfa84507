pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rbac;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use tower_http::trace::TraceLayer;

use crate::config::AccessConfig;
use crate::middleware::{Authenticator, AuthenticatorSettings};
use crate::services::{
    AgentTokenStore, ExternalLogin, IapValidator, MembershipStore, MemoryStore,
    RegistrySessionStore, SessionManager, SessionStore, Synchroniser, TeamStore, TokenCodec,
    TokenService, UserStore, UserTokenStore,
};

/// Persistence backends used by the service.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub teams: Arc<dyn TeamStore>,
    pub memberships: Arc<dyn MembershipStore>,
    pub agent_tokens: Arc<dyn AgentTokenStore>,
    pub user_tokens: Arc<dyn UserTokenStore>,
    pub registry_sessions: Arc<dyn RegistrySessionStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    /// Every store backed by the same in-process store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            teams: store.clone(),
            memberships: store.clone(),
            agent_tokens: store.clone(),
            user_tokens: store.clone(),
            registry_sessions: store.clone(),
            sessions: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub authenticator: Arc<Authenticator>,
    pub sessions: SessionManager,
    pub tokens: TokenService,
    pub login: ExternalLogin,
    pub synchroniser: Synchroniser,
}

impl AppState {
    pub fn new(config: AccessConfig, stores: Stores, iap: Option<IapValidator>) -> Self {
        let codec = TokenCodec::new(&config.tokens.secret);

        let sessions = SessionManager::new(
            config.sessions.strategy,
            codec.clone(),
            stores.sessions.clone(),
            stores.registry_sessions.clone(),
            chrono::Duration::minutes(config.sessions.lifetime_minutes),
        );

        let tokens = TokenService::new(
            codec.clone(),
            stores.agent_tokens.clone(),
            stores.user_tokens.clone(),
            stores.registry_sessions.clone(),
            chrono::Duration::minutes(config.tokens.registry_session_expiry_minutes),
            chrono::Duration::days(config.tokens.user_token_expiry_days),
        );

        let synchroniser = Synchroniser::new(
            stores.users.clone(),
            stores.teams.clone(),
            stores.memberships.clone(),
        );

        let settings = AuthenticatorSettings {
            site_token: config.tokens.site_token.clone(),
            iap_header: config.iap.header.clone(),
            ui_prefix: config.http.ui_prefix.clone(),
            login_path: config.http.login_path.clone(),
            authenticated_prefixes: config.http.authenticated_prefixes.clone(),
        };

        let authenticator = Arc::new(Authenticator::new(
            settings,
            codec,
            iap,
            sessions.clone(),
            stores.users.clone(),
            stores.agent_tokens.clone(),
            stores.registry_sessions.clone(),
        ));

        Self {
            config,
            authenticator,
            login: ExternalLogin::new(synchroniser.clone(), sessions.clone()),
            sessions,
            tokens,
            synchroniser,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let ui = state.config.http.ui_prefix.trim_end_matches('/').to_string();

    Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/login/site-admin", post(handlers::session::site_admin_login))
        // UI
        .route(&format!("{}/profile", ui), get(handlers::session::profile))
        .route(&format!("{}/logout", ui), post(handlers::session::logout))
        .route(
            &format!("{}/sessions", ui),
            get(handlers::session::list_sessions),
        )
        .route(
            &format!("{}/sessions/revoke", ui),
            post(handlers::session::revoke_session),
        )
        // API
        .route(
            "/api/v2/account/details",
            get(handlers::account::account_details),
        )
        .route(
            "/api/v2/organizations/:org/agent-tokens",
            post(handlers::tokens::create_agent_token).get(handlers::tokens::list_agent_tokens),
        )
        .route(
            "/api/v2/agent-tokens/:id",
            delete(handlers::tokens::delete_agent_token),
        )
        .route(
            "/api/v2/tokens",
            post(handlers::tokens::create_user_token).get(handlers::tokens::list_user_tokens),
        )
        .route(
            "/api/v2/tokens/:id",
            delete(handlers::tokens::delete_user_token),
        )
        .route(
            "/api/v2/organizations/:org/registry-sessions",
            post(handlers::tokens::create_registry_session),
        )
        .route(
            "/api/v2/organizations/:org/run-tokens",
            post(handlers::tokens::create_run_token),
        )
        .layer(from_fn_with_state(
            state.authenticator.clone(),
            middleware::authenticate,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}
