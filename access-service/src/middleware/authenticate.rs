//! Resolves every inbound request to exactly one [`Subject`].
//!
//! Credentials are tried in a fixed order: identity-aware proxy assertion,
//! bearer token, then (for UI paths only) the session cookie. The first
//! scheme that is present decides the outcome; later schemes are not
//! consulted. The dispatcher never authorizes.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use secrecy::{ExposeSecret, SecretString};
use service_core::error::AppError;
use service_core::utils::{constant_time_eq, sha256_hex};

use crate::models::{
    RegistrySession, RunToken, SiteAdmin, Subject, AGENT_TOKEN_PREFIX, REGISTRY_SESSION_PREFIX,
    SESSION_COOKIE, SITE_ADMIN_USERNAME,
};
use crate::services::{
    AgentTokenStore, AuthError, Claims, IapValidator, RegistrySessionStore, SessionError,
    SessionManager, TokenCodec, UserSpec, UserStore, REDACTED,
};

/// Cookie carrying a one-shot message for the login page.
pub const FLASH_COOKIE: &str = "flash";

/// Cookie carrying the path to return to after logging in.
pub const RETURN_URL_COOKIE: &str = "return-url";

/// Path and credential settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct AuthenticatorSettings {
    pub site_token: Option<SecretString>,
    pub iap_header: String,
    pub ui_prefix: String,
    pub login_path: String,
    pub authenticated_prefixes: Vec<String>,
}

/// Outcome of a successful authentication pass.
#[derive(Debug)]
pub enum Authentication {
    /// The path does not require authentication.
    Unprotected,
    Authenticated(Subject),
}

/// Outcome of a failed authentication pass.
#[derive(Debug)]
pub enum Rejection {
    /// API request: generic 401.
    Unauthorized(AuthError),
    /// UI request: send the browser to the login page.
    Login {
        error: AuthError,
        login_path: String,
        return_to: String,
    },
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::Unauthorized(err) => AppError::from(err).into_response(),
            Rejection::Login {
                error,
                login_path,
                return_to,
            } => {
                let flash = Cookie::build((
                    FLASH_COOKIE,
                    urlencoding::encode(flash_message(&error)).into_owned(),
                ))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .build();
                let return_url = Cookie::build((
                    RETURN_URL_COOKIE,
                    urlencoding::encode(&return_to).into_owned(),
                ))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .build();
                let jar = CookieJar::new().add(flash).add(return_url);

                (StatusCode::FOUND, jar, [(header::LOCATION, login_path)]).into_response()
            }
        }
    }
}

fn flash_message(error: &AuthError) -> &'static str {
    match error {
        AuthError::MissingToken => "You need to log in to access the requested page",
        AuthError::ExpiredToken => "Your session has expired, please log in again",
        _ => "Unable to verify your session, please log in again",
    }
}

pub struct Authenticator {
    settings: AuthenticatorSettings,
    codec: TokenCodec,
    iap: Option<IapValidator>,
    sessions: SessionManager,
    users: Arc<dyn UserStore>,
    agent_tokens: Arc<dyn AgentTokenStore>,
    registry_sessions: Arc<dyn RegistrySessionStore>,
}

impl Authenticator {
    pub fn new(
        settings: AuthenticatorSettings,
        codec: TokenCodec,
        iap: Option<IapValidator>,
        sessions: SessionManager,
        users: Arc<dyn UserStore>,
        agent_tokens: Arc<dyn AgentTokenStore>,
        registry_sessions: Arc<dyn RegistrySessionStore>,
    ) -> Self {
        Self {
            settings,
            codec,
            iap,
            sessions,
            users,
            agent_tokens,
            registry_sessions,
        }
    }

    pub fn settings(&self) -> &AuthenticatorSettings {
        &self.settings
    }

    pub async fn authenticate(&self, parts: &Parts) -> Result<Authentication, Rejection> {
        let path = parts.uri.path();
        if !self.is_protected(path) {
            return Ok(Authentication::Unprotected);
        }

        let result = if let Some(assertion) = parts.headers.get(self.settings.iap_header.as_str()) {
            self.resolve_iap(assertion.to_str().map_err(|_| AuthError::MalformedToken))
                .await
                .map_err(Rejection::Unauthorized)
        } else if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
            self.resolve_bearer(value.to_str().map_err(|_| AuthError::MalformedToken))
                .await
                .map_err(Rejection::Unauthorized)
        } else if self.is_ui(path) {
            self.resolve_session(parts).await.map_err(|error| Rejection::Login {
                error,
                login_path: self.settings.login_path.clone(),
                return_to: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| path.to_string()),
            })
        } else {
            Err(Rejection::Unauthorized(AuthError::MissingToken))
        };

        match result {
            Ok(subject) => {
                tracing::debug!(subject = %subject, path = %path, "Authenticated request");
                Ok(Authentication::Authenticated(subject))
            }
            Err(rejection) => {
                let error = match &rejection {
                    Rejection::Unauthorized(e) | Rejection::Login { error: e, .. } => e,
                };
                tracing::warn!(path = %path, error = %error, token = REDACTED, "Authentication failed");
                Err(rejection)
            }
        }
    }

    fn is_protected(&self, path: &str) -> bool {
        self.settings
            .authenticated_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn is_ui(&self, path: &str) -> bool {
        let prefix = self.settings.ui_prefix.trim_end_matches('/');
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    async fn resolve_iap(&self, assertion: Result<&str, AuthError>) -> Result<Subject, AuthError> {
        let assertion = assertion?;
        let validator = self
            .iap
            .as_ref()
            .ok_or_else(|| AuthError::Federated("identity-aware proxy not configured".to_string()))?;
        let email = validator.validate(assertion).await?;
        let user = self.users.get_user(&UserSpec::Username(email)).await?;
        Ok(Subject::User(user))
    }

    async fn resolve_bearer(&self, header: Result<&str, AuthError>) -> Result<Subject, AuthError> {
        let token = header?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedToken)?;

        if let Some(site_token) = &self.settings.site_token {
            if constant_time_eq(site_token.expose_secret(), token) {
                return Ok(Subject::SiteAdmin(SiteAdmin));
            }
        }

        if token.starts_with(AGENT_TOKEN_PREFIX) {
            let agent = self
                .agent_tokens
                .get_agent_token_by_digest(&sha256_hex(token))
                .await?;
            return Ok(Subject::AgentToken(agent));
        }

        if token.starts_with(REGISTRY_SESSION_PREFIX) {
            let session = self
                .registry_sessions
                .get_registry_session(&sha256_hex(token))
                .await?;
            if session.is_expired(chrono::Utc::now()) {
                return Err(AuthError::ExpiredToken);
            }
            return Ok(Subject::RegistrySession(session));
        }

        let decoded = self.codec.decode(token)?;
        match decoded.claims {
            Claims::AgentToken {
                token_id,
                organization,
            } => {
                let agent = self.agent_tokens.get_agent_token(&token_id).await?;
                if agent.organization != organization {
                    return Err(AuthError::MalformedToken);
                }
                Ok(Subject::AgentToken(agent))
            }
            Claims::UserToken { token_id } => {
                let user = self.users.get_user(&UserSpec::TokenId(token_id)).await?;
                Ok(Subject::User(user))
            }
            Claims::RunToken {
                run_id,
                organization,
            } => Ok(Subject::RunToken(RunToken {
                run_id,
                organization,
                expiry: decoded.expiry,
            })),
            Claims::RegistrySession { organization } => {
                Ok(Subject::RegistrySession(RegistrySession {
                    organization,
                    expiry: decoded.expiry,
                }))
            }
            Claims::UserSession { .. } => {
                tracing::debug!("Session token presented as bearer token");
                Err(AuthError::MalformedToken)
            }
        }
    }

    async fn resolve_session(&self, parts: &Parts) -> Result<Subject, AuthError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar.get(SESSION_COOKIE).ok_or(AuthError::MissingToken)?;

        let username = self
            .sessions
            .redeem(cookie.value())
            .await
            .map_err(|e| match e {
                SessionError::Expired => AuthError::ExpiredToken,
                SessionError::NotFound => AuthError::SubjectNotFound,
                SessionError::Token(e) => e.into(),
                SessionError::Store(e) => e.into(),
                SessionError::Unsupported => AuthError::MalformedToken,
            })?;

        if username == SITE_ADMIN_USERNAME {
            return Ok(Subject::SiteAdmin(SiteAdmin));
        }
        let user = self.users.get_user(&UserSpec::Username(username)).await?;
        Ok(Subject::User(user))
    }
}

/// Attaches the authenticated subject to the request, or rejects it.
pub async fn authenticate(
    State(authenticator): State<Arc<Authenticator>>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    match authenticator.authenticate(&parts).await {
        Ok(Authentication::Unprotected) => {}
        Ok(Authentication::Authenticated(subject)) => {
            parts.extensions.insert(subject);
        }
        Err(rejection) => return rejection.into_response(),
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Extractor for the subject attached by [`authenticate`].
pub struct CurrentSubject(pub Subject);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentSubject
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let subject = parts.extensions.get::<Subject>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Subject missing from request extensions"
            ))
        })?;

        Ok(CurrentSubject(subject.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_rejection_redirects_with_cookies() {
        let response = Rejection::Login {
            error: AuthError::ExpiredToken,
            login_path: "/login".to_string(),
            return_to: "/app/workspaces?page=2".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");

        let cookies: Vec<&str> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("return-url=%2Fapp%2Fworkspaces%3Fpage%3D2")));
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("flash=Your%20session%20has%20expired")));
    }

    #[test]
    fn test_api_rejection_is_generic() {
        let response = Rejection::Unauthorized(AuthError::InvalidSignature).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key(header::SET_COOKIE));
    }
}
