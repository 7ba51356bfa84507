use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::utils::constant_time_eq;
use validator::Validate;

use crate::{
    middleware::{CurrentSubject, RETURN_URL_COOKIE},
    models::{RevokeSessionRequest, SessionResponse, SITE_ADMIN_USERNAME, SESSION_COOKIE},
    services::{session_removal_cookie, ServiceError},
    utils::validation::ValidatedJson,
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SiteAdminLoginRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub kind: &'static str,
    pub subject: String,
}

/// Starts a session for the reserved site-admin user when the configured
/// site token is presented.
pub async fn site_admin_login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<SiteAdminLoginRequest>,
) -> Result<Response, AppError> {
    let authorized = state
        .config
        .tokens
        .site_token
        .as_ref()
        .is_some_and(|expected| constant_time_eq(expected.expose_secret(), &req.token));
    if !authorized {
        tracing::warn!("Rejected site admin login");
        return Err(AppError::Unauthorized(anyhow::anyhow!("login failed")));
    }

    let issued = state
        .sessions
        .start_session(SITE_ADMIN_USERNAME, &client_address(connect_info))
        .await
        .map_err(ServiceError::from)?;

    Ok(login_redirect(
        jar,
        state.sessions.cookie(&issued),
        &state.config.http.ui_prefix,
    ))
}

/// Sets the session cookie and sends the browser back to where it was
/// headed before login, or to the profile page.
pub fn login_redirect(jar: CookieJar, session: Cookie<'static>, ui_prefix: &str) -> Response {
    let target = jar
        .get(RETURN_URL_COOKIE)
        .and_then(|cookie| urlencoding::decode(cookie.value()).ok())
        .map(|path| path.into_owned())
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| format!("{}/profile", ui_prefix.trim_end_matches('/')));

    let jar = jar
        .add(session)
        .add(Cookie::build((RETURN_URL_COOKIE, "")).path("/").removal().build());

    (jar, Redirect::to(&target)).into_response()
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

fn client_address(connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn profile(CurrentSubject(subject): CurrentSubject) -> impl IntoResponse {
    Json(ProfileResponse {
        kind: subject.kind(),
        subject: subject.to_string(),
    })
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state
            .sessions
            .end_session(cookie.value())
            .await
            .map_err(ServiceError::from)?;
    }

    let jar = jar.add(session_removal_cookie());
    Ok((jar, Redirect::to(&state.config.http.login_path)).into_response())
}

pub async fn list_sessions(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
) -> Result<impl IntoResponse, AppError> {
    let user = subject.as_user().ok_or(ServiceError::UserRequired)?;
    let sessions = state
        .sessions
        .list(&user.username)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(
        sessions.iter().map(SessionResponse::from).collect::<Vec<_>>(),
    ))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    Json(req): Json<RevokeSessionRequest>,
) -> Result<StatusCode, AppError> {
    let user = subject.as_user().ok_or(ServiceError::UserRequired)?;
    state
        .sessions
        .revoke(&user.username, &req.id)
        .await
        .map_err(ServiceError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
