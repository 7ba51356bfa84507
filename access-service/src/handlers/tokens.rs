use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use service_core::error::AppError;

use crate::{
    middleware::CurrentSubject,
    models::{
        CreateAgentTokenRequest, CreateRegistrySessionRequest, CreateRunTokenRequest,
        CreateUserTokenRequest,
    },
    services::IssuedCredential,
    utils::validation::ValidatedJson,
    AppState,
};

/// A newly created long-lived token. `token` is shown only here.
#[derive(Debug, Serialize)]
pub struct CreatedTokenResponse {
    pub id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub created_at: DateTime<Utc>,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl From<IssuedCredential> for CredentialResponse {
    fn from(issued: IssuedCredential) -> Self {
        Self {
            token: issued.token.expose_secret().clone(),
            expiry: issued.expiry,
        }
    }
}

pub async fn create_agent_token(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    Path(organization): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateAgentTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = state
        .tokens
        .create_agent_token(&subject, &organization, &req.description)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedTokenResponse {
            id: created.token.id,
            description: created.token.description,
            organization: Some(created.token.organization),
            created_at: created.token.created_at,
            token: created.secret.expose_secret().clone(),
        }),
    ))
}

pub async fn list_agent_tokens(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    Path(organization): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state.tokens.list_agent_tokens(&subject, &organization).await?;
    Ok(Json(tokens))
}

pub async fn delete_agent_token(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.tokens.delete_agent_token(&subject, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_user_token(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    ValidatedJson(req): ValidatedJson<CreateUserTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = state
        .tokens
        .create_user_token(&subject, &req.description)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedTokenResponse {
            id: created.token.id,
            description: created.token.description,
            organization: None,
            created_at: created.token.created_at,
            token: created.secret.expose_secret().clone(),
        }),
    ))
}

pub async fn list_user_tokens(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state.tokens.list_user_tokens(&subject).await?;
    Ok(Json(tokens))
}

pub async fn delete_user_token(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.tokens.delete_user_token(&subject, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_registry_session(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    Path(organization): Path<String>,
    req: Option<Json<CreateRegistrySessionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let issued = state
        .tokens
        .create_registry_session(&subject, &organization, req.opaque)
        .await?;
    Ok((StatusCode::CREATED, Json(CredentialResponse::from(issued))))
}

pub async fn create_run_token(
    State(state): State<AppState>,
    CurrentSubject(subject): CurrentSubject,
    Path(organization): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateRunTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = state
        .tokens
        .create_run_token(&subject, &organization, &req.run_id)
        .await?;
    Ok((StatusCode::CREATED, Json(CredentialResponse::from(issued))))
}
