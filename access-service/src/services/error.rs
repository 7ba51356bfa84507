use service_core::error::AppError;
use thiserror::Error;

use super::authorizer::Scope;
use crate::rbac::Action;

/// Failures of the signed token codec.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token signature mismatch")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("unknown token kind: {0}")]
    UnknownKind(String),

    #[error("failed to sign token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

/// Collaborator store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,

    #[error("resource already exists")]
    AlreadyExists,

    #[error("store error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Why a request could not be resolved to a subject. The display text is for
/// server-side logs only; clients see a generic message.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no authentication token found")]
    MissingToken,

    #[error("malformed token")]
    MalformedToken,

    #[error("token signature mismatch")]
    InvalidSignature,

    #[error("token expired")]
    ExpiredToken,

    #[error("unknown token kind: {0}")]
    UnknownKind(String),

    #[error("subject not found")]
    SubjectNotFound,

    #[error("federated identity rejected: {0}")]
    Federated(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl AuthError {
    /// The only text a client ever sees for an authentication failure.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "no authentication token found",
            _ => "invalid authentication token",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed | TokenError::Encode(_) => AuthError::MalformedToken,
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::UnknownKind(kind) => AuthError::UnknownKind(kind),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::SubjectNotFound,
            other => AuthError::Store(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Unauthorized(anyhow::anyhow!(err.public_message()))
    }
}

/// An authorization decision went against the subject. Names the action and
/// scope only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("access denied: cannot {action} on {scope}")]
pub struct AccessDenied {
    pub action: Action,
    pub scope: Scope,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to {operation} {target}: {source}")]
    Membership {
        operation: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("operation unsupported with stateless sessions")]
    Unsupported,

    #[error("session not found")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => SessionError::NotFound,
            other => SessionError::Store(other),
        }
    }
}

/// Umbrella error for the service layer, converted to an HTTP response at
/// the handler boundary.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error("operation requires an authenticated user")]
    UserRequired,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::AccessDenied(e) => AppError::Forbidden(anyhow::anyhow!(e)),
            ServiceError::UserRequired => AppError::Forbidden(anyhow::anyhow!(ServiceError::UserRequired)),
            ServiceError::Store(StoreError::NotFound) => {
                AppError::NotFound(anyhow::anyhow!("resource not found"))
            }
            ServiceError::Store(StoreError::AlreadyExists) => {
                AppError::Conflict(anyhow::anyhow!("resource already exists"))
            }
            ServiceError::Session(SessionError::Unsupported) => {
                AppError::BadRequest(anyhow::anyhow!(SessionError::Unsupported))
            }
            ServiceError::Session(SessionError::NotFound) => {
                AppError::NotFound(anyhow::anyhow!("session not found"))
            }
            ServiceError::Store(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Token(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Session(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Sync(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

impl From<AccessDenied> for AppError {
    fn from(err: AccessDenied) -> Self {
        AppError::Forbidden(anyhow::anyhow!(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_auth_errors_render_generic_message() {
        assert_eq!(AuthError::MissingToken.public_message(), "no authentication token found");
        for err in [
            AuthError::MalformedToken,
            AuthError::InvalidSignature,
            AuthError::ExpiredToken,
            AuthError::UnknownKind("bogus".into()),
            AuthError::SubjectNotFound,
            AuthError::Federated("bad audience".into()),
        ] {
            assert_eq!(err.public_message(), "invalid authentication token");
        }
    }

    #[test]
    fn test_auth_error_is_unauthorized() {
        let res = AppError::from(AuthError::ExpiredToken).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_access_denied_names_action_and_scope() {
        let err = AccessDenied {
            action: Action::DeleteTeam,
            scope: Scope::Organization("acme".into()),
        };
        assert_eq!(err.to_string(), "access denied: cannot delete_team on organization acme");
        let res = AppError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_store_not_found_maps_to_subject_not_found() {
        assert!(matches!(
            AuthError::from(StoreError::NotFound),
            AuthError::SubjectNotFound
        ));
    }
}
