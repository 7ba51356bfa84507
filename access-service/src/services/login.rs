use service_core::error::AppError;

use super::sessions::{IssuedSession, SessionManager};
use super::synchroniser::{ExternalIdentity, Synchroniser};
use crate::models::{User, SITE_ADMIN_USERNAME};

/// Finishes an external identity-provider login once the provider's
/// handshake has produced an identity.
#[derive(Clone)]
pub struct ExternalLogin {
    synchroniser: Synchroniser,
    sessions: SessionManager,
}

impl ExternalLogin {
    pub fn new(synchroniser: Synchroniser, sessions: SessionManager) -> Self {
        Self {
            synchroniser,
            sessions,
        }
    }

    /// Synchronises the identity's memberships and starts a session for it.
    /// Every failure surfaces as the same generic login failure.
    pub async fn complete(
        &self,
        identity: &ExternalIdentity,
        address: &str,
    ) -> Result<(User, IssuedSession), AppError> {
        if identity.username.is_empty() || identity.username == SITE_ADMIN_USERNAME {
            tracing::warn!(user = %identity.username, "Rejected login for reserved username");
            return Err(login_failed());
        }

        let user = self.synchroniser.synchronise(identity).await.map_err(|e| {
            tracing::error!(user = %identity.username, error = %e, "Membership sync failed during login");
            login_failed()
        })?;

        let session = self
            .sessions
            .start_session(&user.username, address)
            .await
            .map_err(|e| {
                tracing::error!(user = %user.username, error = %e, "Failed to start session");
                login_failed()
            })?;

        tracing::info!(user = %user.username, "Login completed");
        Ok((user, session))
    }
}

fn login_failed() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!("login failed"))
}
