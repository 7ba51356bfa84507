//! Issuance and management of agent tokens, user API tokens, registry
//! sessions and run tokens. Every mutation is authorized first.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use service_core::utils::sha256_hex;

use super::authorizer::{authorize, Scope};
use super::error::{ServiceError, StoreError};
use super::store::{AgentTokenStore, RegistrySessionStore, UserTokenStore};
use super::token::{Claims, TokenCodec};
use crate::models::{
    AgentToken, CreatedAgentToken, CreatedUserToken, RegistrySession, Subject, User, UserToken,
    AGENT_TOKEN_PREFIX, REGISTRY_SESSION_PREFIX,
};
use crate::rbac::Action;
use crate::utils::random_token;

/// A minted short-lived credential.
#[derive(Debug)]
pub struct IssuedCredential {
    pub token: SecretString,
    pub expiry: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    agent_tokens: Arc<dyn AgentTokenStore>,
    user_tokens: Arc<dyn UserTokenStore>,
    registry_sessions: Arc<dyn RegistrySessionStore>,
    /// Lifetime of registry sessions and run tokens.
    short_lived_expiry: Duration,
    user_token_expiry: Duration,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        agent_tokens: Arc<dyn AgentTokenStore>,
        user_tokens: Arc<dyn UserTokenStore>,
        registry_sessions: Arc<dyn RegistrySessionStore>,
        short_lived_expiry: Duration,
        user_token_expiry: Duration,
    ) -> Self {
        Self {
            codec,
            agent_tokens,
            user_tokens,
            registry_sessions,
            short_lived_expiry,
            user_token_expiry,
        }
    }

    pub async fn create_agent_token(
        &self,
        subject: &Subject,
        organization: &str,
        description: &str,
    ) -> Result<CreatedAgentToken, ServiceError> {
        authorize(
            subject,
            Action::CreateAgentToken,
            &Scope::Organization(organization.to_string()),
        )?;

        let token = AgentToken::new(organization, description);
        let secret = format!("{}{}", AGENT_TOKEN_PREFIX, random_token());
        self.agent_tokens
            .create_agent_token(token.clone(), sha256_hex(&secret))
            .await?;

        tracing::info!(
            subject = %subject,
            organization = %organization,
            token_id = %token.id,
            "Created agent token"
        );
        Ok(CreatedAgentToken {
            token,
            secret: SecretString::new(secret),
        })
    }

    pub async fn list_agent_tokens(
        &self,
        subject: &Subject,
        organization: &str,
    ) -> Result<Vec<AgentToken>, ServiceError> {
        authorize(
            subject,
            Action::ListAgentTokens,
            &Scope::Organization(organization.to_string()),
        )?;
        Ok(self.agent_tokens.list_agent_tokens(organization).await?)
    }

    pub async fn delete_agent_token(&self, subject: &Subject, id: &str) -> Result<(), ServiceError> {
        let token = self.agent_tokens.get_agent_token(id).await?;
        authorize(
            subject,
            Action::DeleteAgentToken,
            &Scope::Organization(token.organization.clone()),
        )?;
        self.agent_tokens.delete_agent_token(id).await?;

        tracing::info!(subject = %subject, organization = %token.organization, token_id = %id, "Deleted agent token");
        Ok(())
    }

    pub async fn create_user_token(
        &self,
        subject: &Subject,
        description: &str,
    ) -> Result<CreatedUserToken, ServiceError> {
        let user = require_user(subject)?;
        let token = UserToken::new(&user.username, description);
        self.user_tokens.create_user_token(token.clone()).await?;

        let secret = self.codec.encode(
            &Claims::UserToken {
                token_id: token.id.clone(),
            },
            Utc::now() + self.user_token_expiry,
        )?;

        tracing::info!(user = %user.username, token_id = %token.id, "Created user token");
        Ok(CreatedUserToken {
            token,
            secret: SecretString::new(secret),
        })
    }

    pub async fn list_user_tokens(&self, subject: &Subject) -> Result<Vec<UserToken>, ServiceError> {
        let user = require_user(subject)?;
        Ok(self.user_tokens.list_user_tokens(&user.username).await?)
    }

    /// Deletes one of the subject's own tokens; another user's token is
    /// reported as not found.
    pub async fn delete_user_token(&self, subject: &Subject, id: &str) -> Result<(), ServiceError> {
        let user = require_user(subject)?;
        let token = self.user_tokens.get_user_token(id).await?;
        if token.username != user.username {
            return Err(StoreError::NotFound.into());
        }
        self.user_tokens.delete_user_token(id).await?;

        tracing::info!(user = %user.username, token_id = %id, "Deleted user token");
        Ok(())
    }

    /// Mints a signed `registry_session` token, or with `opaque` a
    /// store-backed `registry.` value that can be purged before expiry.
    pub async fn create_registry_session(
        &self,
        subject: &Subject,
        organization: &str,
        opaque: bool,
    ) -> Result<IssuedCredential, ServiceError> {
        authorize(
            subject,
            Action::CreateRegistrySession,
            &Scope::Organization(organization.to_string()),
        )?;
        let expiry = Utc::now() + self.short_lived_expiry;

        let token = if opaque {
            let value = format!("{}{}", REGISTRY_SESSION_PREFIX, random_token());
            self.registry_sessions
                .create_registry_session(
                    sha256_hex(&value),
                    RegistrySession {
                        organization: organization.to_string(),
                        expiry,
                    },
                )
                .await?;
            value
        } else {
            self.codec.encode(
                &Claims::RegistrySession {
                    organization: organization.to_string(),
                },
                expiry,
            )?
        };

        tracing::debug!(subject = %subject, organization = %organization, opaque, "Created registry session");
        Ok(IssuedCredential {
            token: SecretString::new(token),
            expiry,
        })
    }

    pub async fn create_run_token(
        &self,
        subject: &Subject,
        organization: &str,
        run_id: &str,
    ) -> Result<IssuedCredential, ServiceError> {
        authorize(
            subject,
            Action::CreateRunToken,
            &Scope::Organization(organization.to_string()),
        )?;
        let expiry = Utc::now() + self.short_lived_expiry;
        let token = self.codec.encode(
            &Claims::RunToken {
                run_id: run_id.to_string(),
                organization: organization.to_string(),
            },
            expiry,
        )?;

        tracing::debug!(subject = %subject, organization = %organization, run_id = %run_id, "Created run token");
        Ok(IssuedCredential {
            token: SecretString::new(token),
            expiry,
        })
    }
}

fn require_user(subject: &Subject) -> Result<&User, ServiceError> {
    subject.as_user().ok_or(ServiceError::UserRequired)
}
