//! Persistence collaborators consumed by the authentication core.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StoreError;
use crate::models::{AgentToken, RegistrySession, Session, Team, User, UserToken};

/// How to look a user up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSpec {
    Id(String),
    Username(String),
    /// Identifier of one of the user's API tokens.
    TokenId(String),
}

impl fmt::Display for UserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserSpec::Id(id) => write!(f, "id={}", id),
            UserSpec::Username(name) => write!(f, "username={}", name),
            UserSpec::TokenId(id) => write!(f, "token_id={}", id),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, spec: &UserSpec) -> Result<User, StoreError>;
    async fn create_user(&self, user: User) -> Result<User, StoreError>;
}

/// Mutates organization and team memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn add_organization_membership(
        &self,
        username: &str,
        organization: &str,
    ) -> Result<(), StoreError>;
    async fn remove_organization_membership(
        &self,
        username: &str,
        organization: &str,
    ) -> Result<(), StoreError>;
    async fn add_team_membership(&self, username: &str, team_id: &str) -> Result<(), StoreError>;
    async fn remove_team_membership(&self, username: &str, team_id: &str)
        -> Result<(), StoreError>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn get_team(&self, organization: &str, name: &str) -> Result<Team, StoreError>;
    async fn create_team(&self, team: Team) -> Result<Team, StoreError>;
}

/// Agent tokens are keyed by a digest of their secret value.
#[async_trait]
pub trait AgentTokenStore: Send + Sync {
    async fn create_agent_token(&self, token: AgentToken, digest: String)
        -> Result<(), StoreError>;
    async fn get_agent_token_by_digest(&self, digest: &str) -> Result<AgentToken, StoreError>;
    async fn get_agent_token(&self, id: &str) -> Result<AgentToken, StoreError>;
    async fn list_agent_tokens(&self, organization: &str) -> Result<Vec<AgentToken>, StoreError>;
    async fn delete_agent_token(&self, id: &str) -> Result<(), StoreError>;
}

/// Opaque `registry.` sessions, keyed by a digest of their value.
#[async_trait]
pub trait RegistrySessionStore: Send + Sync {
    async fn create_registry_session(
        &self,
        digest: String,
        session: RegistrySession,
    ) -> Result<(), StoreError>;
    async fn get_registry_session(&self, digest: &str) -> Result<RegistrySession, StoreError>;
    async fn delete_registry_session(&self, digest: &str) -> Result<(), StoreError>;
    /// Removes every session expired at `now`, returning how many were removed.
    async fn delete_expired_registry_sessions(&self, now: DateTime<Utc>)
        -> Result<usize, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<(), StoreError>;
    async fn get_session(&self, token: &str) -> Result<Session, StoreError>;
    async fn list_sessions(&self, username: &str) -> Result<Vec<Session>, StoreError>;
    async fn delete_session(&self, token: &str) -> Result<(), StoreError>;
    /// Removes every session expired at `now`, returning how many were removed.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait UserTokenStore: Send + Sync {
    async fn create_user_token(&self, token: UserToken) -> Result<(), StoreError>;
    async fn get_user_token(&self, id: &str) -> Result<UserToken, StoreError>;
    async fn list_user_tokens(&self, username: &str) -> Result<Vec<UserToken>, StoreError>;
    async fn delete_user_token(&self, id: &str) -> Result<(), StoreError>;
}
