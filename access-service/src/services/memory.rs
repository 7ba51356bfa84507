//! In-process implementation of every store trait, for tests and
//! single-process deployments.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StoreError;
use super::store::{
    AgentTokenStore, MembershipStore, RegistrySessionStore, SessionStore, TeamStore, UserSpec,
    UserStore, UserTokenStore,
};
use crate::models::{AgentToken, RegistrySession, Session, Team, User, UserToken};

#[derive(Default)]
struct Inner {
    /// Keyed by username.
    users: HashMap<String, User>,
    /// Keyed by team id.
    teams: HashMap<String, Team>,
    agent_tokens: HashMap<String, AgentToken>,
    /// Secret digest to agent token id.
    agent_token_digests: HashMap<String, String>,
    registry_sessions: HashMap<String, RegistrySession>,
    sessions: HashMap<String, Session>,
    user_tokens: HashMap<String, UserToken>,
}

impl Inner {
    fn user_mut(&mut self, username: &str) -> Result<&mut User, StoreError> {
        self.users.get_mut(username).ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Internal(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, spec: &UserSpec) -> Result<User, StoreError> {
        let inner = self.lock()?;
        let user = match spec {
            UserSpec::Username(name) => inner.users.get(name),
            UserSpec::Id(id) => inner.users.values().find(|u| &u.id == id),
            UserSpec::TokenId(id) => inner
                .user_tokens
                .get(id)
                .and_then(|token| inner.users.get(&token.username)),
        };
        user.cloned().ok_or(StoreError::NotFound)
    }

    async fn create_user(&self, user: User) -> Result<User, StoreError> {
        let mut inner = self.lock()?;
        if inner.users.contains_key(&user.username) {
            return Err(StoreError::AlreadyExists);
        }
        inner.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn add_organization_membership(
        &self,
        username: &str,
        organization: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let user = inner.user_mut(username)?;
        if user.organizations.iter().any(|o| o == organization) {
            return Err(StoreError::AlreadyExists);
        }
        user.organizations.push(organization.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn remove_organization_membership(
        &self,
        username: &str,
        organization: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let user = inner.user_mut(username)?;
        let before = user.organizations.len();
        user.organizations.retain(|o| o != organization);
        if user.organizations.len() == before {
            return Err(StoreError::NotFound);
        }
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn add_team_membership(&self, username: &str, team_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let team = inner.teams.get(team_id).cloned().ok_or(StoreError::NotFound)?;
        let user = inner.user_mut(username)?;
        if user.teams.iter().any(|t| t.id == team_id) {
            return Err(StoreError::AlreadyExists);
        }
        user.teams.push(team);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn remove_team_membership(
        &self,
        username: &str,
        team_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let user = inner.user_mut(username)?;
        let before = user.teams.len();
        user.teams.retain(|t| t.id != team_id);
        if user.teams.len() == before {
            return Err(StoreError::NotFound);
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TeamStore for MemoryStore {
    async fn get_team(&self, organization: &str, name: &str) -> Result<Team, StoreError> {
        self.lock()?
            .teams
            .values()
            .find(|t| t.organization == organization && t.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_team(&self, team: Team) -> Result<Team, StoreError> {
        let mut inner = self.lock()?;
        if inner
            .teams
            .values()
            .any(|t| t.organization == team.organization && t.name == team.name)
        {
            return Err(StoreError::AlreadyExists);
        }
        inner.teams.insert(team.id.clone(), team.clone());
        Ok(team)
    }
}

#[async_trait]
impl AgentTokenStore for MemoryStore {
    async fn create_agent_token(
        &self,
        token: AgentToken,
        digest: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.agent_token_digests.contains_key(&digest) {
            return Err(StoreError::AlreadyExists);
        }
        inner.agent_token_digests.insert(digest, token.id.clone());
        inner.agent_tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn get_agent_token_by_digest(&self, digest: &str) -> Result<AgentToken, StoreError> {
        let inner = self.lock()?;
        inner
            .agent_token_digests
            .get(digest)
            .and_then(|id| inner.agent_tokens.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_agent_token(&self, id: &str) -> Result<AgentToken, StoreError> {
        self.lock()?
            .agent_tokens
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_agent_tokens(&self, organization: &str) -> Result<Vec<AgentToken>, StoreError> {
        let mut tokens: Vec<AgentToken> = self
            .lock()?
            .agent_tokens
            .values()
            .filter(|t| t.organization == organization)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        Ok(tokens)
    }

    async fn delete_agent_token(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.agent_tokens.remove(id).ok_or(StoreError::NotFound)?;
        inner.agent_token_digests.retain(|_, token_id| token_id != id);
        Ok(())
    }
}

#[async_trait]
impl RegistrySessionStore for MemoryStore {
    async fn create_registry_session(
        &self,
        digest: String,
        session: RegistrySession,
    ) -> Result<(), StoreError> {
        self.lock()?.registry_sessions.insert(digest, session);
        Ok(())
    }

    async fn get_registry_session(&self, digest: &str) -> Result<RegistrySession, StoreError> {
        self.lock()?
            .registry_sessions
            .get(digest)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete_registry_session(&self, digest: &str) -> Result<(), StoreError> {
        self.lock()?
            .registry_sessions
            .remove(digest)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_expired_registry_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.registry_sessions.len();
        inner.registry_sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - inner.registry_sessions.len())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.sessions.contains_key(&session.token) {
            return Err(StoreError::AlreadyExists);
        }
        inner.sessions.insert(session.token.clone(), session);
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Session, StoreError> {
        self.lock()?
            .sessions
            .get(token)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_sessions(&self, username: &str) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.username == username)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.lock()?
            .sessions
            .remove(token)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - inner.sessions.len())
    }
}

#[async_trait]
impl UserTokenStore for MemoryStore {
    async fn create_user_token(&self, token: UserToken) -> Result<(), StoreError> {
        self.lock()?.user_tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn get_user_token(&self, id: &str) -> Result<UserToken, StoreError> {
        self.lock()?
            .user_tokens
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_user_tokens(&self, username: &str) -> Result<Vec<UserToken>, StoreError> {
        let mut tokens: Vec<UserToken> = self
            .lock()?
            .user_tokens
            .values()
            .filter(|t| t.username == username)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        Ok(tokens)
    }

    async fn delete_user_token(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?
            .user_tokens
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_duplicate_memberships_conflict() {
        let store = MemoryStore::new();
        store.create_user(User::new("alice")).await.unwrap();
        let team = store.create_team(Team::new("acme", "devs")).await.unwrap();

        store.add_organization_membership("alice", "acme").await.unwrap();
        assert!(matches!(
            store.add_organization_membership("alice", "acme").await,
            Err(StoreError::AlreadyExists)
        ));

        store.add_team_membership("alice", &team.id).await.unwrap();
        assert!(matches!(
            store.add_team_membership("alice", &team.id).await,
            Err(StoreError::AlreadyExists)
        ));

        let user = store.get_user(&UserSpec::Username("alice".into())).await.unwrap();
        assert_eq!(user.organizations, vec!["acme".to_string()]);
        assert_eq!(user.teams, vec![team]);
    }

    #[tokio::test]
    async fn test_user_lookup_by_token_id() {
        let store = MemoryStore::new();
        store.create_user(User::new("alice")).await.unwrap();
        let token = UserToken::new("alice", "laptop");
        store.create_user_token(token.clone()).await.unwrap();

        let user = store.get_user(&UserSpec::TokenId(token.id)).await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(matches!(
            store.get_user(&UserSpec::TokenId("ut-missing".into())).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (token, expiry) in [("old", now - Duration::minutes(1)), ("new", now + Duration::hours(1))] {
            store
                .create_session(Session {
                    token: token.into(),
                    username: "alice".into(),
                    address: "127.0.0.1".into(),
                    created_at: now,
                    expiry,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(store.get_session("new").await.is_ok());
        assert!(matches!(store.get_session("old").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_deleting_agent_token_drops_digest() {
        let store = MemoryStore::new();
        let token = AgentToken::new("acme", "ci");
        store
            .create_agent_token(token.clone(), "digest".into())
            .await
            .unwrap();
        assert_eq!(store.get_agent_token_by_digest("digest").await.unwrap(), token);

        store.delete_agent_token(&token.id).await.unwrap();
        assert!(store.get_agent_token_by_digest("digest").await.is_err());
    }
}
