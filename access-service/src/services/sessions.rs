use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::{SessionError, StoreError, TokenError};
use super::store::{RegistrySessionStore, SessionStore};
use super::token::{Claims, TokenCodec, REDACTED};
use crate::models::{Session, SESSION_COOKIE};
use crate::utils::random_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStrategy {
    /// Opaque token backed by a server-side record.
    Stateful,
    /// Self-contained signed `user_session` token.
    Stateless,
}

impl FromStr for SessionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stateful" => Ok(SessionStrategy::Stateful),
            "stateless" => Ok(SessionStrategy::Stateless),
            other => Err(format!("unknown session strategy: {}", other)),
        }
    }
}

/// A freshly started session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub registry_sessions: usize,
}

#[derive(Clone)]
pub struct SessionManager {
    strategy: SessionStrategy,
    codec: TokenCodec,
    sessions: Arc<dyn SessionStore>,
    registry_sessions: Arc<dyn RegistrySessionStore>,
    lifetime: Duration,
}

impl SessionManager {
    pub fn new(
        strategy: SessionStrategy,
        codec: TokenCodec,
        sessions: Arc<dyn SessionStore>,
        registry_sessions: Arc<dyn RegistrySessionStore>,
        lifetime: Duration,
    ) -> Self {
        Self {
            strategy,
            codec,
            sessions,
            registry_sessions,
            lifetime,
        }
    }

    pub fn strategy(&self) -> SessionStrategy {
        self.strategy
    }

    pub async fn start_session(
        &self,
        username: &str,
        address: &str,
    ) -> Result<IssuedSession, SessionError> {
        let now = Utc::now();
        let expiry = now + self.lifetime;

        let token = match self.strategy {
            SessionStrategy::Stateful => {
                let token = random_token();
                self.sessions
                    .create_session(Session {
                        token: token.clone(),
                        username: username.to_string(),
                        address: address.to_string(),
                        created_at: now,
                        expiry,
                    })
                    .await
                    .map_err(SessionError::Store)?;
                token
            }
            SessionStrategy::Stateless => self.codec.encode(
                &Claims::UserSession {
                    username: username.to_string(),
                },
                expiry,
            )?,
        };

        tracing::info!(user = %username, address = %address, expiry = %expiry, "Started session");
        Ok(IssuedSession { token, expiry })
    }

    /// Resolves a session cookie value to the username it was issued for.
    pub async fn redeem(&self, token: &str) -> Result<String, SessionError> {
        match self.strategy {
            SessionStrategy::Stateful => {
                let session = self.sessions.get_session(token).await?;
                if session.is_expired(Utc::now()) {
                    tracing::debug!(user = %session.username, token = REDACTED, "Session expired");
                    return Err(SessionError::Expired);
                }
                Ok(session.username)
            }
            SessionStrategy::Stateless => {
                let decoded = self.codec.decode(token)?;
                match decoded.claims {
                    Claims::UserSession { username } => Ok(username),
                    other => Err(SessionError::Token(TokenError::UnknownKind(
                        other.kind().to_string(),
                    ))),
                }
            }
        }
    }

    pub async fn list(&self, username: &str) -> Result<Vec<Session>, SessionError> {
        self.require_stateful()?;
        let now = Utc::now();
        let sessions = self.sessions.list_sessions(username).await?;
        Ok(sessions.into_iter().filter(|s| !s.is_expired(now)).collect())
    }

    /// Revokes one of `username`'s sessions by its public id.
    pub async fn revoke(&self, username: &str, session_id: &str) -> Result<(), SessionError> {
        self.require_stateful()?;
        let session = self
            .sessions
            .list_sessions(username)
            .await?
            .into_iter()
            .find(|s| s.id() == session_id)
            .ok_or(SessionError::NotFound)?;
        self.sessions.delete_session(&session.token).await?;
        tracing::info!(user = %username, session_id = %session_id, "Revoked session");
        Ok(())
    }

    /// Ends the session behind a cookie value. Stateless sessions simply lapse.
    pub async fn end_session(&self, token: &str) -> Result<(), SessionError> {
        if self.strategy == SessionStrategy::Stateless {
            return Ok(());
        }
        match self.sessions.delete_session(token).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(SessionError::Store(e)),
        }
    }

    /// One sweep pass: purges sessions and opaque registry sessions expired
    /// at `now`.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, SessionError> {
        let sessions = match self.strategy {
            SessionStrategy::Stateful => self.sessions.delete_expired_sessions(now).await?,
            SessionStrategy::Stateless => 0,
        };
        let registry_sessions = self
            .registry_sessions
            .delete_expired_registry_sessions(now)
            .await?;
        Ok(SweepReport {
            sessions,
            registry_sessions,
        })
    }

    /// Runs `sweep_expired` every `interval` until `cancel` fires.
    pub fn spawn_sweeper(&self, interval: StdDuration, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match manager.sweep_expired(Utc::now()).await {
                            Ok(report) if report.sessions + report.registry_sessions > 0 => {
                                tracing::info!(
                                    sessions = report.sessions,
                                    registry_sessions = report.registry_sessions,
                                    "Purged expired sessions"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "Session sweep failed"),
                        }
                    }
                }
            }
        })
    }

    /// The `session` cookie for an issued session.
    pub fn cookie(&self, issued: &IssuedSession) -> Cookie<'static> {
        let mut builder = Cookie::build((SESSION_COOKIE, issued.token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(issued.expiry.timestamp()) {
            builder = builder.expires(expires);
        }
        builder.build()
    }

    fn require_stateful(&self) -> Result<(), SessionError> {
        match self.strategy {
            SessionStrategy::Stateful => Ok(()),
            SessionStrategy::Stateless => Err(SessionError::Unsupported),
        }
    }
}

/// Cookie that clears `session` in the browser.
pub fn session_removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").removal().build()
}
