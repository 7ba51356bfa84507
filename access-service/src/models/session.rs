use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::utils::sha256_hex;

/// Name of the cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "session";

/// A server-persisted browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// Stable public handle for the session; the token itself is never
    /// rendered back to the browser.
    pub fn id(&self) -> String {
        sha256_hex(&self.token)
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id(),
            address: session.address.clone(),
            created_at: session.created_at,
            expiry: session.expiry,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeSessionRequest {
    pub id: String,
}
