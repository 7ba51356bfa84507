use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking an opaque, store-backed registry session value.
pub const REGISTRY_SESSION_PREFIX: &str = "registry.";

/// Default lifetime of a registry session, in minutes.
pub const DEFAULT_REGISTRY_SESSION_EXPIRY_MINUTES: i64 = 10;

/// Short-lived read access to an organization's module registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySession {
    pub organization: String,
    pub expiry: DateTime<Utc>,
}

impl RegistrySession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateRegistrySessionRequest {
    /// Issue a store-backed `registry.` value instead of a signed token.
    #[serde(default)]
    pub opaque: bool,
}
