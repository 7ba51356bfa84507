use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Prefix marking an opaque agent token value.
pub const AGENT_TOKEN_PREFIX: &str = "agent.";

/// A long-lived credential scoped to one organization. The secret value is
/// never part of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentToken {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub organization: String,
}

impl AgentToken {
    pub fn new(organization: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: format!("at-{}", Uuid::new_v4().simple()),
            created_at: Utc::now(),
            description: description.into(),
            organization: organization.into(),
        }
    }
}

/// Returned exactly once, when the token is created.
#[derive(Debug)]
pub struct CreatedAgentToken {
    pub token: AgentToken,
    pub secret: SecretString,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAgentTokenRequest {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
}
