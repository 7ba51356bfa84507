use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A user-owned API token. The signed value carries `id` as its subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub id: String,
    pub username: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl UserToken {
    pub fn new(username: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: format!("ut-{}", Uuid::new_v4().simple()),
            username: username.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Returned exactly once, when the token is created.
#[derive(Debug)]
pub struct CreatedUserToken {
    pub token: UserToken,
    pub secret: SecretString,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserTokenRequest {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
}
