use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Credential handed to a run so it can fetch modules from its
/// organization's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunToken {
    pub run_id: String,
    pub organization: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRunTokenRequest {
    #[validate(length(min = 1, max = 255))]
    pub run_id: String,
}
