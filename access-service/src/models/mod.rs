pub mod agent_token;
pub mod registry_session;
pub mod run_token;
pub mod session;
pub mod subject;
pub mod team;
pub mod user;
pub mod user_token;
pub mod workspace_policy;

pub use agent_token::{AgentToken, CreateAgentTokenRequest, CreatedAgentToken, AGENT_TOKEN_PREFIX};
pub use registry_session::{
    CreateRegistrySessionRequest, RegistrySession, DEFAULT_REGISTRY_SESSION_EXPIRY_MINUTES,
    REGISTRY_SESSION_PREFIX,
};
pub use run_token::{CreateRunTokenRequest, RunToken};
pub use session::{RevokeSessionRequest, Session, SessionResponse, SESSION_COOKIE};
pub use subject::{Capabilities, SiteAdmin, Subject};
pub use team::{OrganizationAccess, Team, OWNERS_TEAM};
pub use user::{User, SITE_ADMIN_USERNAME};
pub use user_token::{CreateUserTokenRequest, CreatedUserToken, UserToken};
pub use workspace_policy::{WorkspacePermission, WorkspacePolicy};
