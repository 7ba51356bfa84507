use std::fmt;

use super::{AgentToken, RegistrySession, RunToken, User, WorkspacePolicy};
use crate::rbac::Action;

/// The three questions every authenticated principal must answer before a
/// downstream service acts on its behalf.
pub trait Capabilities {
    fn can_access_site(&self, action: Action) -> bool;
    fn can_access_organization(&self, action: Action, organization: &str) -> bool;
    fn can_access_workspace(&self, action: Action, policy: &WorkspacePolicy) -> bool;
}

/// The site administrator, authenticated by the static site token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteAdmin;

impl Capabilities for SiteAdmin {
    fn can_access_site(&self, _action: Action) -> bool {
        true
    }

    fn can_access_organization(&self, _action: Action, _organization: &str) -> bool {
        true
    }

    fn can_access_workspace(&self, _action: Action, _policy: &WorkspacePolicy) -> bool {
        true
    }
}

impl Capabilities for AgentToken {
    fn can_access_site(&self, _action: Action) -> bool {
        false
    }

    fn can_access_organization(&self, _action: Action, organization: &str) -> bool {
        self.organization == organization
    }

    fn can_access_workspace(&self, _action: Action, policy: &WorkspacePolicy) -> bool {
        self.organization == policy.organization
    }
}

impl Capabilities for RegistrySession {
    fn can_access_site(&self, _action: Action) -> bool {
        false
    }

    fn can_access_organization(&self, action: Action, organization: &str) -> bool {
        self.organization == organization && action.is_module_read()
    }

    fn can_access_workspace(&self, _action: Action, _policy: &WorkspacePolicy) -> bool {
        false
    }
}

impl Capabilities for RunToken {
    fn can_access_site(&self, _action: Action) -> bool {
        false
    }

    fn can_access_organization(&self, action: Action, organization: &str) -> bool {
        self.organization == organization && action.is_module_read()
    }

    fn can_access_workspace(&self, _action: Action, _policy: &WorkspacePolicy) -> bool {
        false
    }
}

/// The principal a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    User(User),
    AgentToken(AgentToken),
    RegistrySession(RegistrySession),
    RunToken(RunToken),
    SiteAdmin(SiteAdmin),
}

impl Subject {
    fn capabilities(&self) -> &dyn Capabilities {
        match self {
            Subject::User(user) => user,
            Subject::AgentToken(token) => token,
            Subject::RegistrySession(session) => session,
            Subject::RunToken(token) => token,
            Subject::SiteAdmin(admin) => admin,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Subject::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Subject::User(_) => "user",
            Subject::AgentToken(_) => "agent_token",
            Subject::RegistrySession(_) => "registry_session",
            Subject::RunToken(_) => "run_token",
            Subject::SiteAdmin(_) => "site_admin",
        }
    }
}

impl Capabilities for Subject {
    fn can_access_site(&self, action: Action) -> bool {
        self.capabilities().can_access_site(action)
    }

    fn can_access_organization(&self, action: Action, organization: &str) -> bool {
        self.capabilities()
            .can_access_organization(action, organization)
    }

    fn can_access_workspace(&self, action: Action, policy: &WorkspacePolicy) -> bool {
        self.capabilities().can_access_workspace(action, policy)
    }
}

/// Identity suitable for logs; never includes secret material.
impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User(user) => write!(f, "user:{}", user.username),
            Subject::AgentToken(token) => write!(f, "agent_token:{}", token.id),
            Subject::RegistrySession(session) => {
                write!(f, "registry_session:{}", session.organization)
            }
            Subject::RunToken(token) => write!(f, "run_token:{}", token.run_id),
            Subject::SiteAdmin(_) => f.write_str("site-admin"),
        }
    }
}

impl From<User> for Subject {
    fn from(user: User) -> Self {
        Subject::User(user)
    }
}

impl From<AgentToken> for Subject {
    fn from(token: AgentToken) -> Self {
        Subject::AgentToken(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn registry(org: &str) -> Subject {
        Subject::RegistrySession(RegistrySession {
            organization: org.to_string(),
            expiry: Utc::now() + Duration::minutes(10),
        })
    }

    fn run(org: &str) -> Subject {
        Subject::RunToken(RunToken {
            run_id: "run-1".to_string(),
            organization: org.to_string(),
            expiry: Utc::now() + Duration::minutes(10),
        })
    }

    #[test]
    fn test_only_site_admin_reaches_site() {
        let subjects = [
            Subject::User(User::new("alice")),
            Subject::AgentToken(AgentToken::new("acme", "ci")),
            registry("acme"),
            run("acme"),
        ];
        for action in Action::ALL {
            assert!(Subject::SiteAdmin(SiteAdmin).can_access_site(*action));
            for subject in &subjects {
                assert!(!subject.can_access_site(*action), "{} {}", subject, action);
            }
        }
    }

    #[test]
    fn test_agent_token_is_scoped_to_its_org() {
        let agent = Subject::AgentToken(AgentToken::new("acme", "ci"));
        assert!(agent.can_access_organization(Action::CreateModule, "acme"));
        assert!(!agent.can_access_organization(Action::GetOrganization, "other-org"));
        assert!(agent.can_access_workspace(Action::ApplyRun, &WorkspacePolicy::new("ws", "acme")));
        assert!(!agent.can_access_workspace(
            Action::GetWorkspace,
            &WorkspacePolicy::new("ws", "other-org")
        ));
    }

    #[test]
    fn test_registry_and_run_credentials_only_read_modules() {
        for subject in [registry("acme"), run("acme")] {
            assert!(subject.can_access_organization(Action::GetModule, "acme"));
            assert!(subject.can_access_organization(Action::ListModules, "acme"));
            assert!(!subject.can_access_organization(Action::CreateModule, "acme"));
            assert!(!subject.can_access_organization(Action::GetModule, "other-org"));
            assert!(!subject.can_access_workspace(
                Action::GetWorkspace,
                &WorkspacePolicy::new("ws", "acme")
            ));
        }
    }

    #[test]
    fn test_display_omits_secrets() {
        let agent = AgentToken::new("acme", "ci");
        let rendered = Subject::AgentToken(agent.clone()).to_string();
        assert_eq!(rendered, format!("agent_token:{}", agent.id));
        assert_eq!(Subject::SiteAdmin(SiteAdmin).to_string(), "site-admin");
    }
}
