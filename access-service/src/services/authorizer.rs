use std::fmt;

use super::error::AccessDenied;
use crate::models::{Capabilities, Subject, WorkspacePolicy};
use crate::rbac::Action;

/// The resource an action targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Site,
    Organization(String),
    Workspace(WorkspacePolicy),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Site => f.write_str("site"),
            Scope::Organization(name) => write!(f, "organization {}", name),
            Scope::Workspace(policy) => write!(f, "workspace {}", policy.workspace_id),
        }
    }
}

/// Single decision point every service calls before acting for a subject.
pub fn authorize(subject: &Subject, action: Action, scope: &Scope) -> Result<(), AccessDenied> {
    let allowed = match scope {
        Scope::Site => subject.can_access_site(action),
        Scope::Organization(name) => subject.can_access_organization(action, name),
        Scope::Workspace(policy) => subject.can_access_workspace(action, policy),
    };

    if allowed {
        tracing::debug!(subject = %subject, action = %action, scope = %scope, "Access granted");
        return Ok(());
    }

    tracing::warn!(subject = %subject, action = %action, scope = %scope, "Access denied");
    Err(AccessDenied {
        action,
        scope: scope.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SiteAdmin, Team, User, OWNERS_TEAM};

    fn alice() -> Subject {
        let mut user = User::new("alice");
        user.organizations.push("acme".into());
        user.teams.push(Team::new("acme", OWNERS_TEAM));
        Subject::User(user)
    }

    #[test]
    fn test_owner_may_delete_team_only_in_own_org() {
        let subject = alice();
        assert!(authorize(&subject, Action::DeleteTeam, &Scope::Organization("acme".into())).is_ok());

        let err = authorize(&subject, Action::DeleteTeam, &Scope::Organization("other-org".into()))
            .unwrap_err();
        assert_eq!(err.action, Action::DeleteTeam);
        assert_eq!(err.scope, Scope::Organization("other-org".into()));
    }

    #[test]
    fn test_site_scope() {
        assert!(authorize(&alice(), Action::CreateOrganization, &Scope::Site).is_err());
        assert!(
            authorize(&Subject::SiteAdmin(SiteAdmin), Action::CreateOrganization, &Scope::Site)
                .is_ok()
        );
    }

    #[test]
    fn test_workspace_scope_display() {
        let scope = Scope::Workspace(WorkspacePolicy::new("ws-42", "acme"));
        assert_eq!(scope.to_string(), "workspace ws-42");
    }
}
