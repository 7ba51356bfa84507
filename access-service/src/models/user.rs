//! User model and its capability rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Capabilities, Team, WorkspacePolicy};
use crate::rbac::{
    Action, ORGANIZATION_GUEST_ROLE, REGISTRY_MANAGER_ROLE, VCS_MANAGER_ROLE,
    WORKSPACE_MANAGER_ROLE,
};

/// Reserved username whose session resolves to the site administrator.
pub const SITE_ADMIN_USERNAME: &str = "site-admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Names of organizations the user belongs to, in membership order.
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub teams: Vec<Team>,
    /// Administrator-created superuser.
    #[serde(default)]
    pub site_admin: bool,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("user-{}", Uuid::new_v4().simple()),
            username: username.into(),
            created_at: now,
            updated_at: now,
            organizations: Vec::new(),
            teams: Vec::new(),
            site_admin: false,
        }
    }

    /// Teams the user belongs to within `organization`.
    pub fn teams_in<'a>(&'a self, organization: &'a str) -> impl Iterator<Item = &'a Team> + 'a {
        self.teams
            .iter()
            .filter(move |team| team.organization == organization)
    }

    pub fn is_owner(&self, organization: &str) -> bool {
        self.teams_in(organization).any(Team::is_owners)
    }
}

impl Capabilities for User {
    fn can_access_site(&self, _action: Action) -> bool {
        self.site_admin
    }

    fn can_access_organization(&self, action: Action, organization: &str) -> bool {
        if self.site_admin {
            return true;
        }
        self.teams_in(organization).any(|team| {
            if team.is_owners() || ORGANIZATION_GUEST_ROLE.is_allowed(action) {
                return true;
            }
            (team.access.manage_workspaces && WORKSPACE_MANAGER_ROLE.is_allowed(action))
                || (team.access.manage_vcs && VCS_MANAGER_ROLE.is_allowed(action))
                || (team.access.manage_registry && REGISTRY_MANAGER_ROLE.is_allowed(action))
        })
    }

    fn can_access_workspace(&self, action: Action, policy: &WorkspacePolicy) -> bool {
        if self.site_admin {
            return true;
        }
        // Teams are consulted in membership order; the first grant that
        // names one of them decides.
        for team in self.teams_in(&policy.organization) {
            if team.is_owners() || team.access.manage_workspaces {
                return true;
            }
            if let Some(perm) = policy.permissions.iter().find(|p| p.team_id == team.id) {
                return perm.role.is_allowed(action);
            }
        }
        false
    }
}
