use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Action;

/// A named set of permitted actions, optionally extending a parent role.
#[derive(Debug)]
pub struct Role {
    name: &'static str,
    permissions: &'static [Action],
    inherits: Option<&'static Role>,
}

impl Role {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_allowed(&self, action: Action) -> bool {
        self.permissions.contains(&action)
            || self.inherits.is_some_and(|parent| parent.is_allowed(action))
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Role {}

/// Granted to every member of an organization, regardless of team.
pub static ORGANIZATION_GUEST_ROLE: Role = Role {
    name: "guest",
    permissions: &[
        Action::GetOrganization,
        Action::GetEntitlements,
        Action::GetModule,
        Action::ListModules,
        Action::GetTeam,
        Action::ListTeams,
        Action::GetUser,
        Action::ListUsers,
        Action::ListTags,
        Action::GetVcsProvider,
        Action::ListVcsProviders,
        Action::ListVariableSets,
        Action::GetVariableSet,
        Action::WatchAgents,
        Action::ListAgents,
    ],
    inherits: None,
};

pub static WORKSPACE_READ_ROLE: Role = Role {
    name: "read",
    permissions: &[
        Action::GetWorkspace,
        Action::ListRuns,
        Action::GetRun,
        Action::GetPlanFile,
        Action::TailLogs,
        Action::Watch,
        Action::GetConfigurationVersion,
        Action::DownloadConfigurationVersion,
        Action::GetStateVersion,
        Action::GetStateVersionOutput,
        Action::DownloadState,
        Action::ListWorkspaceVariables,
        Action::GetWorkspaceVariable,
        Action::ListWorkspaceTags,
        Action::ListNotificationConfigurations,
        Action::GetNotificationConfiguration,
    ],
    inherits: None,
};

pub static WORKSPACE_PLAN_ROLE: Role = Role {
    name: "plan",
    permissions: &[Action::CreateRun, Action::CreateConfigurationVersion],
    inherits: Some(&WORKSPACE_READ_ROLE),
};

pub static WORKSPACE_WRITE_ROLE: Role = Role {
    name: "write",
    permissions: &[
        Action::ApplyRun,
        Action::CancelRun,
        Action::DiscardRun,
        Action::LockWorkspace,
        Action::UnlockWorkspace,
        Action::CreateWorkspaceVariable,
        Action::UpdateWorkspaceVariable,
        Action::DeleteWorkspaceVariable,
    ],
    inherits: Some(&WORKSPACE_PLAN_ROLE),
};

pub static WORKSPACE_ADMIN_ROLE: Role = Role {
    name: "admin",
    permissions: &[
        Action::UpdateWorkspace,
        Action::DeleteWorkspace,
        Action::ForceUnlockWorkspace,
        Action::SetWorkspacePermission,
        Action::UnsetWorkspacePermission,
        Action::CreateNotificationConfiguration,
        Action::UpdateNotificationConfiguration,
        Action::DeleteNotificationConfiguration,
    ],
    inherits: Some(&WORKSPACE_WRITE_ROLE),
};

/// Organization-wide workspace administration, granted by the
/// manage-workspaces team access flag.
pub static WORKSPACE_MANAGER_ROLE: Role = Role {
    name: "workspace-manager",
    permissions: &[
        Action::CreateWorkspace,
        Action::ListWorkspaces,
        Action::UpdateWorkspace,
        Action::ListTags,
        Action::AddTags,
        Action::RemoveTags,
        Action::DeleteTags,
        Action::TagWorkspaces,
    ],
    inherits: Some(&WORKSPACE_ADMIN_ROLE),
};

pub static VCS_MANAGER_ROLE: Role = Role {
    name: "vcs-manager",
    permissions: &[
        Action::GetVcsProvider,
        Action::ListVcsProviders,
        Action::CreateVcsProvider,
        Action::DeleteVcsProvider,
    ],
    inherits: None,
};

pub static REGISTRY_MANAGER_ROLE: Role = Role {
    name: "registry-manager",
    permissions: &[
        Action::CreateModule,
        Action::CreateModuleVersion,
        Action::UpdateModule,
        Action::DeleteModule,
        Action::DeleteModuleVersion,
    ],
    inherits: None,
};

/// The roles a team may be granted on a single workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Read,
    Plan,
    Write,
    Admin,
}

impl WorkspaceRole {
    pub fn role(&self) -> &'static Role {
        match self {
            WorkspaceRole::Read => &WORKSPACE_READ_ROLE,
            WorkspaceRole::Plan => &WORKSPACE_PLAN_ROLE,
            WorkspaceRole::Write => &WORKSPACE_WRITE_ROLE,
            WorkspaceRole::Admin => &WORKSPACE_ADMIN_ROLE,
        }
    }

    pub fn is_allowed(&self, action: Action) -> bool {
        self.role().is_allowed(action)
    }
}

impl FromStr for WorkspaceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(WorkspaceRole::Read),
            "plan" => Ok(WorkspaceRole::Plan),
            "write" => Ok(WorkspaceRole::Write),
            "admin" => Ok(WorkspaceRole::Admin),
            other => Err(format!("unknown workspace role: {}", other)),
        }
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role().name())
    }
}
