use serde::{Deserialize, Serialize};

use crate::rbac::WorkspaceRole;

/// A team's role on one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePermission {
    pub team_id: String,
    pub role: WorkspaceRole,
}

/// Everything needed to decide workspace-level access without a store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePolicy {
    pub workspace_id: String,
    pub organization: String,
    #[serde(default)]
    pub permissions: Vec<WorkspacePermission>,
}

impl WorkspacePolicy {
    pub fn new(workspace_id: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            organization: organization.into(),
            permissions: Vec::new(),
        }
    }

    pub fn grant(mut self, team_id: impl Into<String>, role: WorkspaceRole) -> Self {
        self.permissions.push(WorkspacePermission {
            team_id: team_id.into(),
            role,
        });
        self
    }
}
