use serde::{Deserialize, Serialize};

macro_rules! actions {
    ($($variant:ident => $name:literal,)+) => {
        /// An operation a subject may attempt on a resource.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Action {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl Action {
            pub const ALL: &'static [Action] = &[$(Action::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Action::$variant => $name,)+
                }
            }
        }
    };
}

actions! {
    // site
    CreateOrganization => "create_organization",
    ListOrganizations => "list_organizations",
    CreateUser => "create_user",
    DeleteUser => "delete_user",

    // organization
    GetOrganization => "get_organization",
    UpdateOrganization => "update_organization",
    DeleteOrganization => "delete_organization",
    GetEntitlements => "get_entitlements",
    CreateTeam => "create_team",
    UpdateTeam => "update_team",
    GetTeam => "get_team",
    ListTeams => "list_teams",
    DeleteTeam => "delete_team",
    AddTeamMembership => "add_team_membership",
    RemoveTeamMembership => "remove_team_membership",
    GetUser => "get_user",
    ListUsers => "list_users",
    CreateAgentToken => "create_agent_token",
    ListAgentTokens => "list_agent_tokens",
    DeleteAgentToken => "delete_agent_token",
    WatchAgents => "watch_agents",
    ListAgents => "list_agents",
    CreateRegistrySession => "create_registry_session",
    CreateRunToken => "create_run_token",
    GetModule => "get_module",
    ListModules => "list_modules",
    CreateModule => "create_module",
    CreateModuleVersion => "create_module_version",
    UpdateModule => "update_module",
    DeleteModule => "delete_module",
    DeleteModuleVersion => "delete_module_version",
    GetVcsProvider => "get_vcs_provider",
    ListVcsProviders => "list_vcs_providers",
    CreateVcsProvider => "create_vcs_provider",
    DeleteVcsProvider => "delete_vcs_provider",
    ListTags => "list_tags",
    AddTags => "add_tags",
    RemoveTags => "remove_tags",
    DeleteTags => "delete_tags",
    TagWorkspaces => "tag_workspaces",
    ListVariableSets => "list_variable_sets",
    GetVariableSet => "get_variable_set",
    CreateWorkspace => "create_workspace",
    ListWorkspaces => "list_workspaces",

    // workspace
    GetWorkspace => "get_workspace",
    UpdateWorkspace => "update_workspace",
    DeleteWorkspace => "delete_workspace",
    LockWorkspace => "lock_workspace",
    UnlockWorkspace => "unlock_workspace",
    ForceUnlockWorkspace => "force_unlock_workspace",
    SetWorkspacePermission => "set_workspace_permission",
    UnsetWorkspacePermission => "unset_workspace_permission",
    ListRuns => "list_runs",
    GetRun => "get_run",
    CreateRun => "create_run",
    ApplyRun => "apply_run",
    CancelRun => "cancel_run",
    DiscardRun => "discard_run",
    GetPlanFile => "get_plan_file",
    CreateConfigurationVersion => "create_configuration_version",
    GetConfigurationVersion => "get_configuration_version",
    DownloadConfigurationVersion => "download_configuration_version",
    GetStateVersion => "get_state_version",
    GetStateVersionOutput => "get_state_version_output",
    DownloadState => "download_state",
    ListWorkspaceVariables => "list_workspace_variables",
    GetWorkspaceVariable => "get_workspace_variable",
    CreateWorkspaceVariable => "create_workspace_variable",
    UpdateWorkspaceVariable => "update_workspace_variable",
    DeleteWorkspaceVariable => "delete_workspace_variable",
    ListWorkspaceTags => "list_workspace_tags",
    Watch => "watch",
    TailLogs => "tail_logs",
    ListNotificationConfigurations => "list_notification_configurations",
    GetNotificationConfiguration => "get_notification_configuration",
    CreateNotificationConfiguration => "create_notification_configuration",
    UpdateNotificationConfiguration => "update_notification_configuration",
    DeleteNotificationConfiguration => "delete_notification_configuration",
}

impl Action {
    /// Read-only access to the module registry; the only organization-level
    /// actions a registry session or run token may perform.
    pub fn is_module_read(&self) -> bool {
        matches!(self, Action::GetModule | Action::ListModules)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
