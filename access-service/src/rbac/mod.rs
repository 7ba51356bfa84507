pub mod action;
pub mod role;

pub use action::Action;
pub use role::{
    Role, WorkspaceRole, ORGANIZATION_GUEST_ROLE, REGISTRY_MANAGER_ROLE, VCS_MANAGER_ROLE,
    WORKSPACE_ADMIN_ROLE, WORKSPACE_MANAGER_ROLE, WORKSPACE_PLAN_ROLE, WORKSPACE_READ_ROLE,
    WORKSPACE_WRITE_ROLE,
};
