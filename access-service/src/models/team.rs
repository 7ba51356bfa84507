use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the team that is implicitly all-powerful within its organization.
pub const OWNERS_TEAM: &str = "owners";

/// Organization-wide privileges a team may hold in addition to the guest role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationAccess {
    pub manage_workspaces: bool,
    pub manage_vcs: bool,
    pub manage_registry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub organization: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub access: OrganizationAccess,
}

impl Team {
    pub fn new(organization: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: format!("team-{}", Uuid::new_v4().simple()),
            name: name.into(),
            organization: organization.into(),
            created_at: Utc::now(),
            access: OrganizationAccess::default(),
        }
    }

    pub fn with_access(mut self, access: OrganizationAccess) -> Self {
        self.access = access;
        self
    }

    pub fn is_owners(&self) -> bool {
        self.name == OWNERS_TEAM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_team_has_no_access() {
        let team = Team::new("acme", "devs");
        assert!(team.id.starts_with("team-"));
        assert_eq!(team.access, OrganizationAccess::default());
        assert!(!team.is_owners());
        assert!(Team::new("acme", OWNERS_TEAM).is_owners());
    }
}
