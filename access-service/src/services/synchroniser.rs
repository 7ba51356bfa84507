//! Reconciles a user's organization and team memberships with the state
//! reported by an external identity provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{StoreError, SyncError};
use super::store::{MembershipStore, TeamStore, UserSpec, UserStore};
use crate::models::{Team, User, OWNERS_TEAM};

/// A team membership as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTeam {
    pub organization: String,
    pub name: String,
}

/// The identity an external provider vouched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub username: String,
    #[serde(default)]
    pub teams: Vec<ExternalTeam>,
}

/// Membership changes performed by one sync.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub organizations_added: Vec<String>,
    pub organizations_removed: Vec<String>,
    /// Team ids.
    pub teams_added: Vec<String>,
    pub teams_removed: Vec<String>,
}

impl SyncReport {
    pub fn operations(&self) -> usize {
        self.organizations_added.len()
            + self.organizations_removed.len()
            + self.teams_added.len()
            + self.teams_removed.len()
    }
}

#[derive(Clone)]
pub struct Synchroniser {
    users: Arc<dyn UserStore>,
    teams: Arc<dyn TeamStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl Synchroniser {
    pub fn new(
        users: Arc<dyn UserStore>,
        teams: Arc<dyn TeamStore>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            users,
            teams,
            memberships,
        }
    }

    /// Brings `user`'s memberships in line with the wanted sets. On success
    /// the user's organizations and teams equal the wanted sets, deduplicated
    /// in order of first appearance.
    pub async fn sync_memberships(
        &self,
        user: &mut User,
        wanted_orgs: &[String],
        wanted_teams: &[Team],
    ) -> Result<SyncReport, SyncError> {
        let mut orgs: Vec<String> = Vec::with_capacity(wanted_orgs.len());
        for org in wanted_orgs {
            if !orgs.contains(org) {
                orgs.push(org.clone());
            }
        }
        let mut teams: Vec<Team> = Vec::with_capacity(wanted_teams.len());
        for team in wanted_teams {
            if !teams.iter().any(|t| t.id == team.id) {
                teams.push(team.clone());
            }
        }

        let current_orgs = user.organizations.clone();
        let current_teams = user.teams.clone();
        let username = user.username.as_str();
        let mut report = SyncReport::default();

        for org in orgs.iter().filter(|o| !current_orgs.contains(o)) {
            let added = tolerate_conflict(
                self.memberships
                    .add_organization_membership(username, org)
                    .await,
            )
            .map_err(|source| SyncError::Membership {
                operation: "add organization membership",
                target: org.clone(),
                source,
            })?;
            if added {
                report.organizations_added.push(org.clone());
            }
        }

        for org in current_orgs.iter().filter(|o| !orgs.contains(o)) {
            let removed = tolerate_missing(
                self.memberships
                    .remove_organization_membership(username, org)
                    .await,
            )
            .map_err(|source| SyncError::Membership {
                operation: "remove organization membership",
                target: org.clone(),
                source,
            })?;
            if removed {
                report.organizations_removed.push(org.clone());
            }
        }

        for team in teams
            .iter()
            .filter(|t| !current_teams.iter().any(|c| c.id == t.id))
        {
            let added = tolerate_conflict(
                self.memberships
                    .add_team_membership(username, &team.id)
                    .await,
            )
            .map_err(|source| SyncError::Membership {
                operation: "add team membership",
                target: format!("{}/{}", team.organization, team.name),
                source,
            })?;
            if added {
                report.teams_added.push(team.id.clone());
            }
        }

        for team in current_teams
            .iter()
            .filter(|c| !teams.iter().any(|t| t.id == c.id))
        {
            let removed = tolerate_missing(
                self.memberships
                    .remove_team_membership(username, &team.id)
                    .await,
            )
            .map_err(|source| SyncError::Membership {
                operation: "remove team membership",
                target: format!("{}/{}", team.organization, team.name),
                source,
            })?;
            if removed {
                report.teams_removed.push(team.id.clone());
            }
        }

        user.organizations = orgs;
        user.teams = teams;

        if report.operations() > 0 {
            tracing::info!(
                user = %user.username,
                organizations_added = ?report.organizations_added,
                organizations_removed = ?report.organizations_removed,
                teams_added = report.teams_added.len(),
                teams_removed = report.teams_removed.len(),
                "Synchronised memberships"
            );
        }

        Ok(report)
    }

    /// Full login-time sync: ensures the user exists, resolves the provider's
    /// teams, and grants the user ownership of their personal organization.
    pub async fn synchronise(&self, identity: &ExternalIdentity) -> Result<User, SyncError> {
        let mut user = self.ensure_user(&identity.username).await?;

        let mut wanted_teams = Vec::with_capacity(identity.teams.len() + 1);
        wanted_teams.push(self.get_or_create_team(&identity.username, OWNERS_TEAM).await?);
        for external in &identity.teams {
            if external.name != OWNERS_TEAM
                && !self.organization_exists(&external.organization).await?
            {
                tracing::warn!(
                    user = %identity.username,
                    organization = %external.organization,
                    team = %external.name,
                    "Skipping team in unknown organization"
                );
                continue;
            }
            wanted_teams.push(
                self.get_or_create_team(&external.organization, &external.name)
                    .await?,
            );
        }

        let wanted_orgs: Vec<String> = wanted_teams
            .iter()
            .map(|team| team.organization.clone())
            .collect();

        self.sync_memberships(&mut user, &wanted_orgs, &wanted_teams)
            .await?;
        Ok(user)
    }

    async fn ensure_user(&self, username: &str) -> Result<User, SyncError> {
        let spec = UserSpec::Username(username.to_string());
        match self.users.get_user(&spec).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => match self.users.create_user(User::new(username)).await {
                Ok(user) => {
                    tracing::info!(user = %username, "Created user");
                    Ok(user)
                }
                Err(StoreError::AlreadyExists) => Ok(self.users.get_user(&spec).await?),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// An organization exists once its owners team does.
    async fn organization_exists(&self, organization: &str) -> Result<bool, SyncError> {
        match self.teams.get_team(organization, OWNERS_TEAM).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_or_create_team(&self, organization: &str, name: &str) -> Result<Team, SyncError> {
        match self.teams.get_team(organization, name).await {
            Ok(team) => Ok(team),
            Err(StoreError::NotFound) => {
                match self.teams.create_team(Team::new(organization, name)).await {
                    Ok(team) => {
                        tracing::info!(organization = %organization, team = %name, "Created team");
                        Ok(team)
                    }
                    Err(StoreError::AlreadyExists) => {
                        Ok(self.teams.get_team(organization, name).await?)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// `Ok(true)` if the membership was added, `Ok(false)` if it already existed.
fn tolerate_conflict(result: Result<(), StoreError>) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(StoreError::AlreadyExists) => Ok(false),
        Err(e) => Err(e),
    }
}

/// `Ok(true)` if the membership was removed, `Ok(false)` if it was already gone.
fn tolerate_missing(result: Result<(), StoreError>) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(StoreError::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}
