use std::sync::Arc;

use access_service::{
    models::{Team, User, OWNERS_TEAM},
    services::{
        ExternalIdentity, ExternalLogin, ExternalTeam, MembershipStore, MemoryStore,
        SessionManager, SessionStrategy, StoreError, SyncError, Synchroniser, TeamStore,
        TokenCodec, UserSpec, UserStore,
    },
};
use async_trait::async_trait;
use secrecy::SecretString;
use service_core::error::AppError;

/// Delegates to the memory store but fails to add one organization.
struct FailingMemberships {
    inner: Arc<MemoryStore>,
    failing_org: String,
}

#[async_trait]
impl MembershipStore for FailingMemberships {
    async fn add_organization_membership(
        &self,
        username: &str,
        organization: &str,
    ) -> Result<(), StoreError> {
        if organization == self.failing_org {
            return Err(StoreError::Internal(anyhow::anyhow!("store offline")));
        }
        self.inner
            .add_organization_membership(username, organization)
            .await
    }

    async fn remove_organization_membership(
        &self,
        username: &str,
        organization: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .remove_organization_membership(username, organization)
            .await
    }

    async fn add_team_membership(&self, username: &str, team_id: &str) -> Result<(), StoreError> {
        self.inner.add_team_membership(username, team_id).await
    }

    async fn remove_team_membership(
        &self,
        username: &str,
        team_id: &str,
    ) -> Result<(), StoreError> {
        self.inner.remove_team_membership(username, team_id).await
    }
}

fn synchroniser(store: &Arc<MemoryStore>) -> Synchroniser {
    Synchroniser::new(store.clone(), store.clone(), store.clone())
}

async fn stored_user(store: &MemoryStore, username: &str) -> User {
    store
        .get_user(&UserSpec::Username(username.to_string()))
        .await
        .unwrap()
}

fn orgs(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_sync_adds_and_removes_organizations() {
    let store = Arc::new(MemoryStore::new());
    let mut user = User::new("alice");
    user.organizations = orgs(&["org1", "org2"]);
    store.create_user(user.clone()).await.unwrap();

    let report = synchroniser(&store)
        .sync_memberships(&mut user, &orgs(&["org2", "org3"]), &[])
        .await
        .unwrap();

    assert_eq!(report.organizations_added, orgs(&["org3"]));
    assert_eq!(report.organizations_removed, orgs(&["org1"]));
    assert_eq!(report.operations(), 2);
    assert_eq!(user.organizations, orgs(&["org2", "org3"]));
    assert_eq!(
        stored_user(&store, "alice").await.organizations,
        orgs(&["org2", "org3"])
    );
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let team = store.create_team(Team::new("acme", "devs")).await.unwrap();
    let mut user = store.create_user(User::new("alice")).await.unwrap();
    let sync = synchroniser(&store);
    let wanted = orgs(&["acme", "acme"]);

    let first = sync
        .sync_memberships(&mut user, &wanted, &[team.clone(), team.clone()])
        .await
        .unwrap();
    assert_eq!(first.operations(), 2);

    let second = sync
        .sync_memberships(&mut user, &wanted, &[team.clone()])
        .await
        .unwrap();
    assert_eq!(second.operations(), 0);
    assert_eq!(user.organizations, orgs(&["acme"]));
    assert_eq!(user.teams, vec![team]);
}

#[tokio::test]
async fn test_sync_tolerates_existing_membership() {
    let store = Arc::new(MemoryStore::new());
    let mut user = store.create_user(User::new("alice")).await.unwrap();
    // Another login already recorded the membership.
    store
        .add_organization_membership("alice", "acme")
        .await
        .unwrap();

    let report = synchroniser(&store)
        .sync_memberships(&mut user, &orgs(&["acme"]), &[])
        .await
        .unwrap();

    assert!(report.organizations_added.is_empty());
    assert_eq!(user.organizations, orgs(&["acme"]));
}

#[tokio::test]
async fn test_sync_aborts_on_first_failure() {
    let store = Arc::new(MemoryStore::new());
    let mut user = store.create_user(User::new("alice")).await.unwrap();
    let memberships = Arc::new(FailingMemberships {
        inner: store.clone(),
        failing_org: "broken".to_string(),
    });
    let sync = Synchroniser::new(store.clone(), store.clone(), memberships);

    let err = sync
        .sync_memberships(&mut user, &orgs(&["first", "broken", "last"]), &[])
        .await
        .unwrap_err();

    match err {
        SyncError::Membership {
            operation, target, ..
        } => {
            assert_eq!(operation, "add organization membership");
            assert_eq!(target, "broken");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(user.organizations.is_empty());
    assert_eq!(
        stored_user(&store, "alice").await.organizations,
        orgs(&["first"])
    );
}

#[tokio::test]
async fn test_synchronise_creates_user_and_personal_organization() {
    let store = Arc::new(MemoryStore::new());
    let identity = ExternalIdentity {
        username: "alice".to_string(),
        teams: vec![ExternalTeam {
            organization: "acme".to_string(),
            name: "devs".to_string(),
        }],
    };
    store
        .create_team(Team::new("acme", OWNERS_TEAM))
        .await
        .unwrap();
    let sync = synchroniser(&store);

    let user = sync.synchronise(&identity).await.unwrap();

    assert_eq!(user.organizations, orgs(&["alice", "acme"]));
    assert!(user.is_owner("alice"));
    assert!(!user.is_owner("acme"));
    assert_eq!(store.get_team("acme", "devs").await.unwrap().name, "devs");

    // The provider dropped the team; the next login removes it.
    let identity = ExternalIdentity {
        username: "alice".to_string(),
        teams: vec![],
    };
    let user = sync.synchronise(&identity).await.unwrap();
    assert_eq!(user.organizations, orgs(&["alice"]));
    assert_eq!(user.teams.len(), 1);
    assert_eq!(user.teams[0].name, OWNERS_TEAM);
}

#[tokio::test]
async fn test_synchronise_skips_teams_in_unknown_organizations() {
    let store = Arc::new(MemoryStore::new());
    let identity = ExternalIdentity {
        username: "alice".to_string(),
        teams: vec![
            ExternalTeam {
                organization: "nowhere".to_string(),
                name: "devs".to_string(),
            },
            ExternalTeam {
                organization: "newco".to_string(),
                name: OWNERS_TEAM.to_string(),
            },
        ],
    };

    let user = synchroniser(&store).synchronise(&identity).await.unwrap();

    assert_eq!(user.organizations, orgs(&["alice", "newco"]));
    assert!(user.is_owner("newco"));
    assert!(matches!(
        store.get_team("nowhere", "devs").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn test_overlapping_syncs_from_stale_snapshot_converge() {
    let store = Arc::new(MemoryStore::new());
    let team = store.create_team(Team::new("acme", "devs")).await.unwrap();
    let sync = synchroniser(&store);

    let mut seeded = store.create_user(User::new("alice")).await.unwrap();
    sync.sync_memberships(&mut seeded, &orgs(&["org1", "acme"]), &[team])
        .await
        .unwrap();

    let mut first = seeded.clone();
    let mut second = seeded;

    let report = sync.sync_memberships(&mut first, &[], &[]).await.unwrap();
    assert_eq!(report.operations(), 3);

    // The second login still believes the memberships exist.
    let report = sync.sync_memberships(&mut second, &[], &[]).await.unwrap();
    assert_eq!(report.operations(), 0);
    assert!(second.organizations.is_empty());
    assert!(second.teams.is_empty());

    let stored = stored_user(&store, "alice").await;
    assert!(stored.organizations.is_empty());
    assert!(stored.teams.is_empty());
}

#[tokio::test]
async fn test_sync_ignores_ordering() {
    let store = Arc::new(MemoryStore::new());
    let a = store.create_team(Team::new("a", "devs")).await.unwrap();
    let b = store.create_team(Team::new("b", "devs")).await.unwrap();
    let mut user = store.create_user(User::new("alice")).await.unwrap();
    let sync = synchroniser(&store);

    sync.sync_memberships(&mut user, &orgs(&["a", "b"]), &[a.clone(), b.clone()])
        .await
        .unwrap();

    let report = sync
        .sync_memberships(&mut user, &orgs(&["b", "a"]), &[b, a])
        .await
        .unwrap();

    assert_eq!(report.operations(), 0);
    assert_eq!(user.organizations, orgs(&["b", "a"]));
}

fn login(store: &Arc<MemoryStore>, memberships: Arc<dyn MembershipStore>) -> ExternalLogin {
    let codec = TokenCodec::new(&SecretString::new(
        "0123456789abcdef0123456789abcdef".to_string(),
    ));
    let sessions = SessionManager::new(
        SessionStrategy::Stateful,
        codec,
        store.clone(),
        store.clone(),
        chrono::Duration::hours(1),
    );
    ExternalLogin::new(
        Synchroniser::new(store.clone(), store.clone(), memberships),
        sessions,
    )
}

#[tokio::test]
async fn test_external_login_starts_session() {
    let store = Arc::new(MemoryStore::new());
    let login = login(&store, store.clone());
    let identity = ExternalIdentity {
        username: "alice".to_string(),
        teams: vec![],
    };

    let (user, session) = login.complete(&identity, "127.0.0.1").await.unwrap();

    assert_eq!(user.username, "alice");
    assert!(!session.token.is_empty());
}

#[tokio::test]
async fn test_external_login_failures_are_generic() {
    let store = Arc::new(MemoryStore::new());
    let failing = Arc::new(FailingMemberships {
        inner: store.clone(),
        failing_org: "alice".to_string(),
    });
    let login = login(&store, failing);

    for username in ["alice", "site-admin", ""] {
        let identity = ExternalIdentity {
            username: username.to_string(),
            teams: vec![],
        };
        let err = login.complete(&identity, "127.0.0.1").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(err.to_string(), "Unauthorized: login failed");
    }
}
