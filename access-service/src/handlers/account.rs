use axum::{response::IntoResponse, Json};
use serde::Serialize;
use service_core::error::AppError;

use crate::{
    middleware::CurrentSubject,
    models::{Subject, SITE_ADMIN_USERNAME},
    services::ServiceError,
};

#[derive(Debug, Serialize)]
pub struct TeamSummary {
    pub id: String,
    pub name: String,
    pub organization: String,
}

#[derive(Debug, Serialize)]
pub struct AccountDetails {
    pub id: String,
    pub username: String,
    pub site_admin: bool,
    pub organizations: Vec<String>,
    pub teams: Vec<TeamSummary>,
}

impl AccountDetails {
    fn from_subject(subject: &Subject) -> Option<Self> {
        match subject {
            Subject::User(user) => Some(Self {
                id: user.id.clone(),
                username: user.username.clone(),
                site_admin: user.site_admin,
                organizations: user.organizations.clone(),
                teams: user
                    .teams
                    .iter()
                    .map(|team| TeamSummary {
                        id: team.id.clone(),
                        name: team.name.clone(),
                        organization: team.organization.clone(),
                    })
                    .collect(),
            }),
            Subject::SiteAdmin(_) => Some(Self {
                id: SITE_ADMIN_USERNAME.to_string(),
                username: SITE_ADMIN_USERNAME.to_string(),
                site_admin: true,
                organizations: Vec::new(),
                teams: Vec::new(),
            }),
            _ => None,
        }
    }
}

/// Details of the calling user account.
pub async fn account_details(
    CurrentSubject(subject): CurrentSubject,
) -> Result<impl IntoResponse, AppError> {
    let details = AccountDetails::from_subject(&subject).ok_or(ServiceError::UserRequired)?;
    Ok(Json(details))
}
