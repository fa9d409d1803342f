use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{AssetUrlIssuer, PublicationSummary, SubgroupSummary};

/// Member (researcher) row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub experience: Option<String>,
    pub photo_path: Option<String>,
    pub background_path: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub lattes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn asset_paths(&self) -> Vec<String> {
        self.photo_path
            .iter()
            .chain(self.background_path.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MemberSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub experience: Option<String>,
    pub photo_url: Option<String>,
    pub background_url: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub lattes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member with the subgroups they belong to and the publications they authored
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberDetailResponse {
    #[serde(flatten)]
    pub member: MemberResponse,
    pub subgroups: Vec<SubgroupSummary>,
    pub publications: Vec<PublicationSummary>,
}

impl MemberResponse {
    pub fn build(member: Member, urls: &dyn AssetUrlIssuer) -> Self {
        MemberResponse {
            id: member.id,
            photo_url: urls.issue_opt(member.photo_path.as_deref()),
            background_url: urls.issue_opt(member.background_path.as_deref()),
            name: member.name,
            description: member.description,
            experience: member.experience,
            email: member.email,
            linkedin: member.linkedin,
            lattes: member.lattes,
            created_at: member.created_at,
            updated_at: member.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateMemberRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Member name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"), length(max = 255))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "LinkedIn URL is too long"))]
    pub linkedin: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Lattes URL is too long"))]
    pub lattes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateMemberRequest {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Member name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"), length(max = 255))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "LinkedIn URL is too long"))]
    pub linkedin: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Lattes URL is too long"))]
    pub lattes: Option<String>,
}
