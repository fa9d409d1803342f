use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{AssetUrlIssuer, MemberSummary, PublicationSummary};

/// Research subgroup row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Subgroup {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub background_path: Option<String>,
    /// Ordered infographic asset paths
    pub infographics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subgroup {
    /// Every stored asset path referenced by this subgroup
    pub fn asset_paths(&self) -> Vec<String> {
        self.icon_path
            .iter()
            .chain(self.background_path.iter())
            .chain(self.infographics.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SubgroupSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubgroupResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub background_url: Option<String>,
    pub infographic_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subgroup with its members and publications
#[derive(Debug, Serialize, ToSchema)]
pub struct SubgroupDetailResponse {
    #[serde(flatten)]
    pub subgroup: SubgroupResponse,
    pub members: Vec<MemberSummary>,
    pub publications: Vec<PublicationSummary>,
}

impl SubgroupResponse {
    pub fn build(subgroup: Subgroup, urls: &dyn AssetUrlIssuer) -> Self {
        SubgroupResponse {
            id: subgroup.id,
            icon_url: urls.issue_opt(subgroup.icon_path.as_deref()),
            background_url: urls.issue_opt(subgroup.background_path.as_deref()),
            infographic_urls: subgroup
                .infographics
                .iter()
                .map(|path| urls.issue(path))
                .collect(),
            name: subgroup.name,
            description: subgroup.description,
            created_at: subgroup.created_at,
            updated_at: subgroup.updated_at,
        }
    }
}

/// Request DTO for creating a subgroup
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSubgroupRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Subgroup name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request DTO for updating a subgroup; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateSubgroupRequest {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Subgroup name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Result of removing one infographic
#[derive(Debug, Serialize, ToSchema)]
pub struct InfographicRemovedResponse {
    pub removed_index: usize,
    pub remaining: usize,
    pub infographic_urls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::PlainUrls;

    fn subgroup() -> Subgroup {
        Subgroup {
            id: 7,
            name: "Energy Policy".to_string(),
            description: None,
            icon_path: Some("subgrupos/icons/a.png".to_string()),
            background_path: None,
            infographics: vec![
                "subgrupos/infographics/1.png".to_string(),
                "subgrupos/infographics/2.png".to_string(),
            ],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn response_replaces_paths_with_urls() {
        let response = SubgroupResponse::build(subgroup(), &PlainUrls);
        assert_eq!(
            response.icon_url.as_deref(),
            Some("/files/subgrupos/icons/a.png")
        );
        assert!(response.background_url.is_none());
        assert_eq!(
            response.infographic_urls,
            vec![
                "/files/subgrupos/infographics/1.png",
                "/files/subgrupos/infographics/2.png"
            ]
        );

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("icon_path").is_none());
    }

    #[test]
    fn asset_paths_lists_every_slot() {
        let paths = subgroup().asset_paths();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], "subgrupos/icons/a.png");
    }

    #[test]
    fn create_request_rejects_empty_name() {
        let request = CreateSubgroupRequest {
            name: String::new(),
            description: None,
        };
        assert!(request.validate().is_err());
    }
}
