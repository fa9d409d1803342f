use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{AssetUrlIssuer, MemberSummary, SubgroupSummary};

/// Publication kind. Wire values match the values already stored in the
/// `publication_kind` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "publication_kind"))]
pub enum PublicationKind {
    #[serde(rename = "materia")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "materia"))]
    NewsItem,
    #[serde(rename = "dissertacao")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "dissertacao"))]
    Dissertation,
    #[serde(rename = "livro")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "livro"))]
    Book,
    #[serde(rename = "tese")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "tese"))]
    Thesis,
    #[serde(rename = "capitulo_livro")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "capitulo_livro"))]
    BookChapter,
    #[serde(rename = "policy_brief")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "policy_brief"))]
    PolicyBrief,
    #[serde(rename = "Artigo")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Artigo"))]
    Article,
}

impl PublicationKind {
    pub const ALL: [PublicationKind; 7] = [
        PublicationKind::NewsItem,
        PublicationKind::Dissertation,
        PublicationKind::Book,
        PublicationKind::Thesis,
        PublicationKind::BookChapter,
        PublicationKind::PolicyBrief,
        PublicationKind::Article,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationKind::NewsItem => "materia",
            PublicationKind::Dissertation => "dissertacao",
            PublicationKind::Book => "livro",
            PublicationKind::Thesis => "tese",
            PublicationKind::BookChapter => "capitulo_livro",
            PublicationKind::PolicyBrief => "policy_brief",
            PublicationKind::Article => "Artigo",
        }
    }
}

impl fmt::Display for PublicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown publication kind: {}", s))
    }
}

/// Publication row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Publication {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub kind: PublicationKind,
    pub published_on: Option<NaiveDate>,
    pub external_link: Option<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    pub fn asset_paths(&self) -> Vec<String> {
        self.image_path.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PublicationSummary {
    pub id: i64,
    pub title: String,
    pub kind: PublicationKind,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicationResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub kind: PublicationKind,
    pub published_on: Option<NaiveDate>,
    pub external_link: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicationDetailResponse {
    #[serde(flatten)]
    pub publication: PublicationResponse,
    pub authors: Vec<MemberSummary>,
    pub subgroups: Vec<SubgroupSummary>,
}

impl PublicationResponse {
    pub fn build(publication: Publication, urls: &dyn AssetUrlIssuer) -> Self {
        PublicationResponse {
            id: publication.id,
            image_url: urls.issue_opt(publication.image_path.as_deref()),
            title: publication.title,
            description: publication.description,
            kind: publication.kind,
            published_on: publication.published_on,
            external_link: publication.external_link,
            created_at: publication.created_at,
            updated_at: publication.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePublicationRequest {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Title must be between 1 and 500 characters"
    ))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: PublicationKind,
    #[serde(default)]
    pub published_on: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "External link is too long"))]
    pub external_link: Option<String>,
    #[serde(default)]
    pub author_ids: Vec<i64>,
    #[serde(default)]
    pub subgroup_ids: Vec<i64>,
}

/// Partial update. `author_ids`/`subgroup_ids`, when present, replace the
/// whole relation set.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdatePublicationRequest {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 500,
        message = "Title must be between 1 and 500 characters"
    ))]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: Option<PublicationKind>,
    #[serde(default)]
    pub published_on: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "External link is too long"))]
    pub external_link: Option<String>,
    #[serde(default)]
    pub author_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub subgroup_ids: Option<Vec<i64>>,
}

/// Filters accepted by the publication listing
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PublicationFilter {
    /// Case-insensitive search over title and description
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub kind: Option<PublicationKind>,
    /// Publication year
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub author_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AppliedFilters {
    pub query: String,
    pub kind: Option<PublicationKind>,
    pub year: Option<i32>,
}

/// Advanced search result: a page plus the filters that produced it
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicationSearchResponse {
    pub items: Vec<PublicationDetailResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
    pub has_next: bool,
    pub filters: AppliedFilters,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicationStatistics {
    pub total: i64,
    /// Count per kind; kinds without publications report zero
    pub by_kind: BTreeMap<String, i64>,
    pub kinds: Vec<String>,
}

impl PublicationStatistics {
    pub fn from_counts(counts: &[(PublicationKind, i64)]) -> Self {
        let mut by_kind: BTreeMap<String, i64> = PublicationKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), 0))
            .collect();
        for (kind, count) in counts {
            by_kind.insert(kind.as_str().to_string(), *count);
        }
        PublicationStatistics {
            total: counts.iter().map(|(_, count)| count).sum(),
            by_kind,
            kinds: PublicationKind::ALL
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_values_are_stable() {
        assert_eq!(
            serde_json::to_string(&PublicationKind::Article).unwrap(),
            "\"Artigo\""
        );
        assert_eq!(
            serde_json::from_str::<PublicationKind>("\"capitulo_livro\"").unwrap(),
            PublicationKind::BookChapter
        );
        assert_eq!("tese".parse::<PublicationKind>(), Ok(PublicationKind::Thesis));
        assert!("artigo".parse::<PublicationKind>().is_err());
    }

    #[test]
    fn statistics_fill_missing_kinds_with_zero() {
        let stats = PublicationStatistics::from_counts(&[
            (PublicationKind::Book, 2),
            (PublicationKind::Article, 5),
        ]);
        assert_eq!(stats.total, 7);
        assert_eq!(stats.by_kind.len(), 7);
        assert_eq!(stats.by_kind["livro"], 2);
        assert_eq!(stats.by_kind["Artigo"], 5);
        assert_eq!(stats.by_kind["tese"], 0);
        assert_eq!(stats.kinds.len(), 7);
    }

    #[test]
    fn create_request_defaults_relations_to_empty() {
        let request: CreatePublicationRequest =
            serde_json::from_str(r#"{"title":"Water rights","kind":"policy_brief"}"#).unwrap();
        assert!(request.author_ids.is_empty());
        assert!(request.subgroup_ids.is_empty());
        assert!(request.validate().is_ok());
    }
}
