//! Publication CRUD, search, statistics and image upload

use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::{found, missing_ids, not_found};
use crate::state::AppState;
use crate::utils::upload::extract_image_upload;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use gem_core::models::{
    AppliedFilters, CreatePublicationRequest, Paginated, PaginationQuery, Publication,
    PublicationDetailResponse, PublicationFilter, PublicationKind, PublicationResponse,
    PublicationSearchResponse, PublicationStatistics, UpdatePublicationRequest,
};
use gem_core::AppError;
use gem_storage::AssetFolder;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

const PUBLICATION: &str = "Publication";
const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdvancedSearchQuery {
    /// Search text, at least two characters
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub kind: Option<PublicationKind>,
    #[serde(default)]
    pub year: Option<i32>,
}

async fn with_relations(
    state: &AppState,
    publications: Vec<Publication>,
) -> Result<Vec<PublicationDetailResponse>, HttpAppError> {
    let ids: Vec<i64> = publications.iter().map(|p| p.id).collect();
    let mut authors = state.db.publications.authors_of_many(&ids).await?;
    let mut subgroups = state.db.publications.subgroups_of_many(&ids).await?;

    Ok(publications
        .into_iter()
        .map(|publication| {
            let id = publication.id;
            PublicationDetailResponse {
                publication: PublicationResponse::build(publication, state.urls()),
                authors: authors.remove(&id).unwrap_or_default(),
                subgroups: subgroups.remove(&id).unwrap_or_default(),
            }
        })
        .collect())
}

async fn detail(
    state: &AppState,
    publication: Publication,
) -> Result<PublicationDetailResponse, HttpAppError> {
    with_relations(state, vec![publication])
        .await?
        .pop()
        .ok_or_else(|| not_found(PUBLICATION))
}

/// Reject author or subgroup ids that do not exist, naming them.
async fn ensure_related_exist(
    state: &AppState,
    author_ids: Option<&[i64]>,
    subgroup_ids: Option<&[i64]>,
) -> Result<(), HttpAppError> {
    if let Some(ids) = author_ids.filter(|ids| !ids.is_empty()) {
        let existing = state.db.members.existing_ids(ids).await?;
        let missing = missing_ids(ids, &existing);
        if !missing.is_empty() {
            return Err(HttpAppError(AppError::BadRequest(format!(
                "Authors not found: {:?}",
                missing
            ))));
        }
    }
    if let Some(ids) = subgroup_ids.filter(|ids| !ids.is_empty()) {
        let existing = state.db.subgroups.existing_ids(ids).await?;
        let missing = missing_ids(ids, &existing);
        if !missing.is_empty() {
            return Err(HttpAppError(AppError::BadRequest(format!(
                "Subgroups not found: {:?}",
                missing
            ))));
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/publications",
    params(PaginationQuery, PublicationFilter),
    responses((status = 200, description = "Publications with authors and subgroups", body = Paginated<PublicationDetailResponse>)),
    tag = "publications"
)]
#[tracing::instrument(skip(state), fields(operation = "list_publications"))]
pub async fn list_publications(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<PublicationFilter>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = state.page(&pagination);
    let (publications, total) = state.db.publications.list(&filter, page).await?;
    let items = with_relations(&state, publications).await?;

    Ok(Json(Paginated::new(items, total, page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/publications",
    request_body = CreatePublicationRequest,
    responses(
        (status = 201, description = "Publication created", body = PublicationDetailResponse),
        (status = 400, description = "Invalid input or unknown author/subgroup ids", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "publications"
)]
#[tracing::instrument(skip(state, _user, request), fields(operation = "create_publication"))]
pub async fn create_publication(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreatePublicationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ensure_related_exist(
        &state,
        Some(request.author_ids.as_slice()),
        Some(request.subgroup_ids.as_slice()),
    )
    .await?;

    let publication = state.db.publications.create(&request).await?;

    tracing::info!(publication_id = publication.id, kind = %publication.kind.as_str(), "Publication created");

    Ok((StatusCode::CREATED, Json(detail(&state, publication).await?)))
}

#[utoipa::path(
    get,
    path = "/api/v1/publications/{id}",
    params(("id" = i64, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Publication with relations", body = PublicationDetailResponse),
        (status = 404, description = "Publication not found", body = ErrorResponse)
    ),
    tag = "publications"
)]
#[tracing::instrument(skip(state), fields(operation = "get_publication"))]
pub async fn get_publication(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let publication = found(state.db.publications.get(id).await, PUBLICATION)?;
    Ok(Json(detail(&state, publication).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/publications/{id}",
    params(("id" = i64, Path, description = "Publication ID")),
    request_body = UpdatePublicationRequest,
    responses(
        (status = 200, description = "Publication updated", body = PublicationDetailResponse),
        (status = 400, description = "Invalid input or unknown author/subgroup ids", body = ErrorResponse),
        (status = 404, description = "Publication not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "publications"
)]
#[tracing::instrument(skip(state, _user, request), fields(operation = "update_publication"))]
pub async fn update_publication(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdatePublicationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.publications.exists(id).await? {
        return Err(not_found(PUBLICATION));
    }
    ensure_related_exist(
        &state,
        request.author_ids.as_deref(),
        request.subgroup_ids.as_deref(),
    )
    .await?;

    let publication = found(state.db.publications.update(id, &request).await, PUBLICATION)?;
    Ok(Json(detail(&state, publication).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/publications/{id}",
    params(("id" = i64, Path, description = "Publication ID")),
    responses(
        (status = 204, description = "Publication deleted"),
        (status = 404, description = "Publication not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "publications"
)]
#[tracing::instrument(skip(state, _user), fields(operation = "delete_publication"))]
pub async fn delete_publication(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let publication = found(state.db.publications.delete(id).await, PUBLICATION)?;
    state.assets.slots.discard_all(publication.asset_paths()).await;

    tracing::info!(publication_id = id, "Publication deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/publications/kinds",
    responses((status = 200, description = "Publication kind wire values", body = Vec<String>)),
    tag = "publications"
)]
pub async fn list_kinds() -> Json<Vec<&'static str>> {
    Json(PublicationKind::ALL.iter().map(|kind| kind.as_str()).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/publications/search/advanced",
    params(PaginationQuery, AdvancedSearchQuery),
    responses(
        (status = 200, description = "Matching publications and the applied filters", body = PublicationSearchResponse),
        (status = 400, description = "Search text shorter than two characters", body = ErrorResponse)
    ),
    tag = "publications"
)]
#[tracing::instrument(skip(state), fields(operation = "search_publications"))]
pub async fn search_advanced(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationQuery>,
    Query(search): Query<AdvancedSearchQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let query = search.q.as_deref().map(str::trim).unwrap_or_default();
    if query.chars().count() < MIN_SEARCH_LEN {
        return Err(HttpAppError(AppError::BadRequest(format!(
            "Search query must be at least {} characters",
            MIN_SEARCH_LEN
        ))));
    }

    let page = state.page(&pagination);
    let filter = PublicationFilter {
        q: Some(query.to_string()),
        kind: search.kind,
        year: search.year,
        author_id: None,
    };
    let (publications, total) = state.db.publications.list(&filter, page).await?;
    let items = with_relations(&state, publications).await?;
    let paginated = Paginated::new(items, total, page);

    Ok(Json(PublicationSearchResponse {
        items: paginated.items,
        total: paginated.total,
        skip: paginated.skip,
        limit: paginated.limit,
        has_next: paginated.has_next,
        filters: AppliedFilters {
            query: query.to_string(),
            kind: search.kind,
            year: search.year,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/publications/statistics",
    responses((status = 200, description = "Publication counts per kind", body = PublicationStatistics)),
    tag = "publications"
)]
#[tracing::instrument(skip(state), fields(operation = "publication_statistics"))]
pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let counts = state.db.publications.count_by_kind().await?;
    Ok(Json(PublicationStatistics::from_counts(&counts)))
}

#[utoipa::path(
    post,
    path = "/api/v1/publications/{id}/image",
    params(("id" = i64, Path, description = "Publication ID")),
    request_body(content_type = "multipart/form-data", description = "Image in field `file`"),
    responses(
        (status = 200, description = "Image replaced", body = PublicationResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 404, description = "Publication not found", body = ErrorResponse),
        (status = 413, description = "Image too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "publications"
)]
#[tracing::instrument(skip(state, _user, multipart), fields(operation = "upload_publication_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let publication = found(state.db.publications.get(id).await, PUBLICATION)?;
    let upload = extract_image_upload(multipart?, state.assets.max_upload_size_bytes).await?;

    let repo = &state.db.publications;
    let updated = state
        .assets
        .slots
        .replace(
            AssetFolder::PublicationImages,
            &upload.filename,
            upload.data,
            publication.image_path.as_deref(),
            move |path: String| async move {
                found(repo.set_image(id, &path).await, PUBLICATION)
            },
        )
        .await?;

    Ok(Json(PublicationResponse::build(updated, state.urls())))
}
