//! Member CRUD, name search, relations and photo/background uploads

use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::{found, not_found};
use crate::state::AppState;
use crate::utils::upload::extract_image_upload;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use gem_core::models::{
    CreateMemberRequest, Member, MemberDetailResponse, MemberResponse, Paginated,
    PaginationQuery, PublicationSummary, SubgroupSummary, UpdateMemberRequest,
};
use gem_storage::AssetFolder;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

const MEMBER: &str = "Member";

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MemberListQuery {
    /// Case-insensitive search over name, description and experience
    #[serde(default)]
    pub q: Option<String>,
    /// Only members of this subgroup
    #[serde(default)]
    pub subgroup_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NameSearchQuery {
    /// Case-insensitive substring of the member name
    pub name: String,
}

async fn with_relations(
    state: &AppState,
    members: Vec<Member>,
) -> Result<Vec<MemberDetailResponse>, HttpAppError> {
    let ids: Vec<i64> = members.iter().map(|m| m.id).collect();
    let mut subgroups = state.db.members.subgroups_of_many(&ids).await?;
    let mut publications = state.db.members.publications_of_many(&ids).await?;

    Ok(members
        .into_iter()
        .map(|member| {
            let id = member.id;
            MemberDetailResponse {
                member: MemberResponse::build(member, state.urls()),
                subgroups: subgroups.remove(&id).unwrap_or_default(),
                publications: publications.remove(&id).unwrap_or_default(),
            }
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/members",
    params(PaginationQuery, MemberListQuery),
    responses((status = 200, description = "Members with subgroups and publications", body = Paginated<MemberDetailResponse>)),
    tag = "members"
)]
#[tracing::instrument(skip(state), fields(operation = "list_members"))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<MemberListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = state.page(&pagination);
    let (members, total) = state
        .db
        .members
        .list(filter.q.as_deref(), filter.subgroup_id, page)
        .await?;
    let items = with_relations(&state, members).await?;

    Ok(Json(Paginated::new(items, total, page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/members/search/name",
    params(PaginationQuery, NameSearchQuery),
    responses((status = 200, description = "Members whose name matches", body = Paginated<MemberResponse>)),
    tag = "members"
)]
#[tracing::instrument(skip(state), fields(operation = "search_members_by_name"))]
pub async fn search_by_name(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationQuery>,
    Query(search): Query<NameSearchQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = state.page(&pagination);
    let (members, total) = state.db.members.search_by_name(&search.name, page).await?;
    let urls = state.urls();

    Ok(Json(
        Paginated::new(members, total, page).map(|member| MemberResponse::build(member, urls)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/members",
    request_body = CreateMemberRequest,
    responses(
        (status = 201, description = "Member created", body = MemberResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
#[tracing::instrument(skip(state, _user, request), fields(operation = "create_member"))]
pub async fn create_member(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateMemberRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let member = state.db.members.create(&request).await?;

    tracing::info!(member_id = member.id, "Member created");

    Ok((
        StatusCode::CREATED,
        Json(MemberResponse::build(member, state.urls())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/members/{id}",
    params(("id" = i64, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member with relations", body = MemberDetailResponse),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    tag = "members"
)]
#[tracing::instrument(skip(state), fields(operation = "get_member"))]
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let member = found(state.db.members.get(id).await, MEMBER)?;
    let mut detailed = with_relations(&state, vec![member]).await?;
    let detail = detailed.pop().ok_or_else(|| not_found(MEMBER))?;

    Ok(Json(detail))
}

#[utoipa::path(
    put,
    path = "/api/v1/members/{id}",
    params(("id" = i64, Path, description = "Member ID")),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Member updated", body = MemberResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
#[tracing::instrument(skip(state, _user, request), fields(operation = "update_member"))]
pub async fn update_member(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateMemberRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let member = found(state.db.members.update(id, &request).await, MEMBER)?;
    Ok(Json(MemberResponse::build(member, state.urls())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/members/{id}",
    params(("id" = i64, Path, description = "Member ID")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
#[tracing::instrument(skip(state, _user), fields(operation = "delete_member"))]
pub async fn delete_member(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let member = found(state.db.members.delete(id).await, MEMBER)?;
    state.assets.slots.discard_all(member.asset_paths()).await;

    tracing::info!(member_id = id, "Member deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/members/{id}/subgroups",
    params(("id" = i64, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Subgroups of the member", body = Vec<SubgroupSummary>),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    tag = "members"
)]
pub async fn list_subgroups(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.members.exists(id).await? {
        return Err(not_found(MEMBER));
    }
    Ok(Json(state.db.members.subgroups_of(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/members/{id}/publications",
    params(("id" = i64, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Publications authored by the member", body = Vec<PublicationSummary>),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    tag = "members"
)]
pub async fn list_publications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.members.exists(id).await? {
        return Err(not_found(MEMBER));
    }
    Ok(Json(state.db.members.publications_of(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/members/{id}/photo",
    params(("id" = i64, Path, description = "Member ID")),
    request_body(content_type = "multipart/form-data", description = "Image in field `file`"),
    responses(
        (status = 200, description = "Photo replaced", body = MemberResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 413, description = "Image too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
#[tracing::instrument(skip(state, _user, multipart), fields(operation = "upload_member_photo"))]
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let member = found(state.db.members.get(id).await, MEMBER)?;
    let upload = extract_image_upload(multipart?, state.assets.max_upload_size_bytes).await?;

    let repo = &state.db.members;
    let updated = state
        .assets
        .slots
        .replace(
            AssetFolder::MemberPhotos,
            &upload.filename,
            upload.data,
            member.photo_path.as_deref(),
            move |path: String| async move { found(repo.set_photo(id, &path).await, MEMBER) },
        )
        .await?;

    Ok(Json(MemberResponse::build(updated, state.urls())))
}

#[utoipa::path(
    post,
    path = "/api/v1/members/{id}/background",
    params(("id" = i64, Path, description = "Member ID")),
    request_body(content_type = "multipart/form-data", description = "Image in field `file`"),
    responses(
        (status = 200, description = "Background replaced", body = MemberResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 413, description = "Image too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
#[tracing::instrument(skip(state, _user, multipart), fields(operation = "upload_member_background"))]
pub async fn upload_background(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let member = found(state.db.members.get(id).await, MEMBER)?;
    let upload = extract_image_upload(multipart?, state.assets.max_upload_size_bytes).await?;

    let repo = &state.db.members;
    let updated = state
        .assets
        .slots
        .replace(
            AssetFolder::MemberBackgrounds,
            &upload.filename,
            upload.data,
            member.background_path.as_deref(),
            move |path: String| async move {
                found(repo.set_background(id, &path).await, MEMBER)
            },
        )
        .await?;

    Ok(Json(MemberResponse::build(updated, state.urls())))
}
