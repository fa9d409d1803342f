//! Subgroup CRUD, membership, and icon/background/infographic uploads

use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::{found, not_found, MessageResponse, TextSearchQuery};
use crate::state::AppState;
use crate::utils::upload::extract_image_upload;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use gem_core::models::{
    CreateSubgroupRequest, InfographicRemovedResponse, MemberSummary, Paginated,
    PaginationQuery, Subgroup, SubgroupDetailResponse, SubgroupResponse, UpdateSubgroupRequest,
};
use gem_core::AppError;
use gem_storage::AssetFolder;
use std::sync::Arc;

const SUBGROUP: &str = "Subgroup";

/// Attach member and publication summaries, two queries for the whole batch.
async fn with_relations(
    state: &AppState,
    subgroups: Vec<Subgroup>,
) -> Result<Vec<SubgroupDetailResponse>, HttpAppError> {
    let ids: Vec<i64> = subgroups.iter().map(|s| s.id).collect();
    let mut members = state.db.subgroups.members_of_many(&ids).await?;
    let mut publications = state.db.subgroups.publications_of_many(&ids).await?;

    Ok(subgroups
        .into_iter()
        .map(|subgroup| {
            let id = subgroup.id;
            SubgroupDetailResponse {
                subgroup: SubgroupResponse::build(subgroup, state.urls()),
                members: members.remove(&id).unwrap_or_default(),
                publications: publications.remove(&id).unwrap_or_default(),
            }
        })
        .collect())
}

async fn ensure_name_available(
    state: &AppState,
    name: &str,
    except_id: Option<i64>,
) -> Result<(), HttpAppError> {
    match state.db.subgroups.get_by_name(name).await? {
        Some(existing) if Some(existing.id) != except_id => Err(HttpAppError(
            AppError::BadRequest("Subgroup with this name already exists".to_string()),
        )),
        _ => Ok(()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/subgroups",
    params(PaginationQuery, TextSearchQuery),
    responses((status = 200, description = "Subgroups with members and publications", body = Paginated<SubgroupDetailResponse>)),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state), fields(operation = "list_subgroups"))]
pub async fn list_subgroups(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationQuery>,
    Query(search): Query<TextSearchQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = state.page(&pagination);
    let (subgroups, total) = state.db.subgroups.list(search.q.as_deref(), page).await?;
    let items = with_relations(&state, subgroups).await?;

    Ok(Json(Paginated::new(items, total, page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/subgroups",
    request_body = CreateSubgroupRequest,
    responses(
        (status = 201, description = "Subgroup created", body = SubgroupResponse),
        (status = 400, description = "Invalid input or duplicate name", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user, request), fields(operation = "create_subgroup"))]
pub async fn create_subgroup(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateSubgroupRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ensure_name_available(&state, &request.name, None).await?;
    let subgroup = state.db.subgroups.create(&request).await?;

    tracing::info!(subgroup_id = subgroup.id, "Subgroup created");

    Ok((
        StatusCode::CREATED,
        Json(SubgroupResponse::build(subgroup, state.urls())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/subgroups/{id}",
    params(("id" = i64, Path, description = "Subgroup ID")),
    responses(
        (status = 200, description = "Subgroup with relations", body = SubgroupDetailResponse),
        (status = 404, description = "Subgroup not found", body = ErrorResponse)
    ),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state), fields(operation = "get_subgroup"))]
pub async fn get_subgroup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let subgroup = found(state.db.subgroups.get(id).await, SUBGROUP)?;
    let mut detailed = with_relations(&state, vec![subgroup]).await?;
    let detail = detailed.pop().ok_or_else(|| not_found(SUBGROUP))?;

    Ok(Json(detail))
}

#[utoipa::path(
    put,
    path = "/api/v1/subgroups/{id}",
    params(("id" = i64, Path, description = "Subgroup ID")),
    request_body = UpdateSubgroupRequest,
    responses(
        (status = 200, description = "Subgroup updated", body = SubgroupResponse),
        (status = 400, description = "Invalid input or duplicate name", body = ErrorResponse),
        (status = 404, description = "Subgroup not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user, request), fields(operation = "update_subgroup"))]
pub async fn update_subgroup(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateSubgroupRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if let Some(name) = request.name.as_deref() {
        ensure_name_available(&state, name, Some(id)).await?;
    }
    let subgroup = found(state.db.subgroups.update(id, &request).await, SUBGROUP)?;

    Ok(Json(SubgroupResponse::build(subgroup, state.urls())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/subgroups/{id}",
    params(("id" = i64, Path, description = "Subgroup ID")),
    responses(
        (status = 204, description = "Subgroup deleted"),
        (status = 404, description = "Subgroup not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user), fields(operation = "delete_subgroup"))]
pub async fn delete_subgroup(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let subgroup = found(state.db.subgroups.delete(id).await, SUBGROUP)?;
    state.assets.slots.discard_all(subgroup.asset_paths()).await;

    tracing::info!(subgroup_id = id, "Subgroup deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/subgroups/{id}/members/{member_id}",
    params(
        ("id" = i64, Path, description = "Subgroup ID"),
        ("member_id" = i64, Path, description = "Member ID")
    ),
    responses(
        (status = 201, description = "Member added", body = MessageResponse),
        (status = 400, description = "Member already in subgroup", body = ErrorResponse),
        (status = 404, description = "Subgroup or member not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user), fields(operation = "add_subgroup_member"))]
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path((id, member_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.subgroups.exists(id).await? {
        return Err(not_found(SUBGROUP));
    }
    if !state.db.members.exists(member_id).await? {
        return Err(not_found("Member"));
    }
    if !state.db.subgroups.add_member(id, member_id).await? {
        return Err(HttpAppError(AppError::BadRequest(
            "Member is already in this subgroup".to_string(),
        )));
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Member added to subgroup")),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/subgroups/{id}/members/{member_id}",
    params(
        ("id" = i64, Path, description = "Subgroup ID"),
        ("member_id" = i64, Path, description = "Member ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 404, description = "Member is not in this subgroup", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user), fields(operation = "remove_subgroup_member"))]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path((id, member_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.subgroups.remove_member(id, member_id).await? {
        return Err(not_found("Subgroup membership"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/subgroups/{id}/members",
    params(("id" = i64, Path, description = "Subgroup ID")),
    responses(
        (status = 200, description = "Members of the subgroup", body = Vec<MemberSummary>),
        (status = 404, description = "Subgroup not found", body = ErrorResponse)
    ),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state), fields(operation = "list_subgroup_members"))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.subgroups.exists(id).await? {
        return Err(not_found(SUBGROUP));
    }
    let members = state.db.subgroups.members_of(id).await?;
    Ok(Json(members))
}

#[utoipa::path(
    post,
    path = "/api/v1/subgroups/{id}/icon",
    params(("id" = i64, Path, description = "Subgroup ID")),
    request_body(content_type = "multipart/form-data", description = "Image in field `file`"),
    responses(
        (status = 200, description = "Icon replaced", body = SubgroupResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 404, description = "Subgroup not found", body = ErrorResponse),
        (status = 413, description = "Image too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user, multipart), fields(operation = "upload_subgroup_icon"))]
pub async fn upload_icon(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let subgroup = found(state.db.subgroups.get(id).await, SUBGROUP)?;
    let upload = extract_image_upload(multipart?, state.assets.max_upload_size_bytes).await?;

    let repo = &state.db.subgroups;
    let updated = state
        .assets
        .slots
        .replace(
            AssetFolder::SubgroupIcons,
            &upload.filename,
            upload.data,
            subgroup.icon_path.as_deref(),
            move |path: String| async move { found(repo.set_icon(id, &path).await, SUBGROUP) },
        )
        .await?;

    Ok(Json(SubgroupResponse::build(updated, state.urls())))
}

#[utoipa::path(
    post,
    path = "/api/v1/subgroups/{id}/background",
    params(("id" = i64, Path, description = "Subgroup ID")),
    request_body(content_type = "multipart/form-data", description = "Image in field `file`"),
    responses(
        (status = 200, description = "Background replaced", body = SubgroupResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 404, description = "Subgroup not found", body = ErrorResponse),
        (status = 413, description = "Image too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user, multipart), fields(operation = "upload_subgroup_background"))]
pub async fn upload_background(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let subgroup = found(state.db.subgroups.get(id).await, SUBGROUP)?;
    let upload = extract_image_upload(multipart?, state.assets.max_upload_size_bytes).await?;

    let repo = &state.db.subgroups;
    let updated = state
        .assets
        .slots
        .replace(
            AssetFolder::SubgroupBackgrounds,
            &upload.filename,
            upload.data,
            subgroup.background_path.as_deref(),
            move |path: String| async move {
                found(repo.set_background(id, &path).await, SUBGROUP)
            },
        )
        .await?;

    Ok(Json(SubgroupResponse::build(updated, state.urls())))
}

#[utoipa::path(
    post,
    path = "/api/v1/subgroups/{id}/infographics",
    params(("id" = i64, Path, description = "Subgroup ID")),
    request_body(content_type = "multipart/form-data", description = "Image in field `file`"),
    responses(
        (status = 201, description = "Infographic appended", body = SubgroupResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 404, description = "Subgroup not found", body = ErrorResponse),
        (status = 413, description = "Image too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user, multipart), fields(operation = "add_subgroup_infographic"))]
pub async fn add_infographic(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.subgroups.exists(id).await? {
        return Err(not_found(SUBGROUP));
    }
    let upload = extract_image_upload(multipart?, state.assets.max_upload_size_bytes).await?;

    let repo = &state.db.subgroups;
    let updated = state
        .assets
        .slots
        .append(
            AssetFolder::SubgroupInfographics,
            &upload.filename,
            upload.data,
            move |path: String| async move {
                found(repo.append_infographic(id, &path).await, SUBGROUP)
            },
        )
        .await?;

    tracing::info!(
        subgroup_id = id,
        infographics = updated.infographics.len(),
        "Infographic added"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubgroupResponse::build(updated, state.urls())),
    ))
}

/// The compare-and-set matched no row: the subgroup was deleted, or its list
/// changed under us.
fn infographics_commit_miss(still_exists: bool) -> HttpAppError {
    if still_exists {
        HttpAppError(AppError::Conflict(
            "Infographics changed while removing; reload and retry".to_string(),
        ))
    } else {
        not_found(SUBGROUP)
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/subgroups/{id}/infographics/{index}",
    params(
        ("id" = i64, Path, description = "Subgroup ID"),
        ("index" = i64, Path, description = "Zero-based infographic position")
    ),
    responses(
        (status = 200, description = "Infographic removed", body = InfographicRemovedResponse),
        (status = 400, description = "Index out of range", body = ErrorResponse),
        (status = 404, description = "Subgroup not found", body = ErrorResponse),
        (status = 409, description = "Infographics changed concurrently", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "subgroups"
)]
#[tracing::instrument(skip(state, _user), fields(operation = "remove_subgroup_infographic"))]
pub async fn remove_infographic(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path((id, index)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let subgroup = found(state.db.subgroups.get(id).await, SUBGROUP)?;

    let repo = &state.db.subgroups;
    let expected = subgroup.infographics.as_slice();
    let updated = state
        .assets
        .slots
        .remove_at(expected, index, move |remaining: Vec<String>| async move {
            match repo.replace_infographics(id, expected, &remaining).await {
                Ok(Some(updated)) => Ok(updated),
                Ok(None) => match repo.get(id).await {
                    Ok(current) => Err(infographics_commit_miss(current.is_some())),
                    Err(e) => Err(HttpAppError(e)),
                },
                Err(e) => Err(HttpAppError(e)),
            }
        })
        .await?;

    let response = SubgroupResponse::build(updated, state.urls());
    Ok(Json(InfographicRemovedResponse {
        removed_index: index as usize,
        remaining: response.infographic_urls.len(),
        infographic_urls: response.infographic_urls,
    }))
}
