//! OpenAPI documentation, served at `/api/openapi.json` and rendered by
//! RapiDoc at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use gem_core::models;

/// Registers the bearer JWT scheme referenced by protected operations.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GEM Registry API",
        version = "0.1.0",
        description = "Research group registry: subgroups, members and publications, with image assets served through signed, expiring URLs. All resource endpoints live under /api/v1/."
    ),
    paths(
        // Auth
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        // Subgroups
        handlers::subgroups::list_subgroups,
        handlers::subgroups::create_subgroup,
        handlers::subgroups::get_subgroup,
        handlers::subgroups::update_subgroup,
        handlers::subgroups::delete_subgroup,
        handlers::subgroups::add_member,
        handlers::subgroups::remove_member,
        handlers::subgroups::list_members,
        handlers::subgroups::upload_icon,
        handlers::subgroups::upload_background,
        handlers::subgroups::add_infographic,
        handlers::subgroups::remove_infographic,
        // Members
        handlers::members::list_members,
        handlers::members::search_by_name,
        handlers::members::create_member,
        handlers::members::get_member,
        handlers::members::update_member,
        handlers::members::delete_member,
        handlers::members::list_subgroups,
        handlers::members::list_publications,
        handlers::members::upload_photo,
        handlers::members::upload_background,
        // Publications
        handlers::publications::list_publications,
        handlers::publications::create_publication,
        handlers::publications::get_publication,
        handlers::publications::update_publication,
        handlers::publications::delete_publication,
        handlers::publications::list_kinds,
        handlers::publications::search_advanced,
        handlers::publications::statistics,
        handlers::publications::upload_image,
        // Files
        handlers::files::serve_file,
        // Health
        handlers::health::liveness,
        handlers::health::readiness,
        handlers::health::root,
    ),
    components(
        schemas(
            models::SubgroupResponse,
            models::SubgroupDetailResponse,
            models::SubgroupSummary,
            models::CreateSubgroupRequest,
            models::UpdateSubgroupRequest,
            models::InfographicRemovedResponse,
            models::MemberResponse,
            models::MemberDetailResponse,
            models::MemberSummary,
            models::CreateMemberRequest,
            models::UpdateMemberRequest,
            models::PublicationKind,
            models::PublicationResponse,
            models::PublicationDetailResponse,
            models::PublicationSummary,
            models::CreatePublicationRequest,
            models::UpdatePublicationRequest,
            models::PublicationSearchResponse,
            models::AppliedFilters,
            models::PublicationStatistics,
            models::UserResponse,
            models::RegisterRequest,
            models::LoginRequest,
            models::TokenResponse,
            handlers::MessageResponse,
            handlers::health::HealthResponse,
            handlers::health::ReadinessResponse,
            handlers::health::BannerResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Account registration and bearer token issuance"),
        (name = "subgroups", description = "Research subgroups, their members and image assets"),
        (name = "members", description = "Group members, their relations and image assets"),
        (name = "publications", description = "Publications, search and statistics"),
        (name = "files", description = "Signed, expiring downloads of stored assets"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
