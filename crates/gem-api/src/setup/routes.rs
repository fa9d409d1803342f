//! Route configuration and setup

use crate::api_doc::ApiDoc;
use crate::auth::middleware::auth_middleware;
use crate::constants::{API_PREFIX, OPENAPI_PATH};
use crate::handlers::{auth, files, health, members, publications, subgroups};
use crate::middleware::{security_headers_middleware, SecurityHeadersConfig};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Json, Router,
};
use gem_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let config = &state.config;
    let cors = setup_cors(config)?;
    let body_limit = config.max_upload_size_bytes() + MULTIPART_OVERHEAD_BYTES;

    let protected = protected_routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));
    let api = public_routes().merge(protected);

    let security_headers_config = Arc::new(SecurityHeadersConfig::new(config.is_production()));

    let app = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest(API_PREFIX, api)
        .route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
        .merge(RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            security_headers_config,
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

/// Reads, login/registration and signed file downloads
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Subgroups
        .route("/subgroups", get(subgroups::list_subgroups))
        .route("/subgroups/{id}", get(subgroups::get_subgroup))
        .route("/subgroups/{id}/members", get(subgroups::list_members))
        // Members
        .route("/members", get(members::list_members))
        .route("/members/search/name", get(members::search_by_name))
        .route("/members/{id}", get(members::get_member))
        .route("/members/{id}/subgroups", get(members::list_subgroups))
        .route("/members/{id}/publications", get(members::list_publications))
        // Publications
        .route("/publications", get(publications::list_publications))
        .route("/publications/kinds", get(publications::list_kinds))
        .route(
            "/publications/search/advanced",
            get(publications::search_advanced),
        )
        .route("/publications/statistics", get(publications::statistics))
        .route("/publications/{id}", get(publications::get_publication))
        // Files
        .route("/files/{*path}", get(files::serve_file))
}

/// Every mutation plus `/auth/me`; wrapped in the bearer auth middleware
fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::me))
        // Subgroups
        .route("/subgroups", post(subgroups::create_subgroup))
        .route(
            "/subgroups/{id}",
            put(subgroups::update_subgroup).delete(subgroups::delete_subgroup),
        )
        .route(
            "/subgroups/{id}/members/{member_id}",
            post(subgroups::add_member).delete(subgroups::remove_member),
        )
        .route("/subgroups/{id}/icon", post(subgroups::upload_icon))
        .route(
            "/subgroups/{id}/background",
            post(subgroups::upload_background),
        )
        .route(
            "/subgroups/{id}/infographics",
            post(subgroups::add_infographic),
        )
        .route(
            "/subgroups/{id}/infographics/{index}",
            axum::routing::delete(subgroups::remove_infographic),
        )
        // Members
        .route("/members", post(members::create_member))
        .route(
            "/members/{id}",
            put(members::update_member).delete(members::delete_member),
        )
        .route("/members/{id}/photo", post(members::upload_photo))
        .route("/members/{id}/background", post(members::upload_background))
        // Publications
        .route("/publications", post(publications::create_publication))
        .route(
            "/publications/{id}",
            put(publications::update_publication).delete(publications::delete_publication),
        )
        .route("/publications/{id}/image", post(publications::upload_image))
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {:?}: {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
