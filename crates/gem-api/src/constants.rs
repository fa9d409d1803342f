//! API constants

/// Versioned prefix for every REST route
pub const API_PREFIX: &str = "/api/v1";

/// Served OpenAPI document
pub const OPENAPI_PATH: &str = "/api/openapi.json";

pub const SERVICE_NAME: &str = "gem-api";
