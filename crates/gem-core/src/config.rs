//! Configuration module
//!
//! Settings are read once at start-up from the environment (and `.env` via
//! `dotenvy`) and then passed by value into the components that need them.
//! Nothing here is global: the URL signing secret and the storage root are
//! handed to their constructors explicitly.

use std::env;

// Common constants
const DEFAULT_PORT: u16 = 8000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24;
const SIGNED_URL_TTL_SECS: i64 = 3600;
const MAX_SIGNED_URL_TTL_SECS: i64 = 365 * 24 * 3600;
const MAX_UPLOAD_SIZE_MB: usize = 10;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MIN_SECRET_LEN: usize = 32;

/// Server-level settings shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub environment: String,
}

/// Registry service configuration
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Asset storage
    pub uploads_path: String,
    pub files_base_url: String,
    pub file_url_secret: String,
    pub signed_url_ttl_seconds: i64,
    pub max_upload_size_bytes: usize,
    // Listing
    pub default_page_size: i64,
    pub max_page_size: i64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<RegistryConfig>);

impl Config {
    fn as_registry(&self) -> &RegistryConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_registry().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = RegistryConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_registry().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_registry().base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.as_registry().base.jwt_secret
    }

    pub fn jwt_expiry_hours(&self) -> i64 {
        self.as_registry().base.jwt_expiry_hours
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_registry().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_registry().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_registry().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_registry().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.as_registry().database_url
    }

    pub fn uploads_path(&self) -> &str {
        &self.as_registry().uploads_path
    }

    pub fn files_base_url(&self) -> &str {
        &self.as_registry().files_base_url
    }

    pub fn file_url_secret(&self) -> &str {
        &self.as_registry().file_url_secret
    }

    pub fn signed_url_ttl_seconds(&self) -> i64 {
        self.as_registry().signed_url_ttl_seconds
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_registry().max_upload_size_bytes
    }

    pub fn default_page_size(&self) -> i64 {
        self.as_registry().default_page_size
    }

    pub fn max_page_size(&self) -> i64 {
        self.as_registry().max_page_size
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?;

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: jwt_secret.clone(),
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| JWT_EXPIRY_HOURS.to_string())
                .parse()
                .unwrap_or(JWT_EXPIRY_HOURS),
            environment,
        };

        let config = RegistryConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            uploads_path: env::var("UPLOADS_PATH").unwrap_or_else(|_| "uploads".to_string()),
            files_base_url: env::var("FILES_BASE_URL")
                .unwrap_or_else(|_| "/api/v1/files".to_string()),
            file_url_secret: env::var("FILE_URL_SECRET").unwrap_or(jwt_secret),
            signed_url_ttl_seconds: env::var("SIGNED_URL_TTL_SECONDS")
                .unwrap_or_else(|_| SIGNED_URL_TTL_SECS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SIGNED_URL_TTL_SECONDS must be a whole number"))?,
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| DEFAULT_PAGE_SIZE.to_string())
                .parse()
                .unwrap_or(DEFAULT_PAGE_SIZE),
            max_page_size: env::var("MAX_PAGE_SIZE")
                .unwrap_or_else(|_| MAX_PAGE_SIZE.to_string())
                .parse()
                .unwrap_or(MAX_PAGE_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if self.file_url_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "FILE_URL_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.database_url.starts_with("postgresql://")
            || self.database_url.starts_with("postgres://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.signed_url_ttl_seconds <= 0 {
            return Err(anyhow::anyhow!(
                "SIGNED_URL_TTL_SECONDS must be greater than zero"
            ));
        }

        if self.signed_url_ttl_seconds > MAX_SIGNED_URL_TTL_SECS {
            return Err(anyhow::anyhow!(
                "SIGNED_URL_TTL_SECONDS must be at most {} (one year)",
                MAX_SIGNED_URL_TTL_SECS
            ));
        }

        if self.uploads_path.trim().is_empty() {
            return Err(anyhow::anyhow!("UPLOADS_PATH must not be empty"));
        }

        if self.default_page_size < 1 || self.default_page_size > self.max_page_size {
            return Err(anyhow::anyhow!(
                "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE ({})",
                self.max_page_size
            ));
        }

        if is_production_env(&self.base.environment)
            && self.base.cors_origins.iter().any(|o| o == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        Ok(())
    }
}
