//! Application state and sub-states.
//!
//! Handlers receive `State<Arc<AppState>>` and reach repositories through
//! `state.db`, storage through `state.assets` and token handling through
//! `state.auth`.

use crate::auth::JwtService;
use gem_core::models::{Page, PaginationQuery};
use gem_core::{AssetUrlIssuer, Config};
use gem_db::{MemberRepository, PublicationRepository, SubgroupRepository, UserRepository};
use gem_storage::{AssetSlots, FileAccessController, LocalStorage, Storage, UrlSigner};
use sqlx::PgPool;
use std::sync::Arc;

/// Database pool and repositories
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub subgroups: SubgroupRepository,
    pub members: MemberRepository,
    pub publications: PublicationRepository,
    pub users: UserRepository,
}

impl DbState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            subgroups: SubgroupRepository::new(pool.clone()),
            members: MemberRepository::new(pool.clone()),
            publications: PublicationRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Asset storage, slot policy, URL signing and file access checks
#[derive(Clone)]
pub struct AssetState {
    pub storage: Arc<LocalStorage>,
    pub slots: AssetSlots,
    pub signer: Arc<UrlSigner>,
    pub files: FileAccessController,
    pub max_upload_size_bytes: usize,
}

impl AssetState {
    pub fn new(storage: Arc<LocalStorage>, signer: UrlSigner, max_upload_size_bytes: usize) -> Self {
        let signer = Arc::new(signer);
        Self {
            slots: AssetSlots::new(storage.clone() as Arc<dyn Storage>),
            files: FileAccessController::new(storage.clone(), signer.clone()),
            storage,
            signer,
            max_upload_size_bytes,
        }
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
}

pub struct AppState {
    pub config: Config,
    pub db: DbState,
    pub assets: AssetState,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, storage: Arc<LocalStorage>, signer: UrlSigner) -> Self {
        let assets = AssetState::new(storage, signer, config.max_upload_size_bytes());
        let auth = AuthState {
            jwt: JwtService::new(config.jwt_secret(), config.jwt_expiry_hours()),
        };
        Self {
            db: DbState::new(pool),
            assets,
            auth,
            config,
        }
    }

    /// Issuer used to turn stored asset paths into signed URLs in responses
    pub fn urls(&self) -> &dyn AssetUrlIssuer {
        self.assets.signer.as_ref()
    }

    /// Resolve `skip`/`limit` against the configured page sizes
    pub fn page(&self, query: &PaginationQuery) -> Page {
        query.resolve(self.config.default_page_size(), self.config.max_page_size())
    }
}
