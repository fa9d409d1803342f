use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// `skip`/`limit` query parameters shared by every list endpoint
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// Number of records to skip
    #[serde(default)]
    pub skip: Option<i64>,
    /// Maximum number of records to return
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Resolved, bounded pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl PaginationQuery {
    /// Applies defaults and clamps the window to `1..=max_limit`.
    pub fn resolve(&self, default_limit: i64, max_limit: i64) -> Page {
        Page {
            skip: self.skip.unwrap_or(0).max(0),
            limit: self.limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }
}

/// One page of a listing
#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
    pub has_next: bool,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            skip: page.skip,
            limit: page.limit,
            has_next: page.skip + page.limit < total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
            has_next: self.has_next,
        }
    }
}
