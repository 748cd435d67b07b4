use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Pagination parameters for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl PaginationParams {
    /// Build params from optional caller input, clamping to sane bounds
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    /// Calculate offset for database queries
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Get limit for database queries
    pub fn limit(&self) -> i64 {
        self.limit
    }
}

/// Paginated result wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total_count: i64, params: &PaginationParams) -> Self {
        Self {
            items,
            total_count,
            limit: params.limit,
            offset: params.offset,
        }
    }

    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total_count
    }
}
