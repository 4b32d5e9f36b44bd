//! Pagination parameters for list queries.

use serde::{Deserialize, Serialize};

/// Sort direction for time-ordered listings.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

/// One page of a listing (1-based page number).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub page: u32,
    pub sort: SortOrder,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page from optional request parameters.
    ///
    /// Missing or zero values fall back to defaults; `limit` is capped at `MAX_LIMIT`.
    pub fn new(limit: Option<u32>, page: Option<u32>, sort: Option<SortOrder>) -> Self {
        let limit = match limit {
            Some(0) | None => Self::DEFAULT_LIMIT,
            Some(l) => l.min(Self::MAX_LIMIT),
        };
        let page = match page {
            Some(0) | None => 1,
            Some(p) => p,
        };
        Self {
            limit,
            page,
            sort: sort.unwrap_or_default(),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}
