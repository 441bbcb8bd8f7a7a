//! Pagination parameters and metadata

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Normalized page request (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl PageParams {
    /// Clamp raw values into the supported range
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let page = page.filter(|page| *page >= 1).unwrap_or(DEFAULT_PAGE);
        let per_page = per_page
            .filter(|per_page| *per_page >= 1)
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE);
        Self { page, per_page }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.per_page
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    #[must_use]
    pub fn new(params: PageParams, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(u64::from(params.per_page)).max(1);
        Self {
            page: params.page,
            per_page: params.per_page,
            total_items,
            total_pages,
            has_next: u64::from(params.page) < total_pages,
            has_prev: params.page > 1,
        }
    }
}
