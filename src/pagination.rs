use crate::models::PaginationInfo;
use serde::{Deserialize, Serialize};

/// Page position for one collection view.
///
/// `total_pages` is always derived from `total_count` and `limit`, and
/// `current_page` stays within `1..=max(total_pages, 1)` except transiently
/// after [`PaginationState::record_removed`], which reports the overflow so
/// the owner can clamp and refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    current_page: u32,
    limit: u32,
    total_count: u64,
    total_pages: u32,
}

impl PaginationState {
    pub fn new(limit: u32) -> Self {
        Self {
            current_page: 1,
            limit: limit.max(1),
            total_count: 0,
            total_pages: 0,
        }
    }

    /// Builds the state from a server response. The server's page count is
    /// ignored in favour of the derived one.
    pub fn from_server(info: &PaginationInfo, fallback_limit: u32) -> Self {
        let limit = if info.limit == 0 { fallback_limit.max(1) } else { info.limit };
        let total_pages = pages_for(info.total_count, limit);
        Self {
            current_page: info.current_page.clamp(1, total_pages.max(1)),
            limit,
            total_count: info.total_count,
            total_pages,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_prev_page(&self) -> bool {
        self.current_page > 1
    }

    pub fn is_past_end(&self) -> bool {
        self.current_page > self.last_page()
    }

    /// Adjusts totals after entities were removed locally without a refetch.
    /// `current_page` is left alone; returns true when it is now past the end.
    pub fn record_removed(&mut self, removed: u64) -> bool {
        self.total_count = self.total_count.saturating_sub(removed);
        self.total_pages = pages_for(self.total_count, self.limit);
        self.is_past_end()
    }

    /// Pulls `current_page` back onto the last valid page.
    pub fn clamp_current(&mut self) -> u32 {
        self.current_page = self.current_page.clamp(1, self.last_page());
        self.current_page
    }

    pub fn with_limit(self, limit: u32) -> Self {
        let limit = limit.max(1);
        Self {
            current_page: 1,
            limit,
            total_count: self.total_count,
            total_pages: pages_for(self.total_count, limit),
        }
    }
}

pub fn pages_for(total_count: u64, limit: u32) -> u32 {
    let limit = u64::from(limit.max(1));
    let pages = total_count.div_ceil(limit);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
