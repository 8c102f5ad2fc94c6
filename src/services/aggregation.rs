use serde::Serialize;

use crate::models::carbon::{MonthBucket, YearBucket};

pub const MONTHS_PER_YEAR: i32 = 12;
pub const MULTI_YEAR_SPAN: i32 = 5;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Exactly twelve buckets, January first. Months without data are all zero.
pub fn fill_months(found: &[MonthBucket]) -> Vec<MonthBucket> {
    (1..=MONTHS_PER_YEAR)
        .map(|month| {
            found
                .iter()
                .find(|b| b.month == month)
                .copied()
                .unwrap_or(MonthBucket { month, total: 0.0, count: 0, average: 0.0 })
        })
        .collect()
}

/// Inclusive `[end - 4, end]`.
pub fn year_window(end_year: i32) -> (i32, i32) {
    (end_year.saturating_sub(MULTI_YEAR_SPAN - 1), end_year)
}

/// Exactly five buckets ending at `end_year`, oldest first.
pub fn fill_years(end_year: i32, found: &[YearBucket]) -> Vec<YearBucket> {
    let (from, to) = year_window(end_year);
    (from..=to)
        .map(|year| {
            found
                .iter()
                .find(|b| b.year == year)
                .copied()
                .unwrap_or(YearBucket { year, total: 0.0, count: 0 })
        })
        .collect()
}

/// An explicit year wins; otherwise the newest year with data, otherwise `current`.
/// `available` is expected newest first.
pub fn pick_year(requested: Option<i32>, available: &[i32], current: i32) -> i32 {
    requested
        .or_else(|| available.iter().copied().max())
        .unwrap_or(current)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: i64,
}

impl PageRequest {
    /// Page defaults to 1 and limit to 10; both are raised to at least 1.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1) as u64,
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit as u64)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total_items: u64) -> Self {
        Pagination {
            current_page: request.page,
            total_pages: total_items.div_ceil(request.limit as u64),
            total_items,
            items_per_page: request.limit,
        }
    }
}
