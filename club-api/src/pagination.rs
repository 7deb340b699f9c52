//! Pagination for list endpoints

use serde::{Deserialize, Serialize};

/// Posts per page on the public feed
pub const POSTS_PAGE_SIZE: i64 = 10;

/// Orders per page in the admin list
pub const ORDERS_PAGE_SIZE: i64 = 25;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Clamp the requested page into `[1, total_pages]` and compute the offset
///
/// # Examples
/// ```
/// use club_api::pagination::calculate_pagination;
///
/// let p = calculate_pagination(25, 10, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 10);
///
/// // Out-of-range pages are clamped
/// let p = calculate_pagination(25, 10, 99);
/// assert_eq!(p.page, 3);
/// ```
pub fn calculate_pagination(total_results: i64, page_size: i64, requested_page: i64) -> Pagination {
    let page_size = page_size.max(1);
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        page_size,
        total_pages,
        offset,
    }
}

/// `?page=` query parameter
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// A page of results with its metadata
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total_results: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total_results: i64) -> Self {
        Self {
            data,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages,
            total_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 100, 2);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_last_page() {
        let p = calculate_pagination(250, 100, 3);
        assert_eq!(p.page, 3);
        assert_eq!(p.offset, 200);
    }

    #[test]
    fn test_pagination_zero_page_clamped() {
        let p = calculate_pagination(250, 100, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);

        let p = calculate_pagination(250, 100, -5);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn test_pagination_empty_results() {
        let p = calculate_pagination(0, 10, 1);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_exact_multiple() {
        let p = calculate_pagination(20, 10, 2);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.offset, 10);
    }
}
