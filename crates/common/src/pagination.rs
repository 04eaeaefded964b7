//! Page-based pagination shared by every listing endpoint.

use serde::{Deserialize, Serialize};

/// Largest page size any listing will serve.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Page size used when the caller sends none or a non-positive one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Highest page number served. Keeps `offset()` within a SQL `BIGINT`.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

/// Normalized, 1-based page request.
///
/// Construct through [`PageRequest::new`]; the fields are always within range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    /// Normalize raw query parameters.
    ///
    /// - `page < 1` becomes `1`, pages past [`MAX_PAGE`] become [`MAX_PAGE`]
    /// - `page_size > 100` becomes `100`
    /// - `page_size < 1` (or missing) becomes the default of `10`
    #[must_use]
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page
            .filter(|p| *p >= 1)
            .map_or(1, |p| (p as u64).min(MAX_PAGE));
        let page_size = match page_size {
            Some(size) if size >= 1 => (size as u64).min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// 0-based page index, as expected by sea-orm paginators.
    #[must_use]
    pub const fn page_index(&self) -> u64 {
        self.page - 1
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.page_index().saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Raw pagination query string parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// Requested page (1-based).
    pub page: Option<i64>,
    /// Requested page size.
    pub page_size: Option<i64>,
}

impl From<PageQuery> for PageRequest {
    fn from(query: PageQuery) -> Self {
        Self::new(query.page, query.page_size)
    }
}

/// One page of results, reporting the normalized values actually used.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total_count: u64,
    /// Page number used.
    pub page: u64,
    /// Page size used.
    pub page_size: u64,
}

impl<T> Page<T> {
    /// Assemble a page from a request and its results.
    #[must_use]
    pub const fn new(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_count,
            page: request.page,
            page_size: request.page_size,
        }
    }

    /// Convert the items while keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
