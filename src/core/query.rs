//! Query parameters and pagination utilities

use serde::{Deserialize, Serialize};

/// Hard cap on the number of rows a single list call may return
pub const MAX_LIMIT: usize = 1000;

/// Default page size when `limit` is not supplied
pub const DEFAULT_LIMIT: usize = 100;

/// Query parameters for paginated list endpoints
///
/// Extracted from the URL query string; both parameters have defaults.
///
/// # Example
/// ```rust,ignore
/// // GET /countries/list?offset=40&limit=20
/// pub async fn list(Query(params): Query<ListParams>) -> ... {
///     // params.offset() == 40, params.limit() == 20
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ListParams {
    /// Number of rows to skip
    pub offset: usize,

    /// Number of rows to return (clamped to 1..=1000)
    pub limit: Option<usize>,
}

impl ListParams {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Offset into the result set
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Effective limit, clamped to 1..=[`MAX_LIMIT`]
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// One page of rows plus pagination metadata
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageMeta,
}

/// Pagination metadata
#[derive(Debug, Serialize)]
pub struct PageMeta {
    /// Offset this page starts at
    pub offset: usize,

    /// Effective limit used for this page
    pub limit: usize,

    /// Total number of rows in the table
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: &ListParams, total: u64) -> Self {
        Self {
            items,
            pagination: PageMeta {
                offset: params.offset(),
                limit: params.limit(),
                total,
            },
        }
    }
}

/// Revision marker for a table: row count plus the latest update instant
#[derive(Debug, Clone, Serialize)]
pub struct TableRevision {
    pub table: String,
    pub count: u64,
    /// RFC 3339 instant of the most recent `updated_at`, null when empty
    pub revision: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = ListParams::default();
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let params = ListParams::new(0, 5000);
        assert_eq!(params.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_limit_clamped_to_min() {
        let params = ListParams::new(0, 0);
        assert_eq!(params.limit(), 1);
    }

    #[test]
    fn test_deserialize_from_query() {
        let params: ListParams = serde_json::from_str(r#"{"offset": 40, "limit": 20}"#).unwrap();
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);
    }

    #[test]
    fn test_page_meta() {
        let params = ListParams::new(10, 5);
        let page = Page::new(vec![1, 2, 3], &params, 42);
        assert_eq!(page.pagination.offset, 10);
        assert_eq!(page.pagination.limit, 5);
        assert_eq!(page.pagination.total, 42);
    }
}
