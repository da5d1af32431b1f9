use serde::{Deserialize, Serialize};

use crate::errors::PayloadError;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// A validated page request. Both `page` and `limit` are at least 1, which keeps
/// the `last_page` division well defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, limit: DEFAULT_LIMIT }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Result<Self, PayloadError> {
        if page == 0 {
            return Err(PayloadError::new("page", "page must be a positive integer"));
        }
        if limit == 0 {
            return Err(PayloadError::new("limit", "limit must be a positive integer"));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip before the first row of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn last_page(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

/// Raw `?page=&limit=` input as it arrives from a transport binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl TryFrom<PaginationQuery> for Pagination {
    type Error = PayloadError;

    fn try_from(query: PaginationQuery) -> Result<Self, Self::Error> {
        Self::new(query.page.unwrap_or(DEFAULT_PAGE), query.limit.unwrap_or(DEFAULT_LIMIT))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub total: u64,
    #[serde(rename = "lastPage")]
    pub last_page: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::{Pagination, PaginationQuery};

    #[test]
    fn defaults_apply_to_missing_query_values() {
        let pagination = Pagination::try_from(PaginationQuery::default()).expect("defaults");
        assert_eq!(pagination, Pagination::default());
        assert_eq!((pagination.page(), pagination.limit()), (1, 10));
    }

    #[test]
    fn offset_skips_previous_pages() {
        let pagination = Pagination::new(3, 10).expect("valid");
        assert_eq!(pagination.offset(), 20);
    }

    #[test]
    fn last_page_rounds_up() {
        let pagination = Pagination::new(1, 10).expect("valid");
        assert_eq!(pagination.last_page(25), 3);
        assert_eq!(pagination.last_page(30), 3);
        assert_eq!(pagination.last_page(0), 0);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let error = Pagination::try_from(PaginationQuery { page: Some(1), limit: Some(0) })
            .expect_err("zero limit");
        assert_eq!(error.field(), "limit");
    }

    #[test]
    fn zero_page_is_rejected() {
        assert!(Pagination::new(0, 10).is_err());
    }
}
