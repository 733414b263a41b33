//! 查询组合：分页与日期区间参数的规范化编码。
//!
//! # Query Composer
//!
//! Pure helpers that turn pagination and date-range selections into the query
//! values the backend expects, and fold them into a [`RequestKey`].
//!
//! ```
//! use jsinfo_fetch::cache::RequestKey;
//! use jsinfo_fetch::query::{PaginationSpec, SortDirection};
//!
//! let key = RequestKey::new("providers").with_pagination(
//!     &PaginationSpec::new("totalStake", SortDirection::Descending).with_page(2),
//! );
//! assert_eq!(key.canonical(), "providers?pagination=totalStake%2Cd%2C2%2C20");
//! ```

mod date_range;
mod pagination;

pub use date_range::{
    clamp_date_range, clamp_date_range_at, compose_date_range, compose_date_range_at,
    default_window, today, DateBound, DateRangeQuery, DateRangeSpec, DEFAULT_WINDOW_DAYS,
    MAX_RANGE_MONTHS, MIN_RANGE_DAYS,
};
pub use pagination::{
    compose_pagination, parse_pagination, PaginationSpec, SortDirection, DEFAULT_ITEMS_PER_PAGE,
    PAGINATION_PARAM,
};

use crate::cache::RequestKey;

pub const DATE_FROM_PARAM: &str = "f";
pub const DATE_TO_PARAM: &str = "t";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid pagination {input:?}: {reason}")]
    InvalidPagination { input: String, reason: String },
}

impl RequestKey {
    pub fn with_pagination(self, spec: &PaginationSpec) -> Self {
        self.with_param(PAGINATION_PARAM, compose_pagination(spec))
    }

    pub fn with_date_range(self, range: &DateRangeSpec) -> Self {
        self.with_date_range_query(&compose_date_range(range))
    }

    pub fn with_date_range_query(self, query: &DateRangeQuery) -> Self {
        self.with_param(DATE_FROM_PARAM, query.f.clone())
            .with_param(DATE_TO_PARAM, query.t.clone())
    }

    /// The pagination currently folded into this key, if any.
    pub fn pagination(&self) -> Option<Result<PaginationSpec, QueryError>> {
        self.param(PAGINATION_PARAM).map(parse_pagination)
    }
}
