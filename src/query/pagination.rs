//! Pagination spec and its `sortKey,a|d,page,perPage` wire form.

use super::QueryError;
use serde::{Deserialize, Serialize};

pub const PAGINATION_PARAM: &str = "pagination";
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn code(&self) -> char {
        match self {
            SortDirection::Ascending => 'a',
            SortDirection::Descending => 'd',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(SortDirection::Ascending),
            "d" => Some(SortDirection::Descending),
            _ => None,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSpec {
    pub sort_key: String,
    pub direction: SortDirection,
    /// 1-based.
    pub page: u32,
    pub item_count_per_page: u32,
    /// Unknown until the backend reports it.
    pub total_item_count: Option<u64>,
}

impl PaginationSpec {
    pub fn new(sort_key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sort_key: sort_key.into(),
            direction,
            page: 1,
            item_count_per_page: DEFAULT_ITEMS_PER_PAGE,
            total_item_count: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_item_count_per_page(mut self, n: u32) -> Self {
        self.item_count_per_page = n.max(1);
        self
    }

    pub fn with_total_item_count(mut self, total: u64) -> Self {
        self.total_item_count = Some(total);
        self
    }

    /// `ceil(total / per_page)`, once the total is known.
    pub fn total_pages(&self) -> Option<u64> {
        let per_page = u64::from(self.item_count_per_page.max(1));
        self.total_item_count.map(|total| total.div_ceil(per_page))
    }

    pub fn is_last_page(&self) -> bool {
        self.total_pages()
            .map(|pages| u64::from(self.page) >= pages)
            .unwrap_or(false)
    }

    /// Sort by `key`; choosing the current key again flips the direction and
    /// any change of ordering goes back to page 1.
    pub fn sorted_by(mut self, key: &str) -> Self {
        if self.sort_key == key {
            self.direction = self.direction.reversed();
        } else {
            self.sort_key = key.to_string();
            self.direction = SortDirection::Descending;
        }
        self.page = 1;
        self
    }
}

pub fn compose_pagination(spec: &PaginationSpec) -> String {
    format!(
        "{},{},{},{}",
        spec.sort_key,
        spec.direction.code(),
        spec.page.max(1),
        spec.item_count_per_page.max(1)
    )
}

/// Inverse of [`compose_pagination`]. The total item count is not part of the
/// wire form and comes back as `None`.
pub fn parse_pagination(raw: &str) -> Result<PaginationSpec, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidPagination {
        input: raw.to_string(),
        reason: reason.to_string(),
    };

    // Split from the right so a sort key may itself contain commas.
    let mut parts = raw.rsplitn(4, ',');
    let per_page = parts.next().ok_or_else(|| invalid("missing items per page"))?;
    let page = parts.next().ok_or_else(|| invalid("missing page"))?;
    let direction = parts.next().ok_or_else(|| invalid("missing direction"))?;
    let sort_key = parts.next().ok_or_else(|| invalid("missing sort key"))?;

    if sort_key.is_empty() {
        return Err(invalid("empty sort key"));
    }
    let direction =
        SortDirection::from_code(direction).ok_or_else(|| invalid("direction must be 'a' or 'd'"))?;
    let page: u32 = page
        .parse()
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| invalid("page must be a positive integer"))?;
    let item_count_per_page: u32 = per_page
        .parse()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| invalid("items per page must be a positive integer"))?;

    Ok(PaginationSpec {
        sort_key: sort_key.to_string(),
        direction,
        page,
        item_count_per_page,
        total_item_count: None,
    })
}
