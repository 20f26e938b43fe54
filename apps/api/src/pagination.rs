use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Query string for list endpoints: `?page=&page_size=&search=`.
/// Kept flat because `serde_urlencoded` cannot parse numbers through `#[serde(flatten)]`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self) -> Result<PageRequest, AppError> {
        PageRequest::new(self.page, self.page_size)
    }

    /// Search term with surrounding whitespace removed; blank means no search.
    pub fn search_term(&self) -> Option<&str> {
        normalize_filter(self.search.as_deref())
    }
}

pub fn normalize_filter(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Result<Self, AppError> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(AppError::UnprocessableEntity(
                "page must be greater than or equal to 1".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::UnprocessableEntity(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        // OFFSET must stay representable for every accepted page
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(AppError::UnprocessableEntity("page is too large".to_string()));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

/// Paginated list envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.page_size - 1) / request.page_size
        };
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = PageRequest::new(None, None).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_offset_for_later_pages() {
        let req = PageRequest::new(Some(3), Some(25)).unwrap();
        assert_eq!(req.offset(), 50);
        assert_eq!(req.limit(), 25);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(PageRequest::new(Some(0), None).is_err());
        assert!(PageRequest::new(Some(1), Some(0)).is_err());
        assert!(PageRequest::new(Some(1), Some(MAX_PAGE_SIZE + 1)).is_err());
    }

    #[test]
    fn test_huge_page_is_rejected_not_overflowed() {
        assert!(matches!(
            PageRequest::new(Some(i64::MAX), Some(MAX_PAGE_SIZE)),
            Err(AppError::UnprocessableEntity(_))
        ));
        // The largest page whose offset still fits is accepted
        let last = i64::MAX / MAX_PAGE_SIZE + 1;
        let req = PageRequest::new(Some(last), Some(MAX_PAGE_SIZE)).unwrap();
        assert_eq!(req.offset(), (last - 1) * MAX_PAGE_SIZE);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let req = PageRequest::new(Some(1), Some(10)).unwrap();
        assert_eq!(Page::new(vec![0; 10], 21, req).total_pages, 3);
        assert_eq!(Page::<u8>::new(vec![], 0, req).total_pages, 0);
        assert_eq!(Page::new(vec![0; 10], 20, req).total_pages, 2);
    }

    #[test]
    fn test_map_keeps_envelope() {
        let req = PageRequest::new(Some(2), Some(2)).unwrap();
        let page = Page::new(vec![1, 2], 5, req).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 5);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let q = ListQuery {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(q.search_term(), None);
        let q = ListQuery {
            search: Some(" Anu ".into()),
            ..Default::default()
        };
        assert_eq!(q.search_term(), Some("Anu"));
    }
}
