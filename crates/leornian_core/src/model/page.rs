//! Pagination envelope with graceful out-of-range handling.
//!
//! A requested page past the end resolves to the last page instead of
//! failing; non-positive page numbers are rejected.

use crate::model::validation::ValidationError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served.
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

/// Resolved page window for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total: u64,
}

impl PageWindow {
    /// Resolves `requested` (defaults to 1) against `total` rows.
    ///
    /// An empty result set still has one (empty) page.
    pub fn resolve(requested: Option<i64>, total: u64, per_page: u32) -> Result<Self, ValidationError> {
        let per_page = per_page.max(1);
        let requested = requested.unwrap_or(1);
        if requested < 1 {
            return Err(ValidationError::new(
                "page",
                "That page number is less than 1.",
            ));
        }
        let num_pages = u32::try_from(total.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);
        let number = u32::try_from(requested).unwrap_or(u32::MAX).min(num_pages);
        Ok(Self {
            number,
            num_pages,
            per_page,
            total,
        })
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.per_page)
    }

    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PageWindow;

    #[test]
    fn page_past_the_end_serves_last_page() {
        let window = PageWindow::resolve(Some(7), 25, 10).unwrap();
        assert_eq!(window.number, 3);
        assert_eq!(window.num_pages, 3);
        assert_eq!(window.offset(), 20);
    }

    #[test]
    fn empty_result_has_one_page() {
        let window = PageWindow::resolve(Some(2), 0, 10).unwrap();
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.offset(), 0);
    }

    #[test]
    fn non_positive_page_is_rejected() {
        assert!(PageWindow::resolve(Some(0), 5, 10).is_err());
        assert!(PageWindow::resolve(Some(-1), 5, 10).is_err());
        assert_eq!(PageWindow::resolve(None, 5, 10).unwrap().number, 1);
    }
}
