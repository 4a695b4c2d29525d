//! Forgiving pagination.
//!
//! Out-of-range page parameters are corrected, never rejected: a page below 1
//! becomes 1, and a page size outside `1..=100` becomes the default of 10.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// A clamped page request. Construct with [`PageRequest::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  page:      i64,
  page_size: i64,
}

impl Default for PageRequest {
  fn default() -> Self { Self { page: 1, page_size: DEFAULT_PAGE_SIZE } }
}

impl PageRequest {
  pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let page_size = page_size
      .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
      .unwrap_or(DEFAULT_PAGE_SIZE);
    Self { page, page_size }
  }

  pub fn page(&self) -> i64 { self.page }

  pub fn page_size(&self) -> i64 { self.page_size }

  /// Number of rows to skip. Saturates instead of overflowing for absurd
  /// page numbers.
  pub fn offset(&self) -> i64 { (self.page - 1).saturating_mul(self.page_size) }

  pub fn limit(&self) -> i64 { self.page_size }

  pub fn into_page<T>(self, total: u64, items: Vec<T>) -> Page<T> {
    Page { total, page: self.page, page_size: self.page_size, items }
  }
}

/// One page of a listing, with the total row count across all pages.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub total:     u64,
  pub page:      i64,
  pub page_size: i64,
  pub items:     Vec<T>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_when_absent() {
    let p = PageRequest::new(None, None);
    assert_eq!((p.page(), p.page_size()), (1, 10));
    assert_eq!(p.offset(), 0);
  }

  #[test]
  fn page_zero_behaves_as_page_one() {
    assert_eq!(PageRequest::new(Some(0), None), PageRequest::new(Some(1), None));
    assert_eq!(PageRequest::new(Some(-3), None).page(), 1);
  }

  #[test]
  fn out_of_range_sizes_fall_back_to_default() {
    assert_eq!(PageRequest::new(None, Some(500)).page_size(), 10);
    assert_eq!(PageRequest::new(None, Some(-5)).page_size(), 10);
    assert_eq!(PageRequest::new(None, Some(0)).page_size(), 10);
    assert_eq!(PageRequest::new(None, Some(100)).page_size(), 100);
    assert_eq!(PageRequest::new(None, Some(1)).page_size(), 1);
  }

  #[test]
  fn offset_advances_by_page_size() {
    let p = PageRequest::new(Some(3), Some(20));
    assert_eq!((p.offset(), p.limit()), (40, 20));
  }

  #[test]
  fn huge_page_does_not_overflow() {
    let p = PageRequest::new(Some(i64::MAX), Some(100));
    assert_eq!(p.offset(), i64::MAX);
  }
}
