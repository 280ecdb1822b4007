//! Pagination over already-materialized result sets.

use serde::{Deserialize, Serialize};

use crate::ValidationError;

pub const DEFAULT_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page window. Applied to a full result set after it has been
/// read (or served from cache), so it never takes part in cache keys.
///
/// Deserialization goes through [`PageRequest::new`], so a decoded value
/// obeys the same bounds as a constructed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PageParts")]
pub struct PageRequest {
    page_number: u32,
    page_size: u32,
}

#[derive(Deserialize)]
struct PageParts {
    page_number: Option<i64>,
    page_size: Option<i64>,
}

impl TryFrom<PageParts> for PageRequest {
    type Error = ValidationError;

    fn try_from(parts: PageParts) -> Result<Self, Self::Error> {
        Self::new(parts.page_number, parts.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Build a page request, filling in defaults for missing values.
    pub fn new(page_number: Option<i64>, page_size: Option<i64>) -> Result<Self, ValidationError> {
        let page_number = page_number.unwrap_or(1);
        let page_size = page_size.unwrap_or(i64::from(DEFAULT_PAGE_SIZE));

        if page_number < 1 || page_number > i64::from(u32::MAX) {
            return Err(ValidationError::OutOfRange {
                field: "pageNumber".to_string(),
                value: page_number,
                min: 1,
                max: i64::from(u32::MAX),
            });
        }
        if page_size < 1 || page_size > i64::from(MAX_PAGE_SIZE) {
            return Err(ValidationError::OutOfRange {
                field: "pageSize".to_string(),
                value: page_size,
                min: 1,
                max: i64::from(MAX_PAGE_SIZE),
            });
        }

        Ok(Self {
            page_number: page_number as u32,
            page_size: page_size as u32,
        })
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn offset(&self) -> usize {
        (self.page_number.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }

    /// Slice one page out of `items`. Pages past the end are empty.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let page = PageRequest::new(None, None).expect("defaults are valid");
        assert_eq!(page, PageRequest::default());
        assert_eq!(page.page_number(), 1);
        assert_eq!(page.page_size(), 5);
    }

    #[test]
    fn test_apply_windows() {
        let items: Vec<u32> = (1..=12).collect();

        let first = PageRequest::new(Some(1), Some(5)).expect("valid");
        assert_eq!(first.apply(&items), vec![1, 2, 3, 4, 5]);

        let last = PageRequest::new(Some(3), Some(5)).expect("valid");
        assert_eq!(last.apply(&items), vec![11, 12]);

        let beyond = PageRequest::new(Some(4), Some(5)).expect("valid");
        assert!(beyond.apply(&items).is_empty());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(PageRequest::new(Some(0), None).is_err());
        assert!(PageRequest::new(Some(-3), None).is_err());
        assert!(PageRequest::new(None, Some(0)).is_err());
        assert!(PageRequest::new(None, Some(101)).is_err());
    }

    #[test]
    fn test_deserialize_validates() -> Result<(), serde_json::Error> {
        let page: PageRequest = serde_json::from_str(r#"{"page_number":2,"page_size":10}"#)?;
        assert_eq!(page, PageRequest::new(Some(2), Some(10)).expect("valid"));

        let defaults: PageRequest = serde_json::from_str("{}")?;
        assert_eq!(defaults, PageRequest::default());

        assert!(serde_json::from_str::<PageRequest>(r#"{"page_number":0,"page_size":5}"#).is_err());
        assert!(serde_json::from_str::<PageRequest>(r#"{"page_number":1,"page_size":0}"#).is_err());
        Ok(())
    }
}
