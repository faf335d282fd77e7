use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, Result};

/// A 1-indexed page request. Only [`PageRequest::new`] builds one, so both fields are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page == 0 {
            return Err(ParleyError::InvalidInput("page starts at 1".to_string()));
        }
        if page_size == 0 {
            return Err(ParleyError::InvalidInput("page size must be positive".to_string()));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    /// Cuts this page out of an already ordered collection.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let items = items
            .into_iter()
            .skip(offset)
            .take(self.page_size as usize)
            .collect();
        Page::new(items, total, *self)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, page_size: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub page_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let page_count = total.div_ceil(u64::from(request.page_size));
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            page_count,
            has_next: u64::from(request.page) < page_count,
            has_previous: request.page > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            page_count: self.page_count,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_len(total: u64, size: u32, page: u32) -> usize {
        let remaining = total as i64 - i64::from(page - 1) * i64::from(size);
        remaining.clamp(0, i64::from(size)) as usize
    }

    #[test]
    fn zero_page_or_size_is_rejected() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
    }

    #[test]
    fn offset_starts_at_zero_and_never_wraps() {
        let request = PageRequest::new(3, 25).unwrap();
        assert_eq!((request.page(), request.page_size()), (3, 25));
        assert_eq!(request.offset(), 50);
        assert_eq!(PageRequest::default().offset(), 0);

        let malformed = PageRequest { page: 0, page_size: 10 };
        assert_eq!(malformed.offset(), 0);
    }

    #[test]
    fn item_count_and_page_count_follow_the_contract() {
        for total in [0u64, 1, 9, 10, 11, 25] {
            for size in [1u32, 3, 10] {
                for page in 1u32..=5 {
                    let request = PageRequest::new(page, size).unwrap();
                    let result = request.slice((0..total).collect::<Vec<_>>());
                    assert_eq!(result.items.len(), expected_len(total, size, page));
                    assert_eq!(result.page_count, total.div_ceil(u64::from(size)));
                    assert_eq!(result.total, total);
                }
            }
        }
    }

    #[test]
    fn navigation_flags() {
        let first = PageRequest::new(1, 10).unwrap().slice((0..25).collect::<Vec<_>>());
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.items.first(), Some(&0));

        let last = PageRequest::new(3, 10).unwrap().slice((0..25).collect::<Vec<_>>());
        assert!(!last.has_next);
        assert!(last.has_previous);
        assert_eq!(last.items, vec![20, 21, 22, 23, 24]);

        let empty: Page<u8> = PageRequest::default().slice(Vec::new());
        assert_eq!(empty.page_count, 0);
        assert!(!empty.has_next);
    }
}
