//! crates/marketplace_core/src/page.rs
//!
//! Offset pagination shared by every list operation.

use crate::error::ServiceError;

/// A validated `(limit, offset)` window plus the 1-indexed page it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
    pub page: i64,
}

impl Page {
    pub const DEFAULT_SIZE: i64 = 10;
    pub const MAX_SIZE: i64 = 100;

    /// Builds a window from the `size` and `page` query parameters.
    ///
    /// Missing values fall back to `size=10`, `page=1`. `size` outside `1..=100`
    /// or `page < 1` is rejected.
    pub fn new(size: Option<i64>, page: Option<i64>) -> Result<Self, ServiceError> {
        let size = size.unwrap_or(Self::DEFAULT_SIZE);
        let page = page.unwrap_or(1);

        if !(1..=Self::MAX_SIZE).contains(&size) {
            return Err(ServiceError::InvalidRequest(format!(
                "size must be between 1 and {}",
                Self::MAX_SIZE
            )));
        }
        if page < 1 {
            return Err(ServiceError::InvalidRequest(
                "page must be 1 or greater".to_string(),
            ));
        }

        Ok(Self {
            limit: size,
            offset: (page - 1) * size,
            page,
        })
    }

    /// Cuts this window out of rows that are already in listing order.
    pub fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_SIZE,
            offset: 0,
            page: 1,
        }
    }
}
