//! Page-number pagination query.

use serde::Deserialize;

use crate::error::ProtocolError;
use crate::validation::{Validate, Violations};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// `?page=&pageSize=` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: i64::from(DEFAULT_PAGE),
            page_size: i64::from(DEFAULT_PAGE_SIZE),
        }
    }
}

impl Pagination {
    /// Rows to skip. Only meaningful after validation.
    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl Validate for Pagination {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.range("page", self.page, 1, i64::from(u32::MAX))
            .range("pageSize", self.page_size, 1, i64::from(MAX_PAGE_SIZE));
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let p: Pagination = serde_json::from_str(r#"{"page": 3}"#).unwrap();
        assert_eq!(p.page, 3);
        assert_eq!(p.page_size, 10);
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn bounds_are_enforced() {
        assert!(Pagination { page: 0, page_size: 10 }.validate().is_err());
        assert!(Pagination { page: 1, page_size: 101 }.validate().is_err());
        assert!(Pagination { page: 1, page_size: 100 }.validate().is_ok());
    }
}
