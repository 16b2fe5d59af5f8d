//! Uniform `{data, code, message}` response envelope.
//!
//! Every successful response and every business failure is written in this
//! shape. Protocol and internal failures use [`crate::error::ErrorBody`] instead.

use serde::{Deserialize, Serialize};

/// Reserved envelope codes. Business errors may use any other integer.
pub mod codes {
    pub const SUCCESS: i64 = 200;
    pub const BUSINESS_ERROR: i64 = 0;
    pub const BAD_REQUEST: i64 = 400;
    pub const UNAUTHORIZED: i64 = 401;
    pub const FORBIDDEN: i64 = 403;
    pub const NOT_FOUND: i64 = 404;
}

/// Default message attached to successful envelopes.
pub const SUCCESS_MESSAGE: &str = "success";
/// Default message attached to generic error envelopes.
pub const ERROR_MESSAGE: &str = "error";

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub code: i64,
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Successful envelope with the default `"success"` message.
    pub fn success(data: T) -> Self {
        Self::success_with(data, SUCCESS_MESSAGE)
    }

    pub fn success_with(data: T, message: impl Into<String>) -> Self {
        Self::custom(Some(data), codes::SUCCESS, message)
    }

    /// Envelope with an arbitrary code and message.
    pub fn custom(data: Option<T>, code: i64, message: impl Into<String>) -> Self {
        Self {
            data,
            code,
            message: message.into(),
        }
    }

    /// Generic error envelope: code `0`, message `"error"`.
    pub fn error(data: Option<T>) -> Self {
        Self::custom(data, codes::BUSINESS_ERROR, ERROR_MESSAGE)
    }

    pub fn error_with(data: Option<T>, code: i64, message: impl Into<String>) -> Self {
        Self::custom(data, code, message)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == codes::SUCCESS
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub list: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl<T> ApiResponse<Page<T>> {
    /// Successful envelope around one page of results.
    pub fn paginated(list: Vec<T>, page: u32, page_size: u32, total: u64) -> Self {
        Self::success(Page {
            list,
            page,
            page_size,
            total,
        })
    }
}
