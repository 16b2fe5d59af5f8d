//! Fault taxonomy for request handling.
//!
//! Handlers return `Result<T, Fault>`. A [`Fault`] is one of three closed
//! variants: a business rule violation reported inside the envelope at HTTP 200,
//! a protocol failure reported at its own 4xx status, or an unclassified
//! internal failure reported as a 500 with internals hidden in production.
//!
//! Converting a fault into a response does not render the final body; the fault
//! is attached to the response extensions and the translator layer, which knows
//! the request path and trace id, writes the wire shape and logs it.

use std::fmt::{self, Display};
use std::sync::Arc;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::response::{ApiResponse, codes};

/// Public message used for every unclassified failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";
/// Symbolic code used for every unclassified failure.
pub const INTERNAL_ERROR_CODE: &str = "INTERNAL_SERVER_ERROR";

// =============================================================================
// Business errors
// =============================================================================

/// Expected domain rule violation, carried to the client at HTTP 200.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessError {
    business_code: i64,
    message: String,
    data: Option<Value>,
}

impl BusinessError {
    pub fn new(business_code: i64, message: impl Into<String>) -> Self {
        Self {
            business_code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured context for the client.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(codes::UNAUTHORIZED, "Unauthorized")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(codes::FORBIDDEN, "Forbidden")
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(codes::NOT_FOUND, "Resource not found")
    }

    /// Generic business failure with code `0`.
    #[must_use]
    pub fn error() -> Self {
        Self::new(codes::BUSINESS_ERROR, "Server error")
    }

    pub fn custom(business_code: i64, message: impl Into<String>) -> Self {
        Self::new(business_code, message)
    }

    /// Replace the message, keeping code and data.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub const fn business_code(&self) -> i64 {
        self.business_code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// The envelope written for this error.
    #[must_use]
    pub fn to_envelope(&self) -> ApiResponse<Value> {
        ApiResponse::custom(self.data.clone(), self.business_code, self.message.clone())
    }
}

impl Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "business error {}: {}", self.business_code, self.message)
    }
}

impl std::error::Error for BusinessError {}

// =============================================================================
// Protocol errors
// =============================================================================

/// Message of a protocol error: a single string or a list of violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    /// Wire form: lists are joined with `", "`.
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            Self::Single(message) => message.clone(),
            Self::Many(messages) => messages.join(", "),
        }
    }
}

impl From<String> for ErrorMessage {
    fn from(message: String) -> Self {
        Self::Single(message)
    }
}

impl From<&str> for ErrorMessage {
    fn from(message: &str) -> Self {
        Self::Single(message.to_string())
    }
}

impl From<Vec<String>> for ErrorMessage {
    fn from(messages: Vec<String>) -> Self {
        Self::Many(messages)
    }
}

/// Malformed, unauthenticated or otherwise rejected request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolError {
    status: StatusCode,
    code: Option<String>,
    message: ErrorMessage,
    details: Option<Value>,
}

impl ProtocolError {
    pub fn new(status: StatusCode, message: impl Into<ErrorMessage>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<ErrorMessage>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<ErrorMessage>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<ErrorMessage>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<ErrorMessage>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn service_unavailable(message: impl Into<ErrorMessage>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Override the symbolic code (defaults to the status name).
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Explicit symbolic code, or the canonical name of the status.
    #[must_use]
    pub fn code(&self) -> String {
        self.code
            .clone()
            .unwrap_or_else(|| status_name(self.status))
    }

    #[must_use]
    pub const fn message(&self) -> &ErrorMessage {
        &self.message
    }

    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message.joined())
    }
}

impl std::error::Error for ProtocolError {}

/// Canonical symbolic name of a status: `404` -> `NOT_FOUND`.
#[must_use]
pub fn status_name(status: StatusCode) -> String {
    status.canonical_reason().map_or_else(
        || status.as_u16().to_string(),
        |reason| {
            reason
                .chars()
                .filter_map(|c| match c {
                    ' ' | '-' => Some('_'),
                    '\'' => None,
                    c => Some(c.to_ascii_uppercase()),
                })
                .collect()
        },
    )
}

// =============================================================================
// Unclassified errors
// =============================================================================

/// Any failure the request pipeline did not anticipate.
#[derive(Debug)]
pub struct UnknownError(anyhow::Error);

impl UnknownError {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(error.into())
    }

    pub fn msg(message: impl Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self(anyhow::Error::msg(message))
    }

    /// The real failure message including its cause chain.
    #[must_use]
    pub fn message(&self) -> String {
        format!("{:#}", self.0)
    }

    #[must_use]
    pub const fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl Display for UnknownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

// =============================================================================
// Fault
// =============================================================================

/// Whatever a handler raised.
#[derive(Debug)]
pub enum Fault {
    Business(BusinessError),
    Protocol(ProtocolError),
    Unknown(UnknownError),
}

impl Fault {
    /// Transport status this fault is written with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Business(_) => StatusCode::OK,
            Self::Protocol(err) => err.status(),
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal failure from anything convertible into `anyhow::Error`.
    pub fn unknown(error: impl Into<anyhow::Error>) -> Self {
        Self::Unknown(UnknownError::new(error))
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Business(err) => err.fmt(f),
            Self::Protocol(err) => err.fmt(f),
            Self::Unknown(err) => err.fmt(f),
        }
    }
}

impl From<BusinessError> for Fault {
    fn from(err: BusinessError) -> Self {
        Self::Business(err)
    }
}

impl From<ProtocolError> for Fault {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<UnknownError> for Fault {
    fn from(err: UnknownError) -> Self {
        Self::Unknown(err)
    }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        Self::Unknown(UnknownError(err))
    }
}

impl IntoResponse for Fault {
    /// Writes a context-free body and hands the fault to the translator via
    /// the response extensions.
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = match &self {
            Self::Business(err) => Json(err.to_envelope()).into_response(),
            Self::Protocol(err) => (
                status,
                Json(serde_json::json!({"code": err.code(), "message": err.message().joined()})),
            )
                .into_response(),
            Self::Unknown(_) => (
                status,
                Json(serde_json::json!({
                    "code": INTERNAL_ERROR_CODE,
                    "message": INTERNAL_ERROR_MESSAGE,
                })),
            )
                .into_response(),
        };
        response.extensions_mut().insert(Arc::new(self));
        response
    }
}

/// Wire shape of protocol and internal failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub trace_id: String,
    pub timestamp: String,
    pub path: String,
}

/// Extension trait turning foreign errors into internal faults with context.
pub trait FaultExt<T> {
    /// Map the error to [`Fault::Unknown`], prefixing `context`.
    fn or_unknown(self, context: &'static str) -> Result<T, Fault>;
}

impl<T, E> FaultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn or_unknown(self, context: &'static str) -> Result<T, Fault> {
        self.map_err(|e| Fault::unknown(anyhow::Error::new(e).context(context)))
    }
}
