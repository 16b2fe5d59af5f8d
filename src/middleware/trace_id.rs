//! Trace id middleware: one correlation id per request.
//!
//! The inbound `x-trace-id` header is reused when it is a short visible-ASCII
//! token; otherwise a UUID v4 is generated. The id is stored in the request
//! extensions and echoed as a response header.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{HeaderValue, Request, Response};
use tower::{Layer, Service};
use uuid::Uuid;

/// Header name for trace id propagation.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Maximum accepted length of an inbound trace id.
const MAX_TRACE_ID_LENGTH: usize = 128;

/// Trace id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(Arc<str>);

impl TraceId {
    /// Generate a new random trace id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    /// Accept an inbound value if it is non-empty, at most 128 bytes and
    /// made only of visible ASCII.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let valid = !value.is_empty()
            && value.len() <= MAX_TRACE_ID_LENGTH
            && value.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| Self(value.into()))
    }

    /// The id carried by `req`, or a fresh one.
    pub fn from_request<T>(req: &Request<T>) -> Self {
        req.extensions().get::<Self>().cloned().unwrap_or_else(|| {
            req.headers()
                .get(TRACE_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(Self::parse)
                .unwrap_or_else(Self::generate)
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tower layer for trace id propagation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceIdLayer;

impl TraceIdLayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TraceIdLayer {
    type Service = TraceIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceIdMiddleware { inner }
    }
}

/// Trace id middleware service.
#[derive(Debug, Clone)]
pub struct TraceIdMiddleware<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TraceIdMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let trace_id = TraceId::from_request(&req);
        req.extensions_mut().insert(trace_id.clone());

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
                response.headers_mut().insert(TRACE_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TraceId::generate(), TraceId::generate());
    }

    #[test]
    fn inbound_ids_are_validated() {
        assert_eq!(TraceId::parse("abc-123").unwrap().as_str(), "abc-123");
        assert!(TraceId::parse("").is_none());
        assert!(TraceId::parse("has space").is_none());
        assert!(TraceId::parse(&"x".repeat(129)).is_none());
        assert!(TraceId::parse(&"x".repeat(128)).is_some());
    }

    #[test]
    fn header_is_reused() {
        let req = Request::builder()
            .header(TRACE_ID_HEADER, "client-trace")
            .body(())
            .unwrap();
        assert_eq!(TraceId::from_request(&req).as_str(), "client-trace");
    }

    #[test]
    fn extension_takes_precedence() {
        let mut req = Request::builder()
            .header(TRACE_ID_HEADER, "from-header")
            .body(())
            .unwrap();
        let id = TraceId::generate();
        req.extensions_mut().insert(id.clone());
        assert_eq!(TraceId::from_request(&req), id);
    }
}
