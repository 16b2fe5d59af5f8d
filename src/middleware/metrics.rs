//! Request metrics middleware.
//!
//! # Metrics Emitted
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `http_requests_total` | Counter | `method`, `path`, `status` | Total request count |
//! | `http_request_duration_seconds` | Histogram | `method`, `path`, `status` | Request latency |
//!
//! `path` is the route template (`/cats/{id}`); unknown paths are bucketed as
//! `/*` to keep label cardinality bounded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{Request, Response};
use tower::{Layer, Service};

/// Route templates used as metric labels.
const KNOWN_ROUTES: &[&str] = &[
    "/",
    "/health",
    "/health/live",
    "/health/ready",
    "/metrics",
    "/auth/register",
    "/auth/login",
    "/auth/email-captcha",
    "/cats",
    "/cats/{id}",
    "/ai/chat",
    "/ai/chat/template",
    "/ai/chat/stream",
    "/ai/summarize",
    "/ai/translate",
    "/ai/explain-code",
];

/// Tower layer for request metrics collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl MetricsLayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner }
    }
}

/// Metrics middleware service.
#[derive(Debug, Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsMiddleware<S>
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

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().to_string();
        let path = normalize_path(req.uri().path());
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let duration = start.elapsed().as_secs_f64();
            let labels = [
                ("method", method),
                ("path", path),
                ("status", response.status().as_u16().to_string()),
            ];

            metrics::counter!("http_requests_total", &labels).increment(1);
            metrics::histogram!("http_request_duration_seconds", &labels).record(duration);

            Ok(response)
        })
    }
}

/// Replace numeric segments with `{id}` and bucket unknown routes as `/*`.
fn normalize_path(path: &str) -> String {
    let template = path
        .split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    if KNOWN_ROUTES.contains(&template.as_str()) {
        template
    } else {
        "/*".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_routes_pass_through() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/cats"), "/cats");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn numeric_segments_become_templates() {
        assert_eq!(normalize_path("/cats/42"), "/cats/{id}");
    }

    #[test]
    fn unknown_routes_bucketed() {
        assert_eq!(normalize_path("/cats/abc"), "/*");
        assert_eq!(normalize_path("/unknown/route"), "/*");
        assert_eq!(normalize_path("/dogs/1"), "/*");
    }
}
