//! Fault translation: the single place where failures become wire responses.
//!
//! Every response leaving the inner stack is inspected once:
//!
//! - a response carrying a [`Fault`] extension is rendered from that fault
//! - any other 4xx/5xx response (unmatched route, method not allowed, extractor
//!   rejection, timeout, panic) is classified from its status and body text
//! - everything else passes through untouched
//!
//! Each translated fault is reported to the injected [`FaultSink`] exactly once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::BoxError;
use axum::body::{Body, Bytes, HttpBody};
use cats_core::error::{INTERNAL_ERROR_CODE, INTERNAL_ERROR_MESSAGE};
use cats_core::{ErrorBody, Fault, ProtocolError, UnknownError};
use chrono::{SecondsFormat, Utc};
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::{Layer, Service};
use tracing::{error, warn};

use super::trace_id::TraceId;

/// Upper bound when buffering a raw error body for classification.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Request facts attached to every translated fault.
#[derive(Debug, Clone, Copy)]
pub struct FaultContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub trace_id: &'a str,
}

/// Destination for fault log events.
pub trait FaultSink: Send + Sync + 'static {
    fn record(&self, fault: &Fault, ctx: &FaultContext<'_>);
}

/// Default sink: business faults at WARN, everything else at ERROR.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FaultSink for TracingSink {
    fn record(&self, fault: &Fault, ctx: &FaultContext<'_>) {
        match fault {
            Fault::Business(err) => warn!(
                method = %ctx.method,
                path = ctx.path,
                trace_id = ctx.trace_id,
                business_code = err.business_code(),
                message = err.message(),
                "Business fault"
            ),
            Fault::Protocol(err) => error!(
                method = %ctx.method,
                path = ctx.path,
                trace_id = ctx.trace_id,
                status = err.status().as_u16(),
                code = %err.code(),
                error = %err,
                "Protocol fault"
            ),
            Fault::Unknown(err) => error!(
                method = %ctx.method,
                path = ctx.path,
                trace_id = ctx.trace_id,
                error = %err,
                debug = ?err.inner(),
                "Unhandled fault"
            ),
        }
    }
}

/// Tower layer translating faults into wire responses.
#[derive(Clone)]
pub struct ErrorTranslatorLayer {
    sink: Arc<dyn FaultSink>,
    expose_details: bool,
}

impl ErrorTranslatorLayer {
    /// `expose_details` puts the real message of internal failures into
    /// `details`; disable it in production.
    #[must_use]
    pub fn new(sink: Arc<dyn FaultSink>, expose_details: bool) -> Self {
        Self {
            sink,
            expose_details,
        }
    }
}

impl std::fmt::Debug for ErrorTranslatorLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTranslatorLayer")
            .field("expose_details", &self.expose_details)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for ErrorTranslatorLayer {
    type Service = ErrorTranslator<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorTranslator {
            inner,
            sink: Arc::clone(&self.sink),
            expose_details: self.expose_details,
        }
    }
}

/// Fault translation service.
#[derive(Clone)]
pub struct ErrorTranslator<S> {
    inner: S,
    sink: Arc<dyn FaultSink>,
    expose_details: bool,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ErrorTranslator<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
        let trace_id = TraceId::from_request(&req);
        let sink = Arc::clone(&self.sink);
        let expose_details = self.expose_details;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let (mut parts, body) = response.into_parts();

            let fault = match parts.extensions.remove::<Arc<Fault>>() {
                Some(fault) => fault,
                None if parts.status.is_client_error() || parts.status.is_server_error() => {
                    Arc::new(classify(parts.status, Body::new(body)).await)
                }
                None => return Ok(Response::from_parts(parts, Body::new(body))),
            };

            let ctx = FaultContext {
                method: &method,
                path: &path,
                trace_id: trace_id.as_str(),
            };
            sink.record(&fault, &ctx);

            let (status, payload) = render(&fault, &ctx, expose_details);
            parts.status = status;
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            Ok(Response::from_parts(parts, Body::from(payload.to_string())))
        })
    }
}

/// Fault for a raw framework response: 4xx is a protocol fault with the body
/// text as message, 5xx is an internal fault.
async fn classify(status: StatusCode, body: Body) -> Fault {
    let bytes = axum::body::to_bytes(body, MAX_ERROR_BODY_BYTES)
        .await
        .unwrap_or_default();
    let text = String::from_utf8_lossy(&bytes).trim().to_string();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| status.as_u16().to_string(), str::to_string)
    } else {
        text
    };

    if status.is_client_error() {
        ProtocolError::new(status, message).into()
    } else {
        UnknownError::msg(message).into()
    }
}

/// Status and JSON body for a fault.
#[must_use]
pub fn render(fault: &Fault, ctx: &FaultContext<'_>, expose_details: bool) -> (StatusCode, Value) {
    match fault {
        Fault::Business(err) => (StatusCode::OK, json!(err.to_envelope())),
        Fault::Protocol(err) => {
            let body = ErrorBody {
                code: err.code(),
                message: err.message().joined(),
                details: err.details().cloned(),
                trace_id: ctx.trace_id.to_string(),
                timestamp: timestamp(),
                path: ctx.path.to_string(),
            };
            (err.status(), json!(body))
        }
        Fault::Unknown(err) => {
            let body = ErrorBody {
                code: INTERNAL_ERROR_CODE.to_string(),
                message: INTERNAL_ERROR_MESSAGE.to_string(),
                details: expose_details.then(|| Value::String(err.message())),
                trace_id: ctx.trace_id.to_string(),
                timestamp: timestamp(),
                path: ctx.path.to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, json!(body))
        }
    }
}

/// ISO-8601 UTC timestamp with millisecond precision.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use cats_core::BusinessError;

    use super::*;

    fn ctx(method: &Method) -> FaultContext<'_> {
        FaultContext {
            method,
            path: "/cats/7",
            trace_id: "trace-1",
        }
    }

    #[test]
    fn business_fault_renders_envelope_at_200() {
        let fault = Fault::from(BusinessError::not_found().with_data(json!({"id": 7})));
        let (status, body) = render(&fault, &ctx(&Method::GET), true);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"data": {"id": 7}, "code": 404, "message": "Resource not found"})
        );
    }

    #[test]
    fn protocol_fault_renders_error_body() {
        let fault = Fault::from(ProtocolError::bad_request(vec![
            "a is required".to_string(),
            "b invalid".to_string(),
        ]));
        let (status, body) = render(&fault, &ctx(&Method::GET), true);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["message"], "a is required, b invalid");
        assert_eq!(body["traceId"], "trace-1");
        assert_eq!(body["path"], "/cats/7");
        assert!(body.get("details").is_none());
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn unknown_fault_details_follow_exposure_flag() {
        let fault = Fault::unknown(anyhow::anyhow!("pool timed out"));

        let (status, body) = render(&fault, &ctx(&Method::GET), true);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["message"], "An unexpected error occurred");
        assert_eq!(body["details"], "pool timed out");

        let (_, body) = render(&fault, &ctx(&Method::GET), false);
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn raw_client_error_becomes_protocol_fault() {
        let fault = classify(StatusCode::METHOD_NOT_ALLOWED, Body::empty()).await;
        let Fault::Protocol(err) = fault else {
            panic!("expected protocol fault");
        };
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.message().joined(), "Method Not Allowed");
    }

    #[tokio::test]
    async fn raw_server_error_becomes_unknown_fault() {
        let fault = classify(StatusCode::BAD_GATEWAY, Body::from("upstream closed")).await;
        let Fault::Unknown(err) = fault else {
            panic!("expected unknown fault");
        };
        assert_eq!(err.message(), "upstream closed");
    }
}
