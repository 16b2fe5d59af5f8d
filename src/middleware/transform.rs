//! Success wrapping: 2xx JSON bodies leave the service inside the envelope.
//!
//! A body that is already an object with a `data` key passes through; any
//! other JSON value becomes `{data: <value>, code: 200, message: "success"}`.
//! A `201 Created` answer to a `POST` is sent as `200 OK`. Non-JSON bodies
//! (event streams, metrics text) are never buffered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::BoxError;
use axum::body::{Body, Bytes, HttpBody};
use axum::response::IntoResponse;
use cats_core::response::SUCCESS_MESSAGE;
use cats_core::{Fault, codes};
use http::{HeaderMap, Method, Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::{Layer, Service};

/// Upper bound when buffering a success body for wrapping.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Wrap a handler result in the success envelope unless it already is one.
#[must_use]
pub fn transform(value: Value) -> Value {
    if is_enveloped(&value) {
        return value;
    }
    json!({
        "data": value,
        "code": codes::SUCCESS,
        "message": SUCCESS_MESSAGE,
    })
}

fn is_enveloped(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.contains_key("data"))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Tower layer for success wrapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTransformLayer;

impl ResponseTransformLayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ResponseTransformLayer {
    type Service = ResponseTransform<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseTransform { inner }
    }
}

/// Success wrapping service.
#[derive(Debug, Clone)]
pub struct ResponseTransform<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ResponseTransform<S>
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
        let is_post = req.method() == Method::POST;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let (mut parts, body) = response.into_parts();

            if is_post && parts.status == StatusCode::CREATED {
                parts.status = StatusCode::OK;
            }

            let faulted = parts.extensions.get::<Arc<Fault>>().is_some();
            if faulted || !parts.status.is_success() || !is_json(&parts.headers) {
                return Ok(Response::from_parts(parts, Body::new(body)));
            }

            let bytes = match axum::body::to_bytes(Body::new(body), MAX_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) => return Ok(Fault::unknown(e).into_response()),
            };
            let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
                return Ok(Response::from_parts(parts, Body::from(bytes)));
            };

            parts.headers.remove(header::CONTENT_LENGTH);
            Ok(Response::from_parts(
                parts,
                Body::from(transform(value).to_string()),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::routing::{get, post};
    use axum::Json;
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn plain_values_are_wrapped() {
        assert_eq!(
            transform(json!({"id": 1})),
            json!({"data": {"id": 1}, "code": 200, "message": "success"})
        );
        assert_eq!(
            transform(json!("Hello World!")),
            json!({"data": "Hello World!", "code": 200, "message": "success"})
        );
        assert_eq!(
            transform(Value::Null),
            json!({"data": null, "code": 200, "message": "success"})
        );
    }

    #[test]
    fn enveloped_values_pass_through() {
        let envelope = json!({"data": [1, 2], "code": 200, "message": "success"});
        assert_eq!(transform(envelope.clone()), envelope);
        // Any object carrying `data` counts as enveloped.
        let custom = json!({"data": 1, "extra": true});
        assert_eq!(transform(custom.clone()), custom);
    }

    #[test]
    fn wrapping_is_idempotent() {
        let once = transform(json!([1, 2, 3]));
        assert_eq!(transform(once.clone()), once);
    }

    fn app() -> Router {
        Router::new()
            .route("/json", get(|| async { Json(json!({"name": "Luna"})) }))
            .route("/text", get(|| async { "OK" }))
            .route(
                "/created",
                post(|| async { (StatusCode::CREATED, Json(json!({"id": 1}))) }),
            )
            .layer(ResponseTransformLayer::new())
    }

    async fn body_of(response: Response<Body>) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn json_response_is_wrapped() {
        let response = app()
            .oneshot(Request::get("/json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(
            value,
            json!({"data": {"name": "Luna"}, "code": 200, "message": "success"})
        );
    }

    #[tokio::test]
    async fn text_response_is_untouched() {
        let response = app()
            .oneshot(Request::get("/text").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(&body_of(response).await[..], b"OK");
    }

    #[tokio::test]
    async fn post_created_becomes_ok() {
        let response = app()
            .oneshot(Request::post("/created").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let value: Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(value["data"]["id"], 1);
    }
}
