//! JWT authentication middleware.
//!
//! Validates Bearer tokens and injects [`AuthUser`] into request extensions.
//! Failures are raised as protocol faults so the translator renders them.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::IntoResponse;
use cats_core::{AuthUser, Fault, JwtError, JwtValidator, ProtocolError};
use http::{HeaderValue, Request, Response, header};
use phf::phf_set;
use tower::{Layer, Service};
use tracing::{Span, debug};

/// Routes that bypass authentication.
static PUBLIC_ROUTES: phf::Set<&'static str> = phf_set! {
    "/",
    "/health",
    "/health/live",
    "/health/ready",
    "/metrics",
    "/auth/register",
    "/auth/login",
    "/auth/email-captcha",
};

/// Tower layer for JWT authentication.
#[derive(Debug, Clone)]
pub struct AuthLayer {
    validator: JwtValidator,
}

impl AuthLayer {
    #[must_use]
    pub const fn new(validator: JwtValidator) -> Self {
        Self { validator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            validator: self.validator.clone(),
        }
    }
}

/// Authentication middleware service.
#[derive(Debug, Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    validator: JwtValidator,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AuthMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if req.method() == http::Method::OPTIONS || PUBLIC_ROUTES.contains(req.uri().path()) {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        }

        match self.authenticate(&req) {
            Ok(user) => {
                Span::current().record("user_id", user.id);
                debug!(user_id = user.id, roles = ?user.roles, "Authenticated");
                req.extensions_mut().insert(user);
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Err(err) => Box::pin(async move { Ok(unauthorized(&err)) }),
        }
    }
}

impl<S> AuthMiddleware<S> {
    const BEARER_PREFIX: &str = "Bearer ";

    fn authenticate<T>(&self, req: &Request<T>) -> Result<AuthUser, JwtError> {
        let header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(JwtError::MissingHeader)?;

        let token = header
            .strip_prefix(Self::BEARER_PREFIX)
            .or_else(|| header.strip_prefix("bearer "))
            .filter(|t| !t.is_empty())
            .ok_or(JwtError::InvalidFormat)?;

        self.validator.validate(token)
    }
}

fn unauthorized(err: &JwtError) -> Response<Body> {
    let mut response = Fault::from(ProtocolError::unauthorized(err.to_string())).into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::routing::get;
    use cats_core::JwtSubject;
    use http::StatusCode;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;

    struct Subject;

    impl JwtSubject for Subject {
        fn user_id(&self) -> i32 {
            42
        }
        fn email(&self) -> &str {
            "tom@example.com"
        }
        fn username(&self) -> &str {
            "tom"
        }
        fn roles(&self) -> &[String] {
            &[]
        }
    }

    fn validator() -> JwtValidator {
        JwtValidator::new(&SecretString::from("test_secret_key_minimum_32_chars!"))
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "public" }))
            .route("/me", get(|user: AuthUser| async move { user.id.to_string() }))
            .route_layer(AuthLayer::new(validator()))
    }

    #[test]
    fn public_routes() {
        assert!(PUBLIC_ROUTES.contains("/health/ready"));
        assert!(PUBLIC_ROUTES.contains("/auth/login"));
        assert!(!PUBLIC_ROUTES.contains("/cats"));
        assert!(!PUBLIC_ROUTES.contains("/ai/chat"));
    }

    #[tokio::test]
    async fn public_route_skips_auth() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_protocol_fault() {
        let response = app()
            .oneshot(Request::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let fault = response.extensions().get::<Arc<Fault>>().unwrap();
        assert!(matches!(fault.as_ref(), Fault::Protocol(_)));
    }

    #[tokio::test]
    async fn valid_token_injects_user() {
        let token = validator().generate_access_token(&Subject, 5).unwrap();
        let response = app()
            .oneshot(
                Request::get("/me")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"42");
    }
}
