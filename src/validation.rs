//! Validating extractors.
//!
//! Every extractor rejection becomes a protocol 400 carrying the rejection
//! text, whatever status axum picked for it (422 for a wrong-typed or missing
//! field, 415 for a missing content type). Then the payload's [`Validate`]
//! rules run.

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::Json;
use cats_core::{Fault, ProtocolError, Validate};
use http::request::Parts;
use serde::de::DeserializeOwned;

/// JSON body that passed validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = Fault;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ProtocolError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string that passed validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = Fault;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ProtocolError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use cats_core::{ErrorMessage, Violations};
    use http::StatusCode;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    impl Validate for Named {
        fn validate(&self) -> Result<(), ProtocolError> {
            let mut v = Violations::new();
            v.required_text("name", &self.name, 10);
            v.finish()
        }
    }

    fn json_request(body: &'static str) -> Request {
        http::Request::post("/")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_body_is_extracted() {
        let ValidJson(named) = ValidJson::<Named>::from_request(json_request(r#"{"name":"Tom"}"#), &())
            .await
            .unwrap();
        assert_eq!(named.name, "Tom");
    }

    #[tokio::test]
    async fn rule_violation_is_bad_request() {
        let fault = ValidJson::<Named>::from_request(json_request(r#"{"name":""}"#), &())
            .await
            .unwrap_err();
        let Fault::Protocol(err) = fault else {
            panic!("expected protocol fault");
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.message(),
            &ErrorMessage::Many(vec!["name should not be empty".to_string()])
        );
    }

    async fn rejection_status(req: Request) -> StatusCode {
        match ValidJson::<Named>::from_request(req, &()).await {
            Err(Fault::Protocol(err)) => err.status(),
            other => panic!("expected protocol fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        assert_eq!(rejection_status(json_request("{")).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_type_and_missing_field_are_bad_request() {
        assert_eq!(
            rejection_status(json_request(r#"{"name":3}"#)).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(rejection_status(json_request("{}")).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_content_type_is_bad_request() {
        let req = http::Request::post("/")
            .body(Body::from(r#"{"name":"Tom"}"#))
            .unwrap();
        assert_eq!(rejection_status(req).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unparsable_query_is_bad_request() {
        #[derive(Debug, Deserialize)]
        struct Paged {
            #[allow(dead_code)]
            page: i64,
        }
        impl Validate for Paged {
            fn validate(&self) -> Result<(), ProtocolError> {
                Ok(())
            }
        }

        let (mut parts, ()) = http::Request::get("/?page=two").body(()).unwrap().into_parts();
        let fault = ValidQuery::<Paged>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(fault, Fault::Protocol(err) if err.status() == StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn query_is_validated() {
        let (mut parts, ()) = http::Request::get("/?name=").body(()).unwrap().into_parts();
        let fault = ValidQuery::<Named>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(fault, Fault::Protocol(_)));
    }
}
