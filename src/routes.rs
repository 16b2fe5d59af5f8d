//! Router assembly, health checks and the unmatched-route fallback.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use cats_core::{Fault, ProtocolError};
use http::{Method, Uri};
use serde::Serialize;

use crate::services::{ai, auth, cats};
use crate::startup::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    cats: CheckResult,
    users: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl CheckResult {
    fn from_health(healthy: bool, failure: &str) -> Self {
        if healthy {
            Self {
                status: "healthy",
                message: None,
            }
        } else {
            Self {
                status: "unhealthy",
                message: Some(failure.to_string()),
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Build version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every route of the service. Layers are applied by the caller.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Json("Hello World!") }))
        .route("/health", get(|| async { "OK" }))
        .route("/health/live", get(|| async { "OK" }))
        .route("/health/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone())
        .merge(cats::router().with_state(state.cats))
        .merge(auth::router().with_state(state.auth))
        .merge(ai::router().with_state(state.ai))
}

/// Fallback for requests no route matched.
pub async fn not_found(method: Method, uri: Uri) -> Fault {
    ProtocolError::not_found(format!("Cannot {method} {}", uri.path())).into()
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

async fn readiness_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (cats, users) = tokio::join!(state.cats.health_check(), state.auth.health_check());
    let cats = CheckResult::from_health(cats, "Cat store unavailable");
    let users = CheckResult::from_health(users, "User store unavailable");

    let healthy = cats.is_healthy() && users.is_healthy();

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: VERSION,
        checks: HealthChecks { cats, users },
    })
}
