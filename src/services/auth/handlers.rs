//! Auth HTTP handlers. All routes here are public.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use cats_core::Fault;
use cats_db::User;
use http::StatusCode;
use tracing::instrument;

use super::{AuthService, EmailQuery, LoginDto, RegisterDto, TokenResponse};
use crate::validation::{ValidJson, ValidQuery};

/// Routes under `/auth`.
pub fn router() -> Router<AuthService> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/email-captcha", get(email_captcha))
}

#[instrument(skip_all, fields(email = %dto.email))]
async fn register(
    State(service): State<AuthService>,
    ValidJson(dto): ValidJson<RegisterDto>,
) -> Result<(StatusCode, Json<User>), Fault> {
    let user = service.register(dto).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip_all, fields(email = %dto.email))]
async fn login(
    State(service): State<AuthService>,
    ValidJson(dto): ValidJson<LoginDto>,
) -> Result<Json<TokenResponse>, Fault> {
    Ok(Json(service.login(dto).await?))
}

#[instrument(skip_all, fields(email = %query.email))]
async fn email_captcha(
    State(service): State<AuthService>,
    ValidQuery(query): ValidQuery<EmailQuery>,
) -> Result<Json<()>, Fault> {
    service.send_email_captcha(&query.email).await?;
    Ok(Json(()))
}
