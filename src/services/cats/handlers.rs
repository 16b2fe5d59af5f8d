//! Cats HTTP handlers.
//!
//! Thin handlers that delegate to [`CatService`]. The role guard is the first
//! extractor, so a caller without the role gets the business 403 before the
//! body or query is parsed. Results are returned bare and wrapped into the
//! envelope by the transform layer.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use cats_core::{ApiResponse, Authorized, Fault, Page, Pagination, RoleSet};
use cats_db::{Cat, roles};
use http::StatusCode;
use serde_json::{Value, json};
use tracing::instrument;

use super::{CatService, CreateCatDto, UpdateCatDto};
use crate::validation::{ValidJson, ValidQuery};

/// Roles allowed to read cats.
#[derive(Debug, Clone, Copy)]
struct Readers;

impl RoleSet for Readers {
    const ROLES: &'static [&'static str] = &[roles::USER, roles::SUPER_ADMIN];
}

/// Roles allowed to change cats.
#[derive(Debug, Clone, Copy)]
struct Writers;

impl RoleSet for Writers {
    const ROLES: &'static [&'static str] = &[roles::SUPER_ADMIN];
}

/// Routes under `/cats`.
pub fn router() -> Router<CatService> {
    Router::new()
        .route("/cats", get(find_all).post(create))
        .route("/cats/{id}", get(find_one).patch(update).delete(remove))
}

#[instrument(skip_all, fields(user_id = user.id))]
async fn find_all(
    State(service): State<CatService>,
    Authorized { user, .. }: Authorized<Readers>,
    ValidQuery(pagination): ValidQuery<Pagination>,
) -> Result<Json<ApiResponse<Page<Cat>>>, Fault> {
    Ok(Json(service.list(pagination).await?))
}

#[instrument(skip(service, user), fields(user_id = user.id))]
async fn find_one(
    State(service): State<CatService>,
    Authorized { user, .. }: Authorized<Readers>,
    Path(id): Path<i32>,
) -> Result<Json<Cat>, Fault> {
    Ok(Json(service.find(id).await?))
}

#[instrument(skip_all, fields(user_id = user.id))]
async fn create(
    State(service): State<CatService>,
    Authorized { user, .. }: Authorized<Writers>,
    ValidJson(dto): ValidJson<CreateCatDto>,
) -> Result<(StatusCode, Json<Cat>), Fault> {
    let cat = service.create(dto, &user).await?;
    Ok((StatusCode::CREATED, Json(cat)))
}

#[instrument(skip(service, user, dto), fields(user_id = user.id))]
async fn update(
    State(service): State<CatService>,
    Authorized { user, .. }: Authorized<Writers>,
    Path(id): Path<i32>,
    ValidJson(dto): ValidJson<UpdateCatDto>,
) -> Result<Json<Cat>, Fault> {
    Ok(Json(service.update(id, dto).await?))
}

#[instrument(skip(service, user), fields(user_id = user.id))]
async fn remove(
    State(service): State<CatService>,
    Authorized { user, .. }: Authorized<Writers>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, Fault> {
    service.remove(id).await?;
    Ok(Json(json!({ "message": format!("Cat with ID {id} has been removed") })))
}
