//! Cats resource.
//!
//! Organized by concern:
//! - `mod.rs` - `CatService` and the business rules
//! - `dto.rs` - request payloads and their validation
//! - `handlers.rs` - axum handlers and role guards

mod dto;
mod handlers;

use std::sync::Arc;

use cats_core::{ApiResponse, AuthUser, BusinessError, Fault, Page, Pagination};
use cats_db::{Cat, CatRepository, DbError};
use serde_json::json;
use tracing::{debug, info};

pub use dto::{CreateCatDto, UpdateCatDto};
pub use handlers::router;

/// Youngest accepted age.
pub const MIN_AGE: i32 = 0;
/// Oldest accepted age.
pub const MAX_AGE: i32 = 30;

/// Cat business rules over a [`CatRepository`].
#[derive(Clone)]
pub struct CatService {
    repo: Arc<dyn CatRepository>,
}

impl std::fmt::Debug for CatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatService").finish_non_exhaustive()
    }
}

impl CatService {
    #[must_use]
    pub fn new(repo: Arc<dyn CatRepository>) -> Self {
        Self { repo }
    }

    /// One page of cats ordered by id.
    pub async fn list(&self, pagination: Pagination) -> Result<ApiResponse<Page<Cat>>, Fault> {
        let total = self.repo.count().await?;
        let list = self
            .repo
            .list(pagination.offset(), pagination.limit())
            .await?;

        debug!(page = pagination.page, returned = list.len(), total, "Listed cats");

        Ok(ApiResponse::paginated(
            list,
            u32::try_from(pagination.page).unwrap_or(u32::MAX),
            u32::try_from(pagination.page_size).unwrap_or(u32::MAX),
            total,
        ))
    }

    pub async fn find(&self, id: i32) -> Result<Cat, Fault> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Create a cat, recording who created it in the internal notes.
    pub async fn create(&self, dto: CreateCatDto, user: &AuthUser) -> Result<Cat, Fault> {
        check_age(dto.age)?;
        let name = dto.name.trim().to_string();
        self.ensure_unique_name(&name, None).await?;

        let notes = format!("Created by {} (user {})", user.username, user.id);
        let cat = self
            .repo
            .create(dto.into_new_cat(notes))
            .await
            .map_err(|e| name_conflict(e, &name))?;

        info!(cat_id = cat.id, user_id = user.id, "Cat created");
        Ok(cat)
    }

    pub async fn update(&self, id: i32, dto: UpdateCatDto) -> Result<Cat, Fault> {
        if let Some(age) = dto.age {
            check_age(age)?;
        }
        let name = dto.name.as_deref().map(str::trim).map(str::to_string);
        if let Some(name) = name.as_deref() {
            self.ensure_unique_name(name, Some(id)).await?;
        }

        let cat = self
            .repo
            .update(id, dto.into())
            .await
            .map_err(|e| name_conflict(e, name.as_deref().unwrap_or_default()))?
            .ok_or_else(|| not_found(id))?;

        info!(cat_id = id, "Cat updated");
        Ok(cat)
    }

    pub async fn remove(&self, id: i32) -> Result<(), Fault> {
        if !self.repo.delete(id).await? {
            return Err(not_found(id));
        }
        info!(cat_id = id, "Cat removed");
        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        self.repo.health_check().await
    }

    /// A name may only be reused by the cat that already holds it.
    ///
    /// Early answer only: the repository rejects the write itself when a
    /// concurrent request takes the name first, see [`name_conflict`].
    async fn ensure_unique_name(&self, name: &str, except: Option<i32>) -> Result<(), Fault> {
        match self.repo.find_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => Err(duplicate_name(&existing.name)),
            _ => Ok(()),
        }
    }
}

fn duplicate_name(name: &str) -> Fault {
    BusinessError::bad_request(format!("Cat with name \"{name}\" already exists"))
        .with_data(json!({ "existingName": name }))
        .into()
}

fn name_conflict(err: DbError, name: &str) -> Fault {
    match err {
        DbError::Duplicate(_) => duplicate_name(name),
        other => other.into(),
    }
}

fn check_age(age: i32) -> Result<(), BusinessError> {
    if (MIN_AGE..=MAX_AGE).contains(&age) {
        return Ok(());
    }
    Err(
        BusinessError::bad_request(format!("Age must be between {MIN_AGE} and {MAX_AGE}"))
            .with_data(json!({ "age": age, "min": MIN_AGE, "max": MAX_AGE })),
    )
}

fn not_found(id: i32) -> Fault {
    BusinessError::not_found()
        .with_message(format!("Cat with ID {id} not found"))
        .with_data(json!({ "id": id }))
        .into()
}
