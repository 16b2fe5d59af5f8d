//! Cat repository for `cats` table operations.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::{Cat, CatPatch, CatRepository, DbError, NewCat};

const CAT_COLUMNS: &str =
    "id, name, age, breed, description, internal_notes, created_at, updated_at";

/// Postgres-backed [`CatRepository`].
#[derive(Debug, Clone)]
pub struct PgCatRepository {
    pool: PgPool,
}

impl PgCatRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatRepository for PgCatRepository {
    async fn count(&self) -> Result<u64, DbError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cats")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Cat>, DbError> {
        let cats = sqlx::query_as::<_, Cat>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(cats)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Cat>, DbError> {
        let cat = sqlx::query_as::<_, Cat>(&format!("SELECT {CAT_COLUMNS} FROM cats WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cat)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Cat>, DbError> {
        let cat = sqlx::query_as::<_, Cat>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats WHERE name = $1 LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cat)
    }

    async fn create(&self, cat: NewCat) -> Result<Cat, DbError> {
        let cat = sqlx::query_as::<_, Cat>(&format!(
            "INSERT INTO cats (name, age, breed, description, internal_notes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CAT_COLUMNS}"
        ))
        .bind(cat.name)
        .bind(cat.age)
        .bind(cat.breed)
        .bind(cat.description)
        .bind(cat.internal_notes)
        .fetch_one(&self.pool)
        .await
        .map_err(super::classify)?;
        Ok(cat)
    }

    async fn update(&self, id: i32, patch: CatPatch) -> Result<Option<Cat>, DbError> {
        let cat = sqlx::query_as::<_, Cat>(&format!(
            "UPDATE cats
                SET name = COALESCE($2, name),
                    age = COALESCE($3, age),
                    breed = COALESCE($4, breed),
                    description = COALESCE($5, description),
                    updated_at = NOW()
              WHERE id = $1
          RETURNING {CAT_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.age)
        .bind(patch.breed)
        .bind(patch.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(super::classify)?;
        Ok(cat)
    }

    async fn delete(&self, id: i32) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM cats WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        super::ping(&self.pool).await
    }
}
