//! Repository traits and their Postgres and in-memory implementations.
//!
//! # Error Handling
//!
//! Every method returns `Result<T, DbError>`. Absence is not an error: lookups
//! return `Option` and deletes return whether a row was removed, so the services
//! decide which business fault a missing row becomes. Writes that would break a
//! unique column fail with [`DbError::Duplicate`] in both implementations.

mod cat;
mod config;
mod memory;
mod user;

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::{Cat, CatPatch, DbError, NewCat, NewUser, Role, User};

pub use cat::PgCatRepository;
pub use config::{DbConfig, create_pool};
pub use memory::{MemoryCatRepository, MemoryUserRepository};
pub use user::PgUserRepository;

/// Storage for cats.
#[async_trait]
pub trait CatRepository: Send + Sync {
    async fn count(&self) -> Result<u64, DbError>;

    /// Cats ordered by id, skipping `offset` rows.
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Cat>, DbError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Cat>, DbError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Cat>, DbError>;

    /// [`DbError::Duplicate`] when another cat holds the name.
    async fn create(&self, cat: NewCat) -> Result<Cat, DbError>;

    /// `None` when no cat has this id, [`DbError::Duplicate`] when the new name
    /// belongs to another cat.
    async fn update(&self, id: i32, patch: CatPatch) -> Result<Option<Cat>, DbError>;

    /// `true` when a row was removed.
    async fn delete(&self, id: i32) -> Result<bool, DbError>;

    async fn health_check(&self) -> bool;
}

/// Storage for users and their roles.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError>;

    async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, DbError>;

    /// Insert the user and link it to `role_id` atomically. A taken email or
    /// username fails with [`DbError::Duplicate`].
    async fn create_with_role(&self, user: NewUser, role_id: i32) -> Result<User, DbError>;

    /// Role codes held by the user.
    async fn roles_for(&self, user_id: i32) -> Result<Vec<String>, DbError>;

    async fn health_check(&self) -> bool;
}

/// Combined Postgres context.
#[derive(Debug, Clone)]
pub struct Database {
    pub cats: PgCatRepository,
    pub users: PgUserRepository,
    pool: PgPool,
}

impl Database {
    /// Creates a new database context with all repositories.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            cats: PgCatRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Unique violations become [`DbError::Duplicate`], keyed by the default
/// `<table>_<column>_key` constraint names.
fn classify(err: sqlx::Error) -> DbError {
    let column = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
            Some("cats_name_key") => "name",
            Some("users_username_key") => "username",
            Some("users_email_key") => "email",
            _ => "value",
        },
        _ => return DbError::Query(err),
    };
    DbError::Duplicate(column)
}

async fn ping(pool: &PgPool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}
