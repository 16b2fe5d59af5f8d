//! Persistence layer for cats, users and roles.
//!
//! Provides:
//! - Repository traits ([`CatRepository`], [`UserRepository`]) used by the services
//! - Postgres implementations over a shared pool via [`Database`]
//! - In-memory implementations for running without a database and for tests
//!
//! # Example
//!
//! ```ignore
//! use cats_db::{create_pool, Database, DbConfig};
//!
//! let pool = create_pool(&DbConfig::from_url("postgres://localhost/cats")).await?;
//! let db = Database::new(pool);
//! db.migrate().await?;
//!
//! let cat = db.cats.find_by_id(1).await?;
//! ```

mod models;
mod repository;

use cats_core::Fault;

/// Database failure.
///
/// Services turn [`DbError::Duplicate`] into their own business faults. Anything
/// that reaches the `Fault` conversion is internal.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A unique constraint rejected the write. Carries the column.
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("database query failed")]
    Query(#[from] sqlx::Error),
    #[error("database migration failed")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl From<DbError> for Fault {
    #[inline]
    fn from(e: DbError) -> Self {
        Self::unknown(e)
    }
}

// =============================================================================
// Public exports - Models
// =============================================================================

pub use models::{Cat, CatPatch, NewCat, NewUser, Role, User, UserWithRoles, roles};

// =============================================================================
// Public exports - Repositories and config
// =============================================================================

pub use repository::{
    CatRepository, Database, DbConfig, MemoryCatRepository, MemoryUserRepository,
    PgCatRepository, PgUserRepository, UserRepository, create_pool,
};
