//! Database operations for Recipe Box.
//!
//! # Database
//!
//! A single `SQLite` database holds all application data.
//!
//! ## Tables
//!
//! - `app_user` - Accounts, identified by email
//! - `auth_token` - One opaque API token per user
//! - `tag`, `ingredient` - Owner-scoped labels attached to recipes
//! - `recipe` - Recipes, one owner each
//! - `recipe_tag`, `recipe_ingredient` - Many-to-many relation rows
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p recipe-box-cli -- migrate
//! ```
//!
//! Repositories take the owning [`UserId`](recipe_box_core::UserId) explicitly
//! on every call. They do not decide *who* the owner is; that is the job of
//! [`crate::services::scope::OwnerScope`].

pub mod catalog;
pub mod recipes;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

pub use catalog::CatalogRepository;
pub use recipes::RecipeRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A write referenced a related row that does not exist for the owner.
    #[error("invalid reference in {field}: {id}")]
    InvalidReference {
        /// Payload field holding the reference.
        field: &'static str,
        /// The offending id.
        id: i64,
    },
}

impl RepositoryError {
    /// Map a unique-constraint violation to [`RepositoryError::Conflict`].
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// The database file is created if it does not exist. Foreign keys are
/// enforced so ownership and relation rows cascade on delete.
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be
/// established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Create a private in-memory database.
///
/// Every `SQLite` in-memory connection is its own database, so the pool is
/// pinned to a single connection that is never recycled.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Run the embedded migrations against `pool`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the applied history
/// disagrees with the embedded set.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for repository and service tests.

    use recipe_box_core::{Email, UserId};
    use sqlx::SqlitePool;

    use super::UserRepository;
    use crate::models::user::NewUserFields;

    /// A migrated in-memory pool.
    #[allow(clippy::unwrap_used)]
    pub async fn pool() -> SqlitePool {
        let pool = super::create_memory_pool().await.unwrap();
        super::migrate(&pool).await.unwrap();
        pool
    }

    /// Insert a user directly, bypassing password hashing.
    #[allow(clippy::unwrap_used)]
    pub async fn user(pool: &SqlitePool, email: &str) -> UserId {
        let email = Email::parse(email).unwrap();
        UserRepository::new(pool)
            .create(&email, "not-a-real-hash", &NewUserFields::default())
            .await
            .unwrap()
            .id
    }
}
