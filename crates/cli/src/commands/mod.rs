//! Command implementations.

pub mod migrate;
pub mod user;

use recipe_box_api::config::{ApiConfig, ConfigError};
use recipe_box_api::services::auth::AuthError;
use sqlx::SqlitePool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// User creation failed.
    #[error("User error: {0}")]
    User(#[from] AuthError),
}

/// Load configuration (including `.env`) and connect to the database.
async fn connect() -> Result<SqlitePool, CommandError> {
    let config = ApiConfig::from_env()?;

    tracing::info!("Connecting to database...");
    Ok(recipe_box_api::db::create_pool(&config.database_url).await?)
}
