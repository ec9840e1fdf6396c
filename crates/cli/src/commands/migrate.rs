//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! rb-cli migrate
//! ```
//!
//! Migrations are embedded from `crates/api/migrations/`. The database file
//! is created if it does not exist.

use super::{CommandError, connect};

/// Apply all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    recipe_box_api::db::migrate(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
