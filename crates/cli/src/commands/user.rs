//! User management commands.
//!
//! Both commands go through the same validated path as `POST /user/create`:
//! the email is normalized and the password is hashed.

use recipe_box_api::models::user::NewUserFields;
use recipe_box_api::services::auth::AuthService;

use super::{CommandError, connect};

/// Create a regular user.
pub async fn create(email: &str, name: &str, password: &str) -> Result<(), CommandError> {
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .create_user(email, password, &NewUserFields::named(name))
        .await?;

    tracing::info!("Created user {} (id {})", user.email, user.id);
    Ok(())
}

/// Create a user with staff and superuser flags set.
pub async fn create_superuser(email: &str, password: &str) -> Result<(), CommandError> {
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .create_superuser(email, password)
        .await?;

    tracing::info!("Created superuser {} (id {})", user.email, user.id);
    Ok(())
}
