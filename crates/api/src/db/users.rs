//! User repository for database operations.
//!
//! This module provides database access for users and their API tokens.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use recipe_box_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::{NewUserFields, User};

const USER_COLUMNS: &str = "id, email, name, is_active, is_staff, is_superuser, \
                            last_login, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    is_active: bool,
    is_staff: bool,
    is_superuser: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: r.id,
            email,
            name: r.name,
            is_active: r.is_active,
            is_staff: r.is_staff,
            is_superuser: r.is_superuser,
            last_login: r.last_login,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM app_user WHERE email = ?"))
                .bind(email.as_str())
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM app_user WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Create a new user with an already hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        fields: &NewUserFields,
    ) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO app_user
                (email, name, password_hash, is_active, is_staff, is_superuser,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(&fields.name)
        .bind(password_hash)
        .bind(fields.is_active)
        .bind(fields.is_staff)
        .bind(fields.is_superuser)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))?;

        User::try_from(row)
    }

    /// Set the staff and superuser flags.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_privileges(
        &self,
        id: UserId,
        is_staff: bool,
        is_superuser: bool,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE app_user
            SET is_staff = ?, is_superuser = ?, updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(is_staff)
        .bind(is_superuser)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Update a user's display name and/or password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE app_user
            SET name = COALESCE(?, name),
                password_hash = COALESCE(?, password_hash),
                updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(name)
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Get a user's password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: String,
        }

        let row: Option<Row> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM app_user WHERE email = ?"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        Ok(Some((User::try_from(r.user)?, r.password_hash)))
    }

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch_last_login(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE app_user SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Get the user's token, creating it with `new_key` if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_token(
        &self,
        id: UserId,
        new_key: &str,
    ) -> Result<String, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO auth_token (key, user_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(new_key)
        .bind(id)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        let key: String = sqlx::query_scalar("SELECT key FROM auth_token WHERE user_id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        Ok(key)
    }

    /// Get the user owning a token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_token(&self, key: &str) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM app_user
            WHERE id = (SELECT user_id FROM auth_token WHERE key = ?)
            "
        ))
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = test_support::pool().await;
        let users = UserRepository::new(&pool);

        let created = users
            .create(&email("cook@example.com"), "hash", &NewUserFields::named("Cook"))
            .await
            .unwrap();
        assert!(created.is_active);
        assert!(!created.is_staff);
        assert!(created.last_login.is_none());

        let by_email = users
            .get_by_email(&email("cook@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.name, "Cook");

        let by_id = users.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, created.email);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let pool = test_support::pool().await;
        let users = UserRepository::new(&pool);
        let fields = NewUserFields::default();

        users.create(&email("a@example.com"), "h", &fields).await.unwrap();
        let err = users
            .create(&email("a@example.com"), "h", &fields)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_set_privileges() {
        let pool = test_support::pool().await;
        let id = test_support::user(&pool, "admin@example.com").await;

        let user = UserRepository::new(&pool)
            .set_privileges(id, true, true)
            .await
            .unwrap();
        assert!(user.is_staff);
        assert!(user.is_superuser);
    }

    #[tokio::test]
    async fn test_update_profile_keeps_absent_fields() {
        let pool = test_support::pool().await;
        let users = UserRepository::new(&pool);
        let id = test_support::user(&pool, "p@example.com").await;

        users.update_profile(id, Some("New"), None).await.unwrap();
        let (user, hash) = users
            .get_password_hash(&email("p@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, "New");
        assert_eq!(hash, "not-a-real-hash");
    }

    #[tokio::test]
    async fn test_token_is_created_once() {
        let pool = test_support::pool().await;
        let users = UserRepository::new(&pool);
        let id = test_support::user(&pool, "t@example.com").await;

        let first = users.get_or_create_token(id, "key-one").await.unwrap();
        let second = users.get_or_create_token(id, "key-two").await.unwrap();
        assert_eq!(first, "key-one");
        assert_eq!(second, "key-one");

        let owner = users.get_by_token("key-one").await.unwrap().unwrap();
        assert_eq!(owner.id, id);
        assert!(users.get_by_token("key-two").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let pool = test_support::pool().await;
        let users = UserRepository::new(&pool);
        let id = test_support::user(&pool, "l@example.com").await;

        users.touch_last_login(id).await.unwrap();
        let user = users.get_by_id(id).await.unwrap().unwrap();
        assert!(user.last_login.is_some());
    }
}
