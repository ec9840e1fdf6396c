//! Authentication service.
//!
//! Provides account creation, password login, and API token issuance.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use sqlx::SqlitePool;

use recipe_box_core::Email;

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::{NewUserFields, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 5;

/// Random bytes in a token key; the key is their hex encoding.
const TOKEN_BYTES: usize = 20;

/// Random bytes in a password salt.
const SALT_BYTES: usize = 16;

/// Authentication service.
///
/// Handles user registration, login, and token lookup.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Create a user with a normalized email and hashed password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        fields: &NewUserFields,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(&email, &password_hash, fields)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Create a user, then grant staff and superuser flags.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`AuthService::create_user`].
    pub async fn create_superuser(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .create_user(email, password, &NewUserFields::default())
            .await?;
        let user = self.users.set_privileges(user.id, true, true).await?;

        tracing::info!(user_id = %user.id, "superuser created");
        Ok(user)
    }

    /// Check an email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown, the
    /// password is wrong, or the account is inactive.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Log in and return the user's API token, creating it on first login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if authentication fails.
    pub async fn issue_token(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self.authenticate(email, password).await?;

        let key = self
            .users
            .get_or_create_token(user.id, &generate_token_key())
            .await?;
        self.users.touch_last_login(user.id).await?;

        tracing::info!(user_id = %user.id, "token issued");
        Ok(key)
    }

    /// Resolve a token to its active user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown or the user is
    /// inactive.
    pub async fn user_for_token(&self, key: &str) -> Result<User, AuthError> {
        match self.users.get_by_token(key).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AuthError::InvalidToken),
        }
    }

    /// Change a user's display name and/or password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the new password is too short.
    pub async fn update_profile(
        &self,
        user: &User,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AuthError> {
        let password_hash = match password {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let user = self
            .users
            .update_profile(user.id, name, password_hash.as_deref())
            .await?;
        Ok(user)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Ensure this field has at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; SALT_BYTES]>())
        .map_err(|_| AuthError::PasswordHash)?;
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// A fresh 40 character hex token key.
fn generate_token_key() -> String {
    hex::encode(rand::random::<[u8; TOKEN_BYTES]>())
}

/// Parse an `Authorization` header value of the form `Token <key>` or
/// `Bearer <key>`.
#[must_use]
pub fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !key.is_empty() && !key.contains(' ')).then_some(key)
}
