//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recipe_box_core::{Email, UserId};

use super::validation::{self, FieldErrors, REQUIRED};

/// An account (domain type).
///
/// Accounts are identified by email; there is no separate username.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized email address.
    pub email: Email,
    /// Display name, possibly empty.
    pub name: String,
    /// Inactive users cannot log in or use existing tokens.
    pub is_active: bool,
    /// May use administrative tooling.
    pub is_staff: bool,
    /// Has every permission.
    pub is_superuser: bool,
    /// When the user last obtained a token.
    pub last_login: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Fields other than email and password set when creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserFields {
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Default for NewUserFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }
}

impl NewUserFields {
    /// Regular account with the given display name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Public view of a user. The password is never echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_string(),
            name: user.name.clone(),
        }
    }
}

/// Body of `POST /user/create`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Validated registration input. Email syntax and password strength are
/// checked by the auth service.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl CreateUserPayload {
    /// Check that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns per-field messages for missing or blank fields.
    pub fn validate(self) -> Result<Registration, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = validation::required_text(&mut errors, "email", self.email);
        let password = required_password(&mut errors, self.password);
        let name = self
            .name
            .and_then(|name| validation::optional_text(&mut errors, "name", name))
            .unwrap_or_default();

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok(Registration {
                email,
                password,
                name,
            }),
            _ => Err(errors),
        }
    }
}

/// Body of `POST /user/token`.
#[derive(Debug, Default, Deserialize)]
pub struct TokenPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated login input.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl TokenPayload {
    /// Check that both credentials are present.
    ///
    /// # Errors
    ///
    /// Returns per-field messages for missing or blank fields.
    pub fn validate(self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = validation::required_text(&mut errors, "email", self.email);
        let password = required_password(&mut errors, self.password);

        match (email, password) {
            (Some(email), Some(password)) => Ok(Credentials { email, password }),
            _ => Err(errors),
        }
    }
}

/// Response of `POST /user/token`.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Body of `PATCH /user/me`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMePayload {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Validated profile changes.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub password: Option<String>,
}

impl UpdateMePayload {
    /// Validate the supplied fields. Absent fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns per-field messages for invalid fields.
    pub fn validate(self) -> Result<ProfileUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = self
            .name
            .and_then(|name| validation::optional_text(&mut errors, "name", name));
        let password = match self.password {
            Some(password) => required_password(&mut errors, Some(password)),
            None => None,
        };
        errors.into_result(ProfileUpdate { name, password })
    }
}

/// Passwords are not trimmed; only emptiness is checked here.
fn required_password(errors: &mut FieldErrors, password: Option<String>) -> Option<String> {
    match password {
        None => {
            errors.add("password", REQUIRED);
            None
        }
        Some(p) if p.is_empty() => {
            errors.add("password", validation::BLANK);
            None
        }
        Some(p) => Some(p),
    }
}
