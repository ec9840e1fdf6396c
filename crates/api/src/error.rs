//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Client errors are rendered as JSON:
//!
//! - 400: a field map, `{"title": ["This field may not be blank."]}`, with
//!   errors not tied to one field under `non_field_errors`
//! - 401 / 404 / 409 / 500: `{"detail": "..."}`

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::validation::{FieldErrors, sentence};
use crate::services::auth::AuthError;
use crate::services::media::MediaError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Media storage operation failed.
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Request payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Resource not found, or owned by someone else.
    #[error("Not found")]
    NotFound,

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

const NOT_FOUND: &str = "Not found.";
const SERVER_ERROR: &str = "A server error occurred.";
const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials";

impl AppError {
    /// Returns true for failures that are the server's fault.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::Database(e) | Self::Auth(AuthError::Repository(e)) => repository_is_server(e),
            Self::Auth(AuthError::PasswordHash)
            | Self::Media(MediaError::Io(_) | MediaError::Task(_)) => true,
            _ => false,
        }
    }

    fn status_and_body(&self) -> (StatusCode, serde_json::Value) {
        match self {
            Self::Database(e) | Self::Auth(AuthError::Repository(e)) => repository_response(e),
            Self::Auth(err) => auth_response(err),
            Self::Media(MediaError::InvalidImage) => (
                StatusCode::BAD_REQUEST,
                field("image", MediaError::InvalidImage.to_string()),
            ),
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, json!(errors)),
            Self::NotFound => (StatusCode::NOT_FOUND, detail(NOT_FOUND)),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, detail(msg)),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!(FieldErrors::non_field(msg.as_str())),
            ),
            Self::Media(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, detail(SERVER_ERROR))
            }
        }
    }
}

fn repository_is_server(e: &RepositoryError) -> bool {
    matches!(
        e,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_)
    )
}

fn repository_response(e: &RepositoryError) -> (StatusCode, serde_json::Value) {
    match e {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, detail(NOT_FOUND)),
        RepositoryError::InvalidReference { field: name, id } => (
            StatusCode::BAD_REQUEST,
            field(name, format!("Invalid pk \"{id}\" - object does not exist.")),
        ),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, detail(msg)),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, detail(SERVER_ERROR))
        }
    }
}

fn auth_response(err: &AuthError) -> (StatusCode, serde_json::Value) {
    match err {
        AuthError::InvalidEmail(e) => (
            StatusCode::BAD_REQUEST,
            field("email", sentence(&e.to_string())),
        ),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, field("password", msg.clone())),
        AuthError::UserAlreadyExists => (
            StatusCode::BAD_REQUEST,
            field("email", "user with this email already exists.".to_owned()),
        ),
        AuthError::InvalidCredentials => (
            StatusCode::BAD_REQUEST,
            json!(FieldErrors::non_field(BAD_CREDENTIALS)),
        ),
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, detail("Invalid token.")),
        AuthError::Repository(e) => repository_response(e),
        AuthError::PasswordHash => (StatusCode::INTERNAL_SERVER_ERROR, detail(SERVER_ERROR)),
    }
}

fn detail(msg: &str) -> serde_json::Value {
    json!({ "detail": msg })
}

fn field(name: &str, msg: String) -> serde_json::Value {
    json!(FieldErrors::single(name, msg))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Client error");
        }

        // Don't expose internal error details to clients
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("recipe", "Uploaded image", Some(&[("recipe_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[tokio::test]
    async fn test_not_found_hides_ownership() {
        let (status, body) = render(AppError::Database(RepositoryError::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Not found."}));

        let (status, _) = render(AppError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_renders_field_map() {
        let (status, body) = render(FieldErrors::single("name", "This field may not be blank.").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"name": ["This field may not be blank."]}));
    }

    #[tokio::test]
    async fn test_invalid_reference() {
        let err = RepositoryError::InvalidReference {
            field: "tags",
            id: 7,
        };
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"tags": ["Invalid pk \"7\" - object does not exist."]})
        );
    }

    #[tokio::test]
    async fn test_auth_errors() {
        let (status, body) = render(AuthError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"non_field_errors": [BAD_CREDENTIALS]}));

        let (status, body) = render(AuthError::UserAlreadyExists.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"email": ["user with this email already exists."]})
        );

        let (status, body) =
            render(AuthError::InvalidEmail(recipe_box_core::EmailError::Empty).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"email": ["Email cannot be empty."]}));

        let (status, _) = render(AuthError::InvalidToken.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_image() {
        let (status, body) = render(MediaError::InvalidImage.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["image"][0].as_str().unwrap().starts_with("Upload a valid image"));
    }

    #[tokio::test]
    async fn test_server_errors_are_generic() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret".into()));
        assert!(err.is_server_error());
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"detail": SERVER_ERROR}));
    }

    #[test]
    fn test_client_errors_are_not_server_errors() {
        assert!(!AppError::NotFound.is_server_error());
        assert!(!AppError::Unauthorized("x".into()).is_server_error());
        assert!(!AppError::Media(MediaError::InvalidImage).is_server_error());
        assert!(!AppError::Database(RepositoryError::NotFound).is_server_error());
    }
}
