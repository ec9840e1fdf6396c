//! Token authentication extractor.
//!
//! Clients authenticate with `Authorization: Token <key>` (or `Bearer <key>`),
//! using the key returned by `POST /user/token`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::user::User;
use crate::services::auth::{AuthService, parse_authorization};
use crate::state::AppState;

/// Extractor that requires an authenticated, active user.
///
/// Rejects with 401 if the header is missing, malformed, or carries an
/// unknown token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided.".to_owned())
            })?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid token header.".to_owned()))?;

        let key = parse_authorization(header)
            .ok_or_else(|| AppError::Unauthorized("Invalid token header.".to_owned()))?;

        let user = AuthService::new(state.pool()).user_for_token(key).await?;

        tracing::Span::current().record("user_id", user.id.as_i64());
        set_sentry_user(&user.id, Some(user.email.as_str()));

        Ok(Self(user))
    }
}
