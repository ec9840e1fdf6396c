//! User registration, token issuance, and profile routes.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::user::{
    CreateUserPayload, NewUserFields, TokenPayload, TokenResponse, UpdateMePayload, UserProfile,
};
use crate::routes::ApiJson;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Register a new user.
///
/// POST /user/create
#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserPayload>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let registration = payload.validate()?;

    let user = AuthService::new(state.pool())
        .create_user(
            &registration.email,
            &registration.password,
            &NewUserFields::named(registration.name),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

/// Exchange an email and password for the user's API token.
///
/// POST /user/token
#[instrument(skip(state, payload))]
pub async fn token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TokenPayload>,
) -> Result<Json<TokenResponse>> {
    let credentials = payload.validate()?;

    let token = AuthService::new(state.pool())
        .issue_token(&credentials.email, &credentials.password)
        .await?;

    Ok(Json(TokenResponse { token }))
}

/// Show the authenticated user's profile.
///
/// GET /user/me
pub async fn me(RequireAuth(user): RequireAuth) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

/// Update the authenticated user's name and/or password.
///
/// PATCH /user/me
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(payload): ApiJson<UpdateMePayload>,
) -> Result<Json<UserProfile>> {
    let update = payload.validate()?;

    let user = AuthService::new(state.pool())
        .update_profile(&user, update.name.as_deref(), update.password.as_deref())
        .await?;

    Ok(Json(UserProfile::from(&user)))
}
