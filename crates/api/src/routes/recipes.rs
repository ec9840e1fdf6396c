//! Recipe routes.
//!
//! Lists return [`RecipeSummary`] views carrying tag and ingredient ids; every
//! other recipe response is a [`RecipeDetail`] with the entries nested.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
};
use tracing::instrument;

use recipe_box_core::RecipeId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::recipe::{RecipeDetail, RecipePayload, RecipeQuery, RecipeSummary};
use crate::models::validation::FieldErrors;
use crate::routes::{ApiJson, ApiQuery};
use crate::services::scope::OwnerScope;
use crate::state::AppState;

/// Multipart field carrying the uploaded image.
const IMAGE_FIELD: &str = "image";

/// Ids that do not parse can never match a recipe.
fn recipe_id(raw: &str) -> Result<RecipeId> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// List the caller's recipes, newest first.
///
/// GET /recipes?tags=1,2&ingredients=3
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<RecipeQuery>,
) -> Result<Json<Vec<RecipeSummary>>> {
    let filter = query.parse()?;
    let recipes = OwnerScope::new(&state, &user).list_recipes(&filter).await?;
    Ok(Json(recipes))
}

/// Show one of the caller's recipes.
///
/// GET /recipes/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<RecipeDetail>> {
    let recipe = OwnerScope::new(&state, &user)
        .get_recipe(recipe_id(&id)?)
        .await?;
    Ok(Json(recipe))
}

/// Create a recipe owned by the caller.
///
/// POST /recipes
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeDetail>)> {
    let recipe = OwnerScope::new(&state, &user).create_recipe(payload).await?;

    tracing::info!(recipe_id = %recipe.id, "recipe created");
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// Replace one of the caller's recipes. Omitted relations are cleared.
///
/// PUT /recipes/{id}
#[instrument(skip_all, fields(user_id = %user.id, recipe_id = %id))]
pub async fn replace(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeDetail>> {
    let recipe = OwnerScope::new(&state, &user)
        .replace_recipe(recipe_id(&id)?, payload)
        .await?;
    Ok(Json(recipe))
}

/// Update only the supplied fields of one of the caller's recipes.
///
/// PATCH /recipes/{id}
#[instrument(skip_all, fields(user_id = %user.id, recipe_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeDetail>> {
    let recipe = OwnerScope::new(&state, &user)
        .patch_recipe(recipe_id(&id)?, payload)
        .await?;
    Ok(Json(recipe))
}

/// Delete one of the caller's recipes.
///
/// DELETE /recipes/{id}
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    OwnerScope::new(&state, &user)
        .delete_recipe(recipe_id(&id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload an image for one of the caller's recipes.
///
/// POST /recipes/{id}/image (multipart/form-data, field `image`)
#[instrument(skip_all, fields(user_id = %user.id, recipe_id = %id))]
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<RecipeDetail>> {
    let id = recipe_id(&id)?;
    let scope = OwnerScope::new(&state, &user);

    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Some(bytes) = read_image_field(multipart).await? else {
        // Unknown recipes are reported before the missing file.
        scope.get_recipe(id).await?;
        return Err(FieldErrors::single(IMAGE_FIELD, "No file was submitted.").into());
    };

    if bytes.is_empty() {
        scope.get_recipe(id).await?;
        return Err(FieldErrors::single(IMAGE_FIELD, "The submitted file is empty.").into());
    }

    let recipe = scope.attach_image(id, bytes).await?;
    Ok(Json(recipe))
}

/// Read the bytes of the `image` field, skipping any other fields.
async fn read_image_field(mut multipart: Multipart) -> Result<Option<Vec<u8>>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(Some(bytes.to_vec()));
        }
    }
    Ok(None)
}
