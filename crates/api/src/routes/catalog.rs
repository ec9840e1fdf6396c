//! Tag and ingredient routes.
//!
//! Both collections share one set of handlers, instantiated per
//! [`CatalogKind`] in the router.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::catalog::{CatalogEntry, CatalogKind, CatalogPayload, CatalogQuery};
use crate::routes::{ApiJson, ApiQuery};
use crate::services::scope::OwnerScope;
use crate::state::AppState;

/// List the caller's entries, newest name first.
///
/// GET /tags, GET /ingredients
///
/// `?assigned_only=1` restricts the list to entries used by at least one
/// recipe.
pub async fn index<K: CatalogKind>(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> Result<Json<Vec<CatalogEntry<K::Id>>>> {
    let entries = OwnerScope::new(&state, &user)
        .list_entries::<K>(query.assigned_only())
        .await?;
    Ok(Json(entries))
}

/// Create an entry owned by the caller.
///
/// POST /tags, POST /ingredients
pub async fn create<K: CatalogKind>(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(payload): ApiJson<CatalogPayload>,
) -> Result<(StatusCode, Json<CatalogEntry<K::Id>>)> {
    let entry = OwnerScope::new(&state, &user)
        .create_entry::<K>(payload)
        .await?;

    tracing::info!(kind = K::TABLE, entry_id = %entry.id, user_id = %user.id, "catalog entry created");
    Ok((StatusCode::CREATED, Json(entry)))
}
