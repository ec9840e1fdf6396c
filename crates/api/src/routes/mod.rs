//! HTTP route handlers for the Recipe Box API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Users
//! POST  /user/create           - Register a user
//! POST  /user/token            - Exchange credentials for an API token
//! GET   /user/me               - Current user profile
//! PATCH /user/me               - Update name and/or password
//!
//! # Catalog (requires auth)
//! GET  /tags                   - List the caller's tags
//! POST /tags                   - Create a tag
//! GET  /ingredients            - List the caller's ingredients
//! POST /ingredients            - Create an ingredient
//!
//! # Recipes (requires auth)
//! GET    /recipes              - List recipes (summaries)
//! POST   /recipes              - Create a recipe
//! GET    /recipes/{id}         - Recipe detail
//! PUT    /recipes/{id}         - Replace a recipe
//! PATCH  /recipes/{id}         - Partially update a recipe
//! DELETE /recipes/{id}         - Delete a recipe
//! POST   /recipes/{id}/image   - Upload a recipe image (multipart)
//!
//! # Media
//! GET  /media/...              - Uploaded files
//! ```

pub mod catalog;
pub mod recipes;
pub mod users;

use std::time::Duration;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, State},
    http::{Request, Response, StatusCode},
    routing::{get, post},
};
use tower_http::{
    services::ServeDir,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::models::catalog::{IngredientKind, TagKind};
use crate::state::AppState;

/// JSON body extractor whose rejections render as [`AppError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections render as [`AppError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(users::create))
        .route("/token", post(users::token))
        .route("/me", get(users::me).patch(users::update_me))
}

/// Create the recipe routes router.
pub fn recipe_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(recipes::index).post(recipes::create))
        .route(
            "/{id}",
            get(recipes::show)
                .put(recipes::replace)
                .patch(recipes::update)
                .delete(recipes::destroy),
        )
        .route(
            "/{id}/image",
            post(recipes::upload_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

/// Create all API routes.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/user", user_routes())
        .route(
            "/tags",
            get(catalog::index::<TagKind>).post(catalog::create::<TagKind>),
        )
        .route(
            "/ingredients",
            get(catalog::index::<IngredientKind>).post(catalog::create::<IngredientKind>),
        )
        .nest("/recipes", recipe_routes(state.config().max_upload_bytes))
}

/// Build the complete application: API routes, health checks, media files,
/// request IDs, and request tracing.
///
/// Sentry layers are added by the binary so tests can drive this router
/// without a Sentry client.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes(&state));

    // Absolute URLs point at an external host; nothing to serve locally.
    let media_url = state.config().media_url.clone();
    if media_url.starts_with('/') && media_url.len() > 1 {
        router = router.nest_service(&media_url, ServeDir::new(state.media().root()));
    }

    router
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
