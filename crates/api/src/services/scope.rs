//! Owner-scoped access to tags, ingredients, and recipes.
//!
//! An [`OwnerScope`] is built from the authenticated user and nothing else.
//! Every read and write it performs is restricted to that user's rows, and any
//! owner supplied in a payload is ignored. Records owned by someone else are
//! reported as not found.

use sqlx::SqlitePool;

use recipe_box_core::{RecipeId, UserId};

use crate::db::{CatalogRepository, RecipeRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::catalog::{CatalogEntry, CatalogKind, CatalogPayload};
use crate::models::recipe::{Recipe, RecipeDetail, RecipeFilter, RecipePayload, RecipeSummary};
use crate::models::user::User;
use crate::services::media::MediaStorage;
use crate::state::AppState;

/// The calling user's view of the catalog and recipe stores.
pub struct OwnerScope<'a> {
    pool: &'a SqlitePool,
    media: &'a MediaStorage,
    owner: UserId,
}

impl<'a> OwnerScope<'a> {
    /// Scope operations to `user`.
    #[must_use]
    pub fn new(state: &'a AppState, user: &User) -> Self {
        Self {
            pool: state.pool(),
            media: state.media(),
            owner: user.id,
        }
    }

    // =========================================================================
    // Tags and ingredients
    // =========================================================================

    /// List the caller's entries of kind `K`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_entries<K: CatalogKind>(
        &self,
        assigned_only: bool,
    ) -> Result<Vec<CatalogEntry<K::Id>>> {
        Ok(CatalogRepository::<K>::new(self.pool)
            .list(self.owner, assigned_only)
            .await?)
    }

    /// Create an entry of kind `K` owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the name is blank.
    pub async fn create_entry<K: CatalogKind>(
        &self,
        payload: CatalogPayload,
    ) -> Result<CatalogEntry<K::Id>> {
        let name = payload.validate()?;
        Ok(CatalogRepository::<K>::new(self.pool)
            .create(self.owner, &name)
            .await?)
    }

    // =========================================================================
    // Recipes
    // =========================================================================

    /// List the caller's recipes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<RecipeSummary>> {
        let recipes = self.recipes().list(self.owner, filter).await?;
        Ok(recipes.into_iter().map(|r| self.summary(r)).collect())
    }

    /// Get one of the caller's recipes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the caller has no such recipe.
    pub async fn get_recipe(&self, id: RecipeId) -> Result<RecipeDetail> {
        let recipe = self
            .recipes()
            .get(self.owner, id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(self.detail(recipe))
    }

    /// Create a recipe owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for invalid fields and
    /// `AppError::Database` with an invalid reference for foreign tag or
    /// ingredient ids.
    pub async fn create_recipe(&self, payload: RecipePayload) -> Result<RecipeDetail> {
        let new = payload.validate_full()?;
        let recipe = self.recipes().create(self.owner, &new).await?;
        Ok(self.detail(recipe))
    }

    /// Replace one of the caller's recipes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` before any validation if the caller has no
    /// such recipe, then the same errors as [`OwnerScope::create_recipe`].
    pub async fn replace_recipe(&self, id: RecipeId, payload: RecipePayload) -> Result<RecipeDetail> {
        self.ensure_recipe(id).await?;
        let new = payload.validate_full()?;
        let recipe = self.recipes().replace(self.owner, id, &new).await?;
        Ok(self.detail(recipe))
    }

    /// Partially update one of the caller's recipes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` before any validation if the caller has no
    /// such recipe, then validation or invalid reference errors.
    pub async fn patch_recipe(&self, id: RecipeId, payload: RecipePayload) -> Result<RecipeDetail> {
        self.ensure_recipe(id).await?;
        let patch = payload.validate_partial()?;
        let recipe = self.recipes().patch(self.owner, id, &patch).await?;
        Ok(self.detail(recipe))
    }

    /// Delete one of the caller's recipes and its image file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the caller has no such recipe.
    pub async fn delete_recipe(&self, id: RecipeId) -> Result<()> {
        let image = self.recipes().delete(self.owner, id).await?;
        if let Some(path) = image {
            self.media.remove_quietly(&path).await;
        }
        tracing::info!(recipe_id = %id, user_id = %self.owner, "recipe deleted");
        Ok(())
    }

    /// Validate and store an image, then attach it to one of the caller's
    /// recipes, replacing any previous image.
    ///
    /// Nothing is written if the bytes are not a valid image, and the recipe's
    /// previous image stays in place.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the caller has no such recipe, or
    /// `AppError::Media` if the upload is not a valid image.
    pub async fn attach_image(&self, id: RecipeId, bytes: Vec<u8>) -> Result<RecipeDetail> {
        let previous = self
            .recipes()
            .get(self.owner, id)
            .await?
            .ok_or(AppError::NotFound)?
            .image;

        let stored = self.media.store_recipe_image(bytes).await?;

        let recipe = match self.recipes().set_image(self.owner, id, &stored).await {
            Ok(recipe) => recipe,
            Err(e) => {
                self.media.remove_quietly(&stored).await;
                return Err(e.into());
            }
        };

        if let Some(old) = previous.filter(|old| *old != stored) {
            self.media.remove_quietly(&old).await;
        }

        let recipe_id = id.to_string();
        add_breadcrumb("recipe", "Uploaded image", Some(&[("recipe_id", recipe_id.as_str())]));
        Ok(self.detail(recipe))
    }

    async fn ensure_recipe(&self, id: RecipeId) -> Result<()> {
        if self.recipes().exists(self.owner, id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    const fn recipes(&self) -> RecipeRepository<'a> {
        RecipeRepository::new(self.pool)
    }

    fn summary(&self, recipe: Recipe) -> RecipeSummary {
        recipe.into_summary(|path| self.media.url_for(path))
    }

    fn detail(&self, recipe: Recipe) -> RecipeDetail {
        recipe.into_detail(|path| self.media.url_for(path))
    }
}
