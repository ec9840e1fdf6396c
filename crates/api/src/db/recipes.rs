//! Recipe repository.
//!
//! Every method takes the owning user and only ever touches that user's rows.
//! Writes that change relation rows run in a single transaction together with
//! the recipe row, so a rejected tag or ingredient id leaves nothing behind.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use recipe_box_core::{Price, RecipeId, UserId};

use super::RepositoryError;
use super::catalog::{ensure_owned, id_array, load_links, set_links};
use crate::models::catalog::{CatalogKind, IngredientKind, TagKind};
use crate::models::recipe::{NewRecipe, Recipe, RecipeFilter, RecipePatch};

const RECIPE_COLUMNS: &str =
    "id, user_id, title, time_minutes, price, link, image, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: RecipeId,
    user_id: UserId,
    title: String,
    time_minutes: u32,
    price: Price,
    link: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Repository for recipe database operations.
pub struct RecipeRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RecipeRepository<'a> {
    /// Create a new recipe repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List the owner's recipes, newest id first.
    ///
    /// Non-empty filter lists keep recipes linked to any of the given ids.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        owner: UserId,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, RepositoryError> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {RECIPE_COLUMNS} FROM recipe WHERE user_id = "));
        query.push_bind(owner);
        push_link_filter::<TagKind>(&mut query, &filter.tags);
        push_link_filter::<IngredientKind>(&mut query, &filter.ingredients);
        query.push(" ORDER BY id DESC");

        let mut conn = self.pool.acquire().await?;
        let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(&mut *conn).await?;

        hydrate(&mut conn, rows).await
    }

    /// Get one of the owner's recipes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, owner: UserId, id: RecipeId) -> Result<Option<Recipe>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, owner, id).await
    }

    /// Returns true if `id` names one of the owner's recipes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, owner: UserId, id: RecipeId) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        exists(&mut conn, owner, id).await
    }

    /// Create a recipe owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` if a tag or ingredient id is
    /// not one of the owner's.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, owner: UserId, new: &NewRecipe) -> Result<Recipe, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        ensure_owned::<TagKind>(&mut tx, owner, &new.tags).await?;
        ensure_owned::<IngredientKind>(&mut tx, owner, &new.ingredients).await?;

        let now = Utc::now();
        let id: RecipeId = sqlx::query_scalar(
            r"
            INSERT INTO recipe
                (user_id, title, time_minutes, price, link, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            ",
        )
        .bind(owner)
        .bind(&new.title)
        .bind(new.time_minutes)
        .bind(new.price)
        .bind(&new.link)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        set_links::<TagKind>(&mut tx, id, &new.tags).await?;
        set_links::<IngredientKind>(&mut tx, id, &new.ingredients).await?;

        let recipe = fetch(&mut tx, owner, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::debug!(recipe_id = %id, user_id = %owner, "recipe created");
        Ok(recipe)
    }

    /// Replace every mutable field and both relation sets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner has no such recipe.
    /// Returns `RepositoryError::InvalidReference` for foreign relation ids.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn replace(
        &self,
        owner: UserId,
        id: RecipeId,
        new: &NewRecipe,
    ) -> Result<Recipe, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !exists(&mut tx, owner, id).await? {
            return Err(RepositoryError::NotFound);
        }
        ensure_owned::<TagKind>(&mut tx, owner, &new.tags).await?;
        ensure_owned::<IngredientKind>(&mut tx, owner, &new.ingredients).await?;

        sqlx::query(
            r"
            UPDATE recipe
            SET title = ?, time_minutes = ?, price = ?, link = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            ",
        )
        .bind(&new.title)
        .bind(new.time_minutes)
        .bind(new.price)
        .bind(&new.link)
        .bind(Utc::now())
        .bind(id)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        set_links::<TagKind>(&mut tx, id, &new.tags).await?;
        set_links::<IngredientKind>(&mut tx, id, &new.ingredients).await?;

        let recipe = fetch(&mut tx, owner, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        Ok(recipe)
    }

    /// Change only the fields present in `patch`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner has no such recipe.
    /// Returns `RepositoryError::InvalidReference` for foreign relation ids.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn patch(
        &self,
        owner: UserId,
        id: RecipeId,
        patch: &RecipePatch,
    ) -> Result<Recipe, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !exists(&mut tx, owner, id).await? {
            return Err(RepositoryError::NotFound);
        }
        if let Some(tags) = &patch.tags {
            ensure_owned::<TagKind>(&mut tx, owner, tags).await?;
        }
        if let Some(ingredients) = &patch.ingredients {
            ensure_owned::<IngredientKind>(&mut tx, owner, ingredients).await?;
        }

        sqlx::query(
            r"
            UPDATE recipe
            SET title = COALESCE(?, title),
                time_minutes = COALESCE(?, time_minutes),
                price = COALESCE(?, price),
                link = COALESCE(?, link),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            ",
        )
        .bind(patch.title.as_deref())
        .bind(patch.time_minutes)
        .bind(patch.price)
        .bind(patch.link.as_deref())
        .bind(Utc::now())
        .bind(id)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        if let Some(tags) = &patch.tags {
            set_links::<TagKind>(&mut tx, id, tags).await?;
        }
        if let Some(ingredients) = &patch.ingredients {
            set_links::<IngredientKind>(&mut tx, id, ingredients).await?;
        }

        let recipe = fetch(&mut tx, owner, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        Ok(recipe)
    }

    /// Record the stored image path.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner has no such recipe.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_image(
        &self,
        owner: UserId,
        id: RecipeId,
        image: &str,
    ) -> Result<Recipe, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query(
            "UPDATE recipe SET image = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(image)
        .bind(Utc::now())
        .bind(id)
        .bind(owner)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        fetch(&mut conn, owner, id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a recipe. Relation rows go with it.
    ///
    /// Returns the stored image path, if any, so the caller can remove the file.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner has no such recipe.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(
        &self,
        owner: UserId,
        id: RecipeId,
    ) -> Result<Option<String>, RepositoryError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("DELETE FROM recipe WHERE id = ? AND user_id = ? RETURNING image")
                .bind(id)
                .bind(owner)
                .fetch_optional(self.pool)
                .await?;

        row.map(|(image,)| image).ok_or(RepositoryError::NotFound)
    }
}

fn push_link_filter<K: CatalogKind>(query: &mut QueryBuilder<'_, Sqlite>, ids: &[K::Id]) {
    if ids.is_empty() {
        return;
    }

    query.push(format!(
        " AND id IN (SELECT recipe_id FROM {} WHERE {} IN (SELECT value FROM json_each(",
        K::LINK_TABLE,
        K::LINK_COLUMN
    ));
    query.push_bind(id_array(ids));
    query.push(")))");
}

async fn exists(
    conn: &mut SqliteConnection,
    owner: UserId,
    id: RecipeId,
) -> Result<bool, RepositoryError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM recipe WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

async fn fetch(
    conn: &mut SqliteConnection,
    owner: UserId,
    id: RecipeId,
) -> Result<Option<Recipe>, RepositoryError> {
    let row: Option<RecipeRow> = sqlx::query_as(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipe WHERE id = ? AND user_id = ?"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(hydrate(conn, vec![row]).await?.pop())
}

/// Attach tags and ingredients to recipe rows, keeping row order.
async fn hydrate(
    conn: &mut SqliteConnection,
    rows: Vec<RecipeRow>,
) -> Result<Vec<Recipe>, RepositoryError> {
    let ids: Vec<RecipeId> = rows.iter().map(|r| r.id).collect();
    let mut tags = load_links::<TagKind>(conn, &ids).await?;
    let mut ingredients = load_links::<IngredientKind>(conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|r| Recipe {
            id: r.id,
            owner: r.user_id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link,
            image: r.image,
            tags: tags.remove(&r.id).unwrap_or_default(),
            ingredients: ingredients.remove(&r.id).unwrap_or_default(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::CatalogRepository;
    use crate::db::test_support;
    use recipe_box_core::{IngredientId, TagId};

    fn cheesecake() -> NewRecipe {
        NewRecipe {
            title: "Cheesecake".into(),
            time_minutes: 5,
            price: Price::parse("5.00").unwrap(),
            link: String::new(),
            tags: Vec::new(),
            ingredients: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_stores_fields() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;

        let recipe = RecipeRepository::new(&pool)
            .create(owner, &cheesecake())
            .await
            .unwrap();
        assert_eq!(recipe.owner, owner);
        assert_eq!(recipe.title, "Cheesecake");
        assert_eq!(recipe.time_minutes, 5);
        assert_eq!(recipe.price.to_string(), "5.00");
        assert!(recipe.tags.is_empty());
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.image.is_none());
    }

    #[tokio::test]
    async fn test_create_with_relations() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let vegan = CatalogRepository::<TagKind>::new(&pool)
            .create(owner, "Vegan")
            .await
            .unwrap();
        let dessert = CatalogRepository::<TagKind>::new(&pool)
            .create(owner, "Dessert")
            .await
            .unwrap();

        let new = NewRecipe {
            tags: vec![vegan.id, dessert.id],
            ..cheesecake()
        };
        let recipe = RecipeRepository::new(&pool).create(owner, &new).await.unwrap();

        let mut ids: Vec<TagId> = recipe.tags.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![vegan.id, dessert.id]);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_ingredient_and_persists_nothing() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let recipes = RecipeRepository::new(&pool);

        let new = NewRecipe {
            ingredients: vec![IngredientId::new(42)],
            ..cheesecake()
        };
        let err = recipes.create(owner, &new).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidReference { field: "ingredients", id: 42 }
        ));
        assert!(recipes
            .list(owner, &RecipeFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_newest_first() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let other = test_support::user(&pool, "other@example.com").await;
        let recipes = RecipeRepository::new(&pool);

        let first = recipes.create(owner, &cheesecake()).await.unwrap();
        let second = recipes.create(owner, &cheesecake()).await.unwrap();
        recipes.create(other, &cheesecake()).await.unwrap();

        let ids: Vec<RecipeId> = recipes
            .list(owner, &RecipeFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(recipes.get(other, first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_clears_omitted_relations() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let tag = CatalogRepository::<TagKind>::new(&pool)
            .create(owner, "Dinner")
            .await
            .unwrap();
        let recipes = RecipeRepository::new(&pool);
        let recipe = recipes
            .create(
                owner,
                &NewRecipe {
                    tags: vec![tag.id],
                    link: "https://example.com".into(),
                    ..cheesecake()
                },
            )
            .await
            .unwrap();

        let replaced = recipes
            .replace(
                owner,
                recipe.id,
                &NewRecipe {
                    title: "Spaghetti".into(),
                    ..cheesecake()
                },
            )
            .await
            .unwrap();
        assert_eq!(replaced.title, "Spaghetti");
        assert!(replaced.tags.is_empty());
        assert_eq!(replaced.link, "");
    }

    #[tokio::test]
    async fn test_patch_changes_only_supplied_fields() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let tags = CatalogRepository::<TagKind>::new(&pool);
        let old = tags.create(owner, "Old").await.unwrap();
        let new = tags.create(owner, "Curry").await.unwrap();
        let recipes = RecipeRepository::new(&pool);
        let recipe = recipes
            .create(
                owner,
                &NewRecipe {
                    tags: vec![old.id],
                    ..cheesecake()
                },
            )
            .await
            .unwrap();

        let patched = recipes
            .patch(
                owner,
                recipe.id,
                &RecipePatch {
                    title: Some("Chicken Tikka".into()),
                    tags: Some(vec![new.id]),
                    ..RecipePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.title, "Chicken Tikka");
        assert_eq!(patched.time_minutes, recipe.time_minutes);
        assert_eq!(patched.price, recipe.price);
        let ids: Vec<TagId> = patched.tags.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![new.id]);
    }

    #[tokio::test]
    async fn test_writes_to_foreign_recipe_are_not_found() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let other = test_support::user(&pool, "other@example.com").await;
        let recipes = RecipeRepository::new(&pool);
        let recipe = recipes.create(owner, &cheesecake()).await.unwrap();

        assert!(matches!(
            recipes.replace(other, recipe.id, &cheesecake()).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            recipes.patch(other, recipe.id, &RecipePatch::default()).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            recipes.set_image(other, recipe.id, "x.png").await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            recipes.delete(other, recipe.id).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(recipes.exists(owner, recipe.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_returns_image_path() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let recipes = RecipeRepository::new(&pool);
        let recipe = recipes.create(owner, &cheesecake()).await.unwrap();

        recipes
            .set_image(owner, recipe.id, "uploads/recipe/a.png")
            .await
            .unwrap();
        let image = recipes.delete(owner, recipe.id).await.unwrap();
        assert_eq!(image.as_deref(), Some("uploads/recipe/a.png"));
        assert!(!recipes.exists(owner, recipe.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_any_tag_and_ingredient() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let tags = CatalogRepository::<TagKind>::new(&pool);
        let ingredients = CatalogRepository::<IngredientKind>::new(&pool);
        let vegan = tags.create(owner, "Vegan").await.unwrap();
        let fish = tags.create(owner, "Fish").await.unwrap();
        let salt = ingredients.create(owner, "Salt").await.unwrap();
        let recipes = RecipeRepository::new(&pool);

        let curry = recipes
            .create(
                owner,
                &NewRecipe {
                    tags: vec![vegan.id],
                    ingredients: vec![salt.id],
                    ..cheesecake()
                },
            )
            .await
            .unwrap();
        let salmon = recipes
            .create(
                owner,
                &NewRecipe {
                    tags: vec![fish.id],
                    ..cheesecake()
                },
            )
            .await
            .unwrap();
        recipes.create(owner, &cheesecake()).await.unwrap();

        let by_tags = recipes
            .list(
                owner,
                &RecipeFilter {
                    tags: vec![vegan.id, fish.id],
                    ingredients: Vec::new(),
                },
            )
            .await
            .unwrap();
        let ids: Vec<RecipeId> = by_tags.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![salmon.id, curry.id]);

        let by_both = recipes
            .list(
                owner,
                &RecipeFilter {
                    tags: vec![vegan.id, fish.id],
                    ingredients: vec![salt.id],
                },
            )
            .await
            .unwrap();
        let ids: Vec<RecipeId> = by_both.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![curry.id]);
    }

    #[tokio::test]
    async fn test_list_filter_with_many_ids() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let vegan = CatalogRepository::<TagKind>::new(&pool)
            .create(owner, "Vegan")
            .await
            .unwrap();
        let recipes = RecipeRepository::new(&pool);
        let curry = recipes
            .create(
                owner,
                &NewRecipe {
                    tags: vec![vegan.id],
                    ..cheesecake()
                },
            )
            .await
            .unwrap();
        recipes.create(owner, &cheesecake()).await.unwrap();

        let filter = RecipeFilter {
            tags: (1..=40_000).map(TagId::new).collect(),
            ingredients: Vec::new(),
        };
        let ids: Vec<RecipeId> = recipes
            .list(owner, &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![curry.id]);
    }

    #[tokio::test]
    async fn test_assigned_only_catalog_list() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let tags = CatalogRepository::<TagKind>::new(&pool);
        let used = tags.create(owner, "Used").await.unwrap();
        tags.create(owner, "Unused").await.unwrap();

        let recipes = RecipeRepository::new(&pool);
        for _ in 0..2 {
            recipes
                .create(
                    owner,
                    &NewRecipe {
                        tags: vec![used.id],
                        ..cheesecake()
                    },
                )
                .await
                .unwrap();
        }

        let assigned = tags.list(owner, true).await.unwrap();
        let ids: Vec<TagId> = assigned.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![used.id]);
        assert_eq!(tags.list(owner, false).await.unwrap().len(), 2);
    }
}
