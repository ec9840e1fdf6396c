//! Owner-scoped tag and ingredient storage.
//!
//! One generic repository serves every [`CatalogKind`]; the kind supplies the
//! table names. The `pub(crate)` helpers at the bottom are used by the recipe
//! repository to resolve and load relation rows inside its transactions.
//!
//! Id lists are bound as a single JSON array and expanded with `json_each`,
//! so their length is not limited by SQLite's bound parameter cap.

use std::collections::HashMap;
use std::marker::PhantomData;

use sqlx::{SqliteConnection, SqlitePool};

use recipe_box_core::{RecipeId, UserId};

use super::RepositoryError;
use crate::models::catalog::{CatalogEntry, CatalogKind};

/// Repository for one kind of catalog entry.
pub struct CatalogRepository<'a, K> {
    pool: &'a SqlitePool,
    kind: PhantomData<K>,
}

impl<'a, K: CatalogKind> CatalogRepository<'a, K> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            kind: PhantomData,
        }
    }

    /// List the owner's entries, by name descending then id descending.
    ///
    /// With `assigned_only`, only entries attached to at least one recipe are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        owner: UserId,
        assigned_only: bool,
    ) -> Result<Vec<CatalogEntry<K::Id>>, RepositoryError> {
        let assigned = if assigned_only {
            format!(
                "AND id IN (SELECT {col} FROM {link})",
                col = K::LINK_COLUMN,
                link = K::LINK_TABLE
            )
        } else {
            String::new()
        };

        let rows: Vec<(K::Id, String, UserId)> = sqlx::query_as(&format!(
            r"
            SELECT id, name, user_id
            FROM {table}
            WHERE user_id = ? {assigned}
            ORDER BY name DESC, id DESC
            ",
            table = K::TABLE
        ))
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(entry).collect())
    }

    /// Create an entry owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        owner: UserId,
        name: &str,
    ) -> Result<CatalogEntry<K::Id>, RepositoryError> {
        let row: (K::Id, String, UserId) = sqlx::query_as(&format!(
            "INSERT INTO {} (name, user_id) VALUES (?, ?) RETURNING id, name, user_id",
            K::TABLE
        ))
        .bind(name)
        .bind(owner)
        .fetch_one(self.pool)
        .await?;

        Ok(entry(row))
    }
}

fn entry<I>((id, name, owner): (I, String, UserId)) -> CatalogEntry<I> {
    CatalogEntry { id, name, owner }
}

/// Encode ids as a JSON array for `json_each(?)`.
pub(crate) fn id_array<I: Copy + Into<i64>>(ids: &[I]) -> String {
    serde_json::Value::from(ids.iter().map(|id| (*id).into()).collect::<Vec<i64>>()).to_string()
}

/// Check that every id names an entry owned by `owner`.
///
/// `ids` must be sorted so the reported id is deterministic.
pub(crate) async fn ensure_owned<K: CatalogKind>(
    conn: &mut SqliteConnection,
    owner: UserId,
    ids: &[K::Id],
) -> Result<(), RepositoryError> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: Vec<K::Id> = sqlx::query_scalar(&format!(
        r"
        SELECT id FROM {}
        WHERE user_id = ? AND id IN (SELECT value FROM json_each(?))
        ORDER BY id
        ",
        K::TABLE
    ))
    .bind(owner)
    .bind(id_array(ids))
    .fetch_all(&mut *conn)
    .await?;

    match ids.iter().find(|id| found.binary_search(id).is_err()) {
        Some(missing) => Err(RepositoryError::InvalidReference {
            field: K::FIELD,
            id: (*missing).into(),
        }),
        None => Ok(()),
    }
}

/// Replace a recipe's links of kind `K` with `ids`.
pub(crate) async fn set_links<K: CatalogKind>(
    conn: &mut SqliteConnection,
    recipe: RecipeId,
    ids: &[K::Id],
) -> Result<(), RepositoryError> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = ?",
        K::LINK_TABLE
    ))
    .bind(recipe)
    .execute(&mut *conn)
    .await?;

    if ids.is_empty() {
        return Ok(());
    }

    sqlx::query(&format!(
        "INSERT INTO {} (recipe_id, {}) SELECT ?, value FROM json_each(?)",
        K::LINK_TABLE,
        K::LINK_COLUMN
    ))
    .bind(recipe)
    .bind(id_array(ids))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load the entries of kind `K` linked to each of `recipes`, by id ascending.
pub(crate) async fn load_links<K: CatalogKind>(
    conn: &mut SqliteConnection,
    recipes: &[RecipeId],
) -> Result<HashMap<RecipeId, Vec<CatalogEntry<K::Id>>>, RepositoryError> {
    let mut by_recipe: HashMap<RecipeId, Vec<CatalogEntry<K::Id>>> = HashMap::new();
    if recipes.is_empty() {
        return Ok(by_recipe);
    }

    let rows: Vec<(RecipeId, K::Id, String, UserId)> = sqlx::query_as(&format!(
        r"
        SELECT l.recipe_id, e.id, e.name, e.user_id
        FROM {link} l
        JOIN {table} e ON e.id = l.{col}
        WHERE l.recipe_id IN (SELECT value FROM json_each(?))
        ORDER BY e.id
        ",
        link = K::LINK_TABLE,
        table = K::TABLE,
        col = K::LINK_COLUMN
    ))
    .bind(id_array(recipes))
    .fetch_all(&mut *conn)
    .await?;

    for (recipe, id, name, owner) in rows {
        by_recipe
            .entry(recipe)
            .or_default()
            .push(CatalogEntry { id, name, owner });
    }

    Ok(by_recipe)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::models::catalog::{IngredientKind, TagKind};
    use recipe_box_core::TagId;

    #[tokio::test]
    async fn test_list_is_scoped_and_ordered_by_name_desc() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let other = test_support::user(&pool, "other@example.com").await;
        let tags = CatalogRepository::<TagKind>::new(&pool);

        tags.create(owner, "Dessert").await.unwrap();
        tags.create(owner, "Vegan").await.unwrap();
        tags.create(other, "Fruity").await.unwrap();

        let names: Vec<String> = tags
            .list(owner, false)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["Vegan", "Dessert"]);
    }

    #[tokio::test]
    async fn test_duplicate_names_are_allowed() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let ingredients = CatalogRepository::<IngredientKind>::new(&pool);

        let first = ingredients.create(owner, "Salt").await.unwrap();
        let second = ingredients.create(owner, "Salt").await.unwrap();
        assert_ne!(first.id, second.id);

        let listed = ingredients.list(owner, false).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
    }

    #[tokio::test]
    async fn test_ensure_owned_reports_first_missing_id() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let other = test_support::user(&pool, "other@example.com").await;
        let tags = CatalogRepository::<TagKind>::new(&pool);

        let mine = tags.create(owner, "Mine").await.unwrap();
        let theirs = tags.create(other, "Theirs").await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        ensure_owned::<TagKind>(&mut conn, owner, &[mine.id])
            .await
            .unwrap();

        let err = ensure_owned::<TagKind>(&mut conn, owner, &[mine.id, theirs.id])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidReference { field: "tags", id } if id == theirs.id.as_i64()
        ));

        let err = ensure_owned::<TagKind>(&mut conn, owner, &[TagId::new(999)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidReference { id: 999, .. }
        ));
    }

    #[tokio::test]
    async fn test_ensure_owned_accepts_more_ids_than_bind_parameters() {
        let pool = test_support::pool().await;
        let owner = test_support::user(&pool, "owner@example.com").await;
        let mine = CatalogRepository::<TagKind>::new(&pool)
            .create(owner, "Mine")
            .await
            .unwrap();

        let ids: Vec<TagId> = (1..=40_000).map(TagId::new).collect();

        let mut conn = pool.acquire().await.unwrap();
        let err = ensure_owned::<TagKind>(&mut conn, owner, &ids)
            .await
            .unwrap_err();
        let first_foreign = ids.iter().find(|id| **id != mine.id).unwrap().as_i64();
        assert!(matches!(
            err,
            RepositoryError::InvalidReference { field: "tags", id } if id == first_foreign
        ));
    }

    #[test]
    fn test_id_array() {
        assert_eq!(id_array(&[TagId::new(3), TagId::new(10)]), "[3,10]");
        assert_eq!(id_array::<TagId>(&[]), "[]");
    }
}
