//! Tags and ingredients.
//!
//! Both are owner-scoped labels with nothing but a name. They share one
//! generic representation, [`CatalogEntry`], parameterized by a
//! [`CatalogKind`] marker that carries the table layout for that kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::Sqlite;

use recipe_box_core::{IngredientId, TagId, UserId};

use super::validation::{self, FieldErrors};

/// A kind of owner-scoped label attached to recipes.
pub trait CatalogKind: Send + Sync + 'static {
    /// Typed id of entries of this kind.
    type Id: Copy
        + Eq
        + Ord
        + fmt::Debug
        + fmt::Display
        + Into<i64>
        + Serialize
        + for<'de> Deserialize<'de>
        + sqlx::Type<Sqlite>
        + for<'r> sqlx::Decode<'r, Sqlite>
        + for<'q> sqlx::Encode<'q, Sqlite>
        + Send
        + Sync
        + Unpin
        + 'static;

    /// Table holding the entries.
    const TABLE: &'static str;
    /// Join table linking recipes to entries.
    const LINK_TABLE: &'static str;
    /// Column of [`Self::LINK_TABLE`] referencing [`Self::TABLE`].
    const LINK_COLUMN: &'static str;
    /// Name of the recipe payload field carrying ids of this kind.
    const FIELD: &'static str;
}

/// Marker for tags.
#[derive(Debug, Clone, Copy)]
pub struct TagKind;

impl CatalogKind for TagKind {
    type Id = TagId;

    const TABLE: &'static str = "tag";
    const LINK_TABLE: &'static str = "recipe_tag";
    const LINK_COLUMN: &'static str = "tag_id";
    const FIELD: &'static str = "tags";
}

/// Marker for ingredients.
#[derive(Debug, Clone, Copy)]
pub struct IngredientKind;

impl CatalogKind for IngredientKind {
    type Id = IngredientId;

    const TABLE: &'static str = "ingredient";
    const LINK_TABLE: &'static str = "recipe_ingredient";
    const LINK_COLUMN: &'static str = "ingredient_id";
    const FIELD: &'static str = "ingredients";
}

/// A named, owned entry of some [`CatalogKind`].
///
/// Serializes as `{"id": .., "name": ..}`; the owner is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry<I> {
    pub id: I,
    pub name: String,
    #[serde(skip)]
    pub owner: UserId,
}

pub type Tag = CatalogEntry<TagId>;
pub type Ingredient = CatalogEntry<IngredientId>;

/// Body of `POST /tags` and `POST /ingredients`.
///
/// Any other fields, including an owner, are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogPayload {
    pub name: Option<String>,
}

impl CatalogPayload {
    /// Returns the trimmed name.
    ///
    /// # Errors
    ///
    /// Returns a `name` error if the name is missing, blank, or too long.
    pub fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        match validation::required_text(&mut errors, "name", self.name) {
            Some(name) => Ok(name),
            None => Err(errors),
        }
    }
}

/// Query parameters of catalog list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    /// `1` restricts the list to entries used by at least one recipe.
    #[serde(default)]
    pub assigned_only: Option<u8>,
}

impl CatalogQuery {
    #[must_use]
    pub fn assigned_only(&self) -> bool {
        self.assigned_only.is_some_and(|v| v != 0)
    }
}
