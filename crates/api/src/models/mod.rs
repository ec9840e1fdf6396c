//! Domain models and request payloads.
//!
//! Domain types (`User`, `Recipe`, catalog entries) are validated objects kept
//! separate from database row types. Payload types mirror request bodies with
//! every field optional; `validate*` methods turn them into the validated
//! input the repositories accept, collecting per-field messages in
//! [`FieldErrors`].

pub mod catalog;
pub mod recipe;
pub mod user;
pub mod validation;

pub use catalog::{CatalogEntry, CatalogKind, Ingredient, IngredientKind, Tag, TagKind};
pub use recipe::{Recipe, RecipeDetail, RecipeSummary};
pub use user::{User, UserProfile};
pub use validation::FieldErrors;
