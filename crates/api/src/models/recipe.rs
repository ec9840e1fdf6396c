//! Recipe domain types, payloads, and response projections.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recipe_box_core::{IngredientId, Price, RecipeId, TagId, UserId};

use super::catalog::{Ingredient, Tag};
use super::validation::{self, Field, FieldErrors, sentence};

/// A recipe with its related tags and ingredients resolved (domain type).
#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: RecipeId,
    /// Set at creation and never changed.
    pub owner: UserId,
    pub title: String,
    pub time_minutes: u32,
    pub price: Price,
    /// Empty when the recipe has no link.
    pub link: String,
    /// Path of the stored image, relative to the media root.
    pub image: Option<String>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<Ingredient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// List projection: relations as ids.
    pub fn into_summary(self, image_url: impl Fn(&str) -> String) -> RecipeSummary {
        RecipeSummary {
            id: self.id,
            title: self.title,
            time_minutes: self.time_minutes,
            price: self.price,
            link: self.link,
            image: self.image.as_deref().map(image_url),
            tags: self.tags.iter().map(|t| t.id).collect(),
            ingredients: self.ingredients.iter().map(|i| i.id).collect(),
        }
    }

    /// Detail projection: relations as nested objects.
    pub fn into_detail(self, image_url: impl Fn(&str) -> String) -> RecipeDetail {
        RecipeDetail {
            id: self.id,
            title: self.title,
            time_minutes: self.time_minutes,
            price: self.price,
            link: self.link,
            image: self.image.as_deref().map(image_url),
            tags: self.tags,
            ingredients: self.ingredients,
        }
    }
}

/// Recipe as returned by `GET /recipes`.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: RecipeId,
    pub title: String,
    pub time_minutes: u32,
    pub price: Price,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<IngredientId>,
}

/// Recipe as returned by single-recipe endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: RecipeId,
    pub title: String,
    pub time_minutes: u32,
    pub price: Price,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<Ingredient>,
}

/// Body of recipe create, replace, and patch requests.
///
/// Every field may be omitted at this stage; [`RecipePayload::validate_full`]
/// and [`RecipePayload::validate_partial`] decide which are required. An
/// explicit `null` is always an error. Unknown fields, including any owner,
/// are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecipePayload {
    pub title: Field<String>,
    pub time_minutes: Field<i64>,
    pub price: Field<Decimal>,
    pub link: Field<String>,
    pub tags: Field<Vec<TagId>>,
    pub ingredients: Field<Vec<IngredientId>>,
}

/// Complete recipe input for create and replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: u32,
    pub price: Price,
    pub link: String,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<IngredientId>,
}

/// Partial recipe input. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub time_minutes: Option<u32>,
    pub price: Option<Price>,
    pub link: Option<String>,
    pub tags: Option<Vec<TagId>>,
    pub ingredients: Option<Vec<IngredientId>>,
}

impl RecipePayload {
    /// Validate for create or full replace.
    ///
    /// Title, time and price are required. A missing link becomes empty and
    /// missing relation lists become empty.
    ///
    /// # Errors
    ///
    /// Returns per-field messages for every invalid field.
    pub fn validate_full(self) -> Result<NewRecipe, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self
            .title
            .required(&mut errors, "title")
            .and_then(|title| validation::non_blank_text(&mut errors, "title", title));
        let time_minutes = self
            .time_minutes
            .required(&mut errors, "time_minutes")
            .and_then(|minutes| minutes_field(&mut errors, minutes));
        let price = self
            .price
            .required(&mut errors, "price")
            .and_then(|amount| price_field(&mut errors, amount));
        let link = match self.link.optional(&mut errors, "link") {
            Some(link) => validation::optional_text(&mut errors, "link", link),
            None => Some(String::new()),
        };
        let tags = self.tags.optional(&mut errors, "tags").unwrap_or_default();
        let ingredients = self
            .ingredients
            .optional(&mut errors, "ingredients")
            .unwrap_or_default();

        match (title, time_minutes, price, link) {
            (Some(title), Some(time_minutes), Some(price), Some(link)) if errors.is_empty() => {
                Ok(NewRecipe {
                    title,
                    time_minutes,
                    price,
                    link,
                    tags: unique(tags),
                    ingredients: unique(ingredients),
                })
            }
            _ => Err(errors),
        }
    }

    /// Validate for partial update. Only supplied fields are checked.
    ///
    /// # Errors
    ///
    /// Returns per-field messages for every invalid supplied field.
    pub fn validate_partial(self) -> Result<RecipePatch, FieldErrors> {
        let mut errors = FieldErrors::new();

        let patch = RecipePatch {
            title: self
                .title
                .optional(&mut errors, "title")
                .and_then(|title| validation::non_blank_text(&mut errors, "title", title)),
            time_minutes: self
                .time_minutes
                .optional(&mut errors, "time_minutes")
                .and_then(|minutes| minutes_field(&mut errors, minutes)),
            price: self
                .price
                .optional(&mut errors, "price")
                .and_then(|amount| price_field(&mut errors, amount)),
            link: self
                .link
                .optional(&mut errors, "link")
                .and_then(|link| validation::optional_text(&mut errors, "link", link)),
            tags: self.tags.optional(&mut errors, "tags").map(unique),
            ingredients: self
                .ingredients
                .optional(&mut errors, "ingredients")
                .map(unique),
        };

        errors.into_result(patch)
    }
}

fn minutes_field(errors: &mut FieldErrors, minutes: i64) -> Option<u32> {
    if minutes < 0 {
        errors.add(
            "time_minutes",
            "Ensure this value is greater than or equal to 0.",
        );
        return None;
    }
    if let Ok(minutes) = u32::try_from(minutes) {
        Some(minutes)
    } else {
        errors.add(
            "time_minutes",
            format!("Ensure this value is less than or equal to {}.", u32::MAX),
        );
        None
    }
}

fn price_field(errors: &mut FieldErrors, amount: Decimal) -> Option<Price> {
    Price::new(amount)
        .map_err(|e| errors.add("price", sentence(&e.to_string())))
        .ok()
}

/// Relations are sets; duplicates in a payload collapse.
fn unique<I: Ord>(mut ids: Vec<I>) -> Vec<I> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Raw query parameters of `GET /recipes`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    /// Comma separated tag ids.
    pub tags: Option<String>,
    /// Comma separated ingredient ids.
    pub ingredients: Option<String>,
}

/// Parsed recipe list filters. An empty list means no filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    /// Keep recipes carrying any of these tags.
    pub tags: Vec<TagId>,
    /// Keep recipes using any of these ingredients.
    pub ingredients: Vec<IngredientId>,
}

impl RecipeQuery {
    /// Parse the comma separated id lists.
    ///
    /// # Errors
    ///
    /// Returns a field error for each list holding a non-integer entry.
    pub fn parse(self) -> Result<RecipeFilter, FieldErrors> {
        let mut errors = FieldErrors::new();
        let tags = parse_ids(&mut errors, "tags", self.tags.as_deref());
        let ingredients = parse_ids(&mut errors, "ingredients", self.ingredients.as_deref());
        errors.into_result(RecipeFilter { tags, ingredients })
    }
}

fn parse_ids<I: std::str::FromStr + Ord>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
) -> Vec<I> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let parsed: Result<Vec<I>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect();
    parsed.map_or_else(
        |_| {
            errors.add(field, "A valid integer is required.");
            Vec::new()
        },
        unique,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::validation::{BLANK, NULL, REQUIRED};

    fn cheesecake() -> RecipePayload {
        RecipePayload {
            title: Field::Value("Cheesecake".into()),
            time_minutes: Field::Value(5),
            price: Field::Value(Decimal::new(500, 2)),
            ..RecipePayload::default()
        }
    }

    #[test]
    fn test_full_accepts_minimal_payload() {
        let recipe = cheesecake().validate_full().unwrap();
        assert_eq!(recipe.title, "Cheesecake");
        assert_eq!(recipe.time_minutes, 5);
        assert_eq!(recipe.price.to_string(), "5.00");
        assert_eq!(recipe.link, "");
        assert!(recipe.tags.is_empty());
        assert!(recipe.ingredients.is_empty());
    }

    #[test]
    fn test_full_reports_every_missing_field() {
        let errors = RecipePayload::default().validate_full().unwrap_err();
        assert_eq!(errors.get("title"), [REQUIRED]);
        assert_eq!(errors.get("time_minutes"), [REQUIRED]);
        assert_eq!(errors.get("price"), [REQUIRED]);
        assert!(errors.get("link").is_empty());
    }

    #[test]
    fn test_full_rejects_negative_numbers() {
        let payload = RecipePayload {
            time_minutes: Field::Value(-1),
            price: Field::Value(Decimal::new(-100, 2)),
            ..cheesecake()
        };
        let errors = payload.validate_full().unwrap_err();
        assert_eq!(
            errors.get("time_minutes"),
            ["Ensure this value is greater than or equal to 0."]
        );
        assert_eq!(
            errors.get("price"),
            ["Ensure this value is greater than or equal to 0."]
        );
    }

    #[test]
    fn test_full_rejects_blank_title() {
        let payload = RecipePayload {
            title: Field::Value("  ".into()),
            ..cheesecake()
        };
        assert_eq!(payload.validate_full().unwrap_err().get("title"), [BLANK]);
    }

    #[test]
    fn test_full_deduplicates_relations() {
        let payload = RecipePayload {
            tags: Field::Value(vec![TagId::new(2), TagId::new(1), TagId::new(2)]),
            ..cheesecake()
        };
        let recipe = payload.validate_full().unwrap();
        assert_eq!(recipe.tags, vec![TagId::new(1), TagId::new(2)]);
    }

    #[test]
    fn test_partial_only_sets_supplied_fields() {
        let payload = RecipePayload {
            title: Field::Value("Chicken Tikka".into()),
            tags: Field::Value(vec![TagId::new(3)]),
            ..RecipePayload::default()
        };
        let patch = payload.validate_partial().unwrap();
        assert_eq!(patch.title.as_deref(), Some("Chicken Tikka"));
        assert_eq!(patch.tags, Some(vec![TagId::new(3)]));
        assert_eq!(patch.time_minutes, None);
        assert_eq!(patch.price, None);
        assert_eq!(patch.ingredients, None);
    }

    #[test]
    fn test_partial_empty_list_clears_relation() {
        let payload = RecipePayload {
            ingredients: Field::Value(Vec::new()),
            ..RecipePayload::default()
        };
        assert_eq!(
            payload.validate_partial().unwrap().ingredients,
            Some(Vec::new())
        );
    }

    #[test]
    fn test_partial_rejects_explicit_null() {
        let payload: RecipePayload =
            serde_json::from_str(r#"{"title": null, "tags": null, "link": "x"}"#).unwrap();
        let errors = payload.validate_partial().unwrap_err();
        assert_eq!(errors.get("title"), [NULL]);
        assert_eq!(errors.get("tags"), [NULL]);
        assert!(errors.get("link").is_empty());
    }

    #[test]
    fn test_full_rejects_explicit_null() {
        let payload: RecipePayload =
            serde_json::from_str(r#"{"title": null, "time_minutes": 5, "price": null}"#)
                .unwrap();
        let errors = payload.validate_full().unwrap_err();
        assert_eq!(errors.get("title"), [NULL]);
        assert_eq!(errors.get("price"), [NULL]);
        assert!(errors.get("time_minutes").is_empty());
    }

    #[test]
    fn test_payload_accepts_numeric_and_string_price() {
        let from_number: RecipePayload =
            serde_json::from_str(r#"{"title": "A", "time_minutes": 1, "price": 5.5}"#).unwrap();
        let from_string: RecipePayload =
            serde_json::from_str(r#"{"title": "A", "time_minutes": 1, "price": "5.50"}"#)
                .unwrap();
        assert_eq!(
            from_number.validate_full().unwrap().price,
            from_string.validate_full().unwrap().price
        );
    }

    #[test]
    fn test_query_parses_id_lists() {
        let filter = RecipeQuery {
            tags: Some("3, 1,".into()),
            ingredients: None,
        }
        .parse()
        .unwrap();
        assert_eq!(filter.tags, vec![TagId::new(1), TagId::new(3)]);
        assert!(filter.ingredients.is_empty());
    }

    #[test]
    fn test_query_rejects_non_integer() {
        let errors = RecipeQuery {
            tags: None,
            ingredients: Some("1,x".into()),
        }
        .parse()
        .unwrap_err();
        assert_eq!(errors.get("ingredients"), ["A valid integer is required."]);
    }
}
