//! Field-level validation errors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Maximum length of short text fields (names, titles, links).
pub const MAX_TEXT_LENGTH: usize = 255;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";

/// Validation messages keyed by field name.
///
/// Serializes as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Create an empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create errors holding a single message for `field`.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Create errors holding a single non-field message.
    #[must_use]
    pub fn non_field(message: impl Into<String>) -> Self {
        Self::single(NON_FIELD_ERRORS, message)
    }

    /// Record a message against `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    /// Returns true if no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// Returns `Ok(value)` if no errors were recorded, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A body field that may be absent, explicitly `null`, or set.
///
/// Structs holding these fields need `#[serde(default)]`; otherwise an absent
/// field deserializes as [`Field::Null`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Missing,
    Null,
    Value(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Null, Self::Value))
    }
}

impl<T> Field<T> {
    /// The value of a field that must be present and non-null.
    pub fn required(self, errors: &mut FieldErrors, field: &str) -> Option<T> {
        match self {
            Self::Missing => {
                errors.add(field, REQUIRED);
                None
            }
            other => other.optional(errors, field),
        }
    }

    /// The value of a field that may be omitted but not null.
    pub fn optional(self, errors: &mut FieldErrors, field: &str) -> Option<T> {
        match self {
            Self::Missing => None,
            Self::Null => {
                errors.add(field, NULL);
                None
            }
            Self::Value(value) => Some(value),
        }
    }
}

/// Turn a lowercase error message into a sentence (`"foo bar"` -> `"Foo bar."`).
#[must_use]
pub fn sentence(message: &str) -> String {
    let mut chars = message.chars();
    let mut out = chars
        .next()
        .map(|c| c.to_uppercase().collect::<String>())
        .unwrap_or_default();
    out.push_str(chars.as_str());
    if !out.ends_with('.') {
        out.push('.');
    }
    out
}

/// Validate a required short text field, trimming surrounding whitespace.
///
/// Returns `None` (after recording an error) when the value is missing, blank,
/// or too long.
pub fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    non_blank_text(errors, field, value)
}

/// Validate a present short text field that must not be blank.
pub fn non_blank_text(errors: &mut FieldErrors, field: &str, value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if trimmed.chars().count() > MAX_TEXT_LENGTH {
        errors.add(field, max_length_message());
        return None;
    }
    Some(trimmed.to_owned())
}

/// Validate an optional short text field that may be blank.
pub fn optional_text(errors: &mut FieldErrors, field: &str, value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_TEXT_LENGTH {
        errors.add(field, max_length_message());
        return None;
    }
    Some(trimmed.to_owned())
}

fn max_length_message() -> String {
    format!("Ensure this field has no more than {MAX_TEXT_LENGTH} characters.")
}
