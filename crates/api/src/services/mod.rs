//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Account creation, password login, and API tokens
//! - `media` - Validation and storage of uploaded images
//! - `scope` - Owner-scoped access to tags, ingredients, and recipes

pub mod auth;
pub mod media;
pub mod scope;
