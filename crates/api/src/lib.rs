//! Recipe Box API library.
//!
//! The HTTP surface lives in [`routes`]; [`routes::app`] builds the complete
//! router so the binary and the integration tests serve the same thing.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
