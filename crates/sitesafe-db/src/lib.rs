//! Persistence layer for the sitesafe workflow engine.
//!
//! One model per table under [`models`], each carrying its own query
//! functions. Queries are runtime-checked (`sqlx::query_as`) so the crate
//! builds without a live database; schema lives in `migrations/`.

pub mod migrations;
pub mod models;

pub use models::*;
