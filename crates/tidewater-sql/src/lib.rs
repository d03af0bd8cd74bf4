//! Relational plumbing shared by the extractor and the loader.
//!
//! Connection configuration for `PostgreSQL` and `SQLite`, placeholder
//! dialects, identifier validation, and [`DbError`], which classifies driver
//! failures onto the pipeline's [`ErrorCategory`](tidewater_types::ErrorCategory).

#![warn(clippy::pedantic)]

pub mod config;
pub mod dialect;
pub mod error;
pub mod identifier;

pub use config::{DbConfig, PgConfig, SqliteConfig};
pub use dialect::Dialect;
pub use error::DbError;
pub use identifier::{quote_ident, validate_identifier};
