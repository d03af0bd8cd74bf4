//! Idempotent upsert loading of staged Parquet objects.
//!
//! The [`Loader`] resolves a staged key to its warehouse relation, decodes
//! the object, builds an `INSERT ... ON CONFLICT DO UPDATE` statement from
//! the object's columns and applies every row to a [`RelationalTarget`].
//! Replaying an object is safe: the last write wins per primary key.
//!
//! | Module      | Responsibility |
//! |-------------|----------------|
//! | `loader`    | Key resolution, decoding, dispatch of retryable vs terminal errors |
//! | `statement` | Upsert statement builder and per-column policies |
//! | `typed_col` | Arrow column -> cell value access |
//! | `target`    | [`RelationalTarget`] trait and [`CommitMode`] |
//! | `postgres`  | `PostgreSQL` target |
//! | `sqlite`    | `SQLite` target |

#![warn(clippy::pedantic)]

pub mod loader;
pub mod postgres;
pub mod sqlite;
pub mod statement;
pub mod target;
pub mod typed_col;

pub use loader::{Dispatch, LoadError, LoadReport, Loader};
pub use postgres::PostgresTarget;
pub use sqlite::SqliteTarget;
pub use statement::{policy_for, ColumnPolicy, ColumnSpec, UpsertStatement};
pub use target::{CommitMode, RelationalTarget};
