//! Incremental extraction with watermark tracking.
//!
//! The [`Extractor`] reads the watermark, queries every allow-listed table
//! for rows with `last_updated` in `[watermark, trigger_time)`, stages each
//! non-empty result as `{trigger_time}/{table}.pqt`, and advances the
//! watermark only after every table succeeds.
//!
//! | Module      | Responsibility |
//! |-------------|----------------|
//! | `extractor` | Run orchestration and the watermark protocol |
//! | `query`     | Time-bounded query construction |
//! | `source`    | [`RelationalSource`] capability trait |
//! | `postgres`  | `PostgreSQL` source |
//! | `sqlite`    | `SQLite` source |
//! | `types`     | `PostgreSQL` -> Arrow type registry |
//! | `encode`    | `PostgreSQL` row -> Arrow encoding |

#![warn(clippy::pedantic)]

pub mod encode;
pub mod extractor;
pub mod postgres;
pub mod query;
pub mod source;
pub mod sqlite;
pub mod types;

pub use extractor::{ExtractError, ExtractSettings, Extractor, RunOutcome};
pub use postgres::PostgresSource;
pub use query::{build_extract_query, CatalogNames, ExtractQuery};
pub use source::RelationalSource;
pub use sqlite::SqliteSource;
