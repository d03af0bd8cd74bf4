//! Column transforms applied to staged objects before loading.
//!
//! Each allow-listed table has a [`TableTransform`]: an ordered list of
//! column operations that reshapes the extracted columns into the layout of
//! its warehouse relation, or [`TableTransform::PassThrough`] for tables
//! that are only consumed through join templates.
//!
//! | Module        | Responsibility |
//! |---------------|----------------|
//! | `ops`         | Column operations over Arrow batches |
//! | `mapping`     | Per-table operation lists |
//! | `currency`    | ISO-4217 code to English name table |
//! | `error`       | [`TransformError`] and its classification |
//! | `transformer` | Fetch, transform, re-stage |

#![warn(clippy::pedantic)]

pub mod currency;
pub mod error;
pub mod mapping;
pub mod ops;
pub mod transformer;

pub use error::TransformError;
pub use mapping::TableTransform;
pub use ops::ColumnOp;
pub use transformer::{TransformOutcome, Transformer};
