//! Watermark persistence for the incremental extractor.
//!
//! Provides the [`WatermarkStore`] trait and an [`ObjectWatermarkStore`]
//! implementation that keeps the watermark as a single plain-text object in
//! the control bucket.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod object;

pub use backend::WatermarkStore;
pub use error::StateError;
pub use object::{ObjectWatermarkStore, WATERMARK_KEY};
