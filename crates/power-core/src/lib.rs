//! Shared building blocks for the power comparison tools.
//!
//! Holds the error type, the reading and result models, the logger timestamp
//! format, command-line settings and number formatting used by the data and
//! binary crates.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod timestamp;

pub use error::{PowerError, Result};
