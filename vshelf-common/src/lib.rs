//! # vshelf Common Library
//!
//! Shared code for the vshelf services:
//! - Error and result types
//! - Configuration loading (TOML + environment + compiled defaults)
//! - SQLite database initialization and schema
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
