//! # albumlog Common Library
//!
//! Shared code for the albumlog crates including:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Database bootstrap (pool, pragmas, schema)
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
