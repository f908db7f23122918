//! # Karaoke Common Library
//!
//! Shared code for the karaoke pipeline crates including:
//! - Error types
//! - Bootstrap configuration loading
//! - Database pool initialization and schema
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
