//! # prep common library
//!
//! Shared code for the prep derivative-staging crates:
//! - Common error type
//! - Bootstrap TOML configuration and root folder resolution
//! - SQLite connection setup
//! - Atomic file writes

pub mod config;
pub mod db;
pub mod error;
pub mod fs;

pub use error::{Error, Result};
