//! # Club Common Library
//!
//! Shared code for the club platform binaries:
//! - Error type used by the database and configuration layers
//! - Configuration loading and root folder resolution
//! - Database initialization and schema
//! - Time and id helpers

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
