//! Error type shared by club-common and the service crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder creation or config file read failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file exists but does not parse
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed id or other caller-supplied value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
