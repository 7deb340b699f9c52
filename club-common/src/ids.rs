//! Identifier helpers
//!
//! Rows are keyed by UUID v4 strings. Handlers receive ids as path
//! parameters, so parsing doubles as input validation.

use uuid::Uuid;

use crate::{Error, Result};

/// Generate a new row id
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// Validate an id coming from a request and return it in canonical
/// (lower-case hyphenated) form.
pub fn parse(s: &str) -> Result<String> {
    Uuid::parse_str(s.trim())
        .map(|id| id.to_string())
        .map_err(|_| Error::InvalidInput(format!("Invalid id: {}", s)))
}

/// Random 128-bit token rendered as 32 lower-case hex chars
pub fn random_hex_token() -> String {
    Uuid::new_v4().simple().to_string()
}
