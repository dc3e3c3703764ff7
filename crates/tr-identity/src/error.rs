//! Error types for content identity.

use thiserror::Error;

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors that can occur while computing an identity.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The value could not be represented as JSON (e.g. a map with non-string keys).
    #[error("value is not representable as JSON: {0}")]
    NotJson(#[from] serde_json::Error),
}
