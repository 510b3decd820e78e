//! # Core Error Type
//!
//! Errors raised while constructing core primitives from untrusted input
//! (timestamps, kind names, identifiers).

use thiserror::Error;

/// Error constructing a core primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Input did not satisfy the primitive's format rules.
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}
