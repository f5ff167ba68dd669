//! Error types for pregraph core.

use thiserror::Error;

/// Core errors that can occur during primitive and encoding operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("decrypt failed: ciphertext is not addressed to this key")]
    DecryptError,

    #[error("transform failed: {0}")]
    TransformError(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid signature material: {0}")]
    InvalidSignature(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
