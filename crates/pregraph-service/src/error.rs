//! Error types for the service module.
//!
//! Per-operation failures travel inside [`BatchResponse`] as failed
//! results; this error type covers request-level rejection and internal
//! failures only.
//!
//! [`BatchResponse`]: crate::protocol::BatchResponse

use thiserror::Error;

/// Errors that reject a request as a whole.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request signature did not verify.
    #[error("request signature did not verify for device {0}")]
    InvalidSignature(String),

    /// The request could not be decoded or canonically re-encoded.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[from] pregraph_store::StoreError),

    /// Primitive failure outside any single operation.
    #[error("crypto error: {0}")]
    Core(#[from] pregraph_core::CoreError),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
