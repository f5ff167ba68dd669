//! Error types for the authorization module.

use thiserror::Error;

/// Errors that can occur during authorization and path resolution.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[from] pregraph_store::StoreError),

    /// The object an action refers to does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl AuthzError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
