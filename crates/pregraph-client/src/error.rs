//! Error types for the client SDK.

use thiserror::Error;

use pregraph_service::OpResult;

/// Errors surfaced by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service rejected an operation in the batch.
    #[error("operation {:?} failed: {:?}", .0.kind, .0.error)]
    Request(OpResult),

    /// The request never made it through the endpoint.
    #[error("transport error: {0}")]
    Transport(#[from] pregraph_service::ServiceError),

    /// A local primitive operation failed.
    #[error("crypto error: {0}")]
    Core(#[from] pregraph_core::CoreError),

    /// The operation needs a registered account on this client.
    #[error("no account registered on this client")]
    MissingAccount,

    /// The service answered with a payload the operation did not expect.
    #[error("unexpected response payload for {0}")]
    UnexpectedPayload(&'static str),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
